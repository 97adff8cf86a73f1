// SPDX-License-Identifier: MIT

//! A minimal sandbox target.
//!
//! Writes what it was handed to `hello-target.out` in the base directory,
//! then exits with the number of bytes in its configuration file.

use std::{
    ffi::{CStr, c_char, c_int},
    fs,
    io::Write,
    path::PathBuf,
};

#[unsafe(no_mangle)]
pub unsafe extern "C" fn sandbox_main(
    base_dir: *const c_char,
    config_path: *const c_char,
    argc: c_int,
    argv: *const *const c_char,
) -> c_int {
    let base_dir = unsafe { CStr::from_ptr(base_dir) }.to_string_lossy().to_string();
    let config_path = unsafe { CStr::from_ptr(config_path) }.to_string_lossy().to_string();
    let args: Vec<String> = (0..argc as usize)
        .map(|i| unsafe { CStr::from_ptr(*argv.add(i)) }.to_string_lossy().to_string())
        .collect();

    let out = PathBuf::from(&base_dir).join("hello-target.out");
    let mut file = match fs::File::create(out) {
        Ok(f) => f,
        Err(_) => return -1,
    };
    if writeln!(file, "config={}", config_path).is_err() {
        return -1;
    }
    for arg in &args {
        if writeln!(file, "arg={}", arg).is_err() {
            return -1;
        }
    }

    match fs::read(&config_path) {
        Ok(c) => c.len() as c_int,
        Err(_) => -2,
    }
}
