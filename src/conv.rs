// SPDX-License-Identifier: MIT

//! Various type conversion routines.

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

use windows_result::HRESULT;

/// Convert the OS string into a null-terminated wide (16-bit) C string.
pub fn as_c_str_w(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// Recover the Win32 error code wrapped inside an HRESULT.
/// HRESULTs outside the Win32 facility are passed through unchanged.
pub fn win32_code(hr: HRESULT) -> i32 {
    let raw = hr.0 as u32;
    if raw & 0xFFFF_0000 == 0x8007_0000 {
        (raw & 0xFFFF) as i32
    } else {
        hr.0
    }
}
