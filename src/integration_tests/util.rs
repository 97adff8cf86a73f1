// SPDX-License-Identifier: MIT

//! Utility helpers for running the tests.

use std::path::{Path, PathBuf};

#[cfg(target_os = "windows")]
const MODULE_PREFIX: &str = "";
#[cfg(target_os = "windows")]
const MODULE_SUFFIX: &str = ".dll";

#[cfg(not(target_os = "windows"))]
const MODULE_PREFIX: &str = "lib";
#[cfg(not(target_os = "windows"))]
const MODULE_SUFFIX: &str = ".so";

/// Find the built library for the given test crate.
pub fn find_module(crate_name: &str) -> PathBuf {
    let test_dir = Path::new("tests");
    assert!(test_dir.is_dir());

    let mut module: PathBuf = test_dir.join(crate_name);
    assert!(module.is_dir(), "did not find test directory ({})?", module.display());
    module.push("target");
    module.push("debug");
    assert!(
        module.is_dir(),
        "could not find {}; did you remember to run 'cargo build' on it?",
        module.display(),
    );
    module.push(format!(
        "{MODULE_PREFIX}{}{MODULE_SUFFIX}",
        crate_name.replace('-', "_")
    ));
    assert!(
        module.is_file(),
        "could not find {}; did you remember to run 'cargo build' on it?",
        module.display(),
    );
    std::path::absolute(module).unwrap()
}

/// A directory with a plain file standing in for an already-set signal.
#[cfg(target_os = "linux")]
pub fn set_signal(name: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(name), b"").unwrap();
    dir
}
