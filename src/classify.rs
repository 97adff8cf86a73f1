// SPDX-License-Identifier: MIT

//! Numeric OS result classification.
//!
//! The lower layers of the sandbox report through plain integer result codes,
//! since some of their callers sit on the far side of a C ABI.  This module
//! turns those codes into a small typed vocabulary for use inside the host,
//! and provides the adapters that turn typed failures back into codes at the
//! integer-returning boundaries.
//!
//! A code of `0` always means success.

use crate::error::SandboxError;

/// Platform result codes that have a dedicated classification.
pub mod codes {
    #[cfg(target_os = "windows")]
    mod platform {
        use windows_sys::Win32::Foundation::{
            ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_INVALID_HANDLE, ERROR_PATH_NOT_FOUND,
        };

        pub const NOT_FOUND: i32 = ERROR_FILE_NOT_FOUND as i32;
        pub const ACCESS_DENIED: i32 = ERROR_ACCESS_DENIED as i32;
        pub const INVALID_HANDLE: i32 = ERROR_INVALID_HANDLE as i32;

        // Alternate spellings that classify the same way.
        pub const NOT_FOUND_ALIASES: &[i32] = &[ERROR_PATH_NOT_FOUND as i32];
        pub const ACCESS_DENIED_ALIASES: &[i32] = &[];
    }

    #[cfg(target_os = "linux")]
    mod platform {
        use nix::errno::Errno;

        pub const NOT_FOUND: i32 = Errno::ENOENT as i32;
        pub const ACCESS_DENIED: i32 = Errno::EACCES as i32;
        pub const INVALID_HANDLE: i32 = Errno::EBADF as i32;

        pub const NOT_FOUND_ALIASES: &[i32] = &[];
        pub const ACCESS_DENIED_ALIASES: &[i32] = &[Errno::EPERM as i32];
    }

    pub use platform::*;

    pub const SUCCESS: i32 = 0;
}

/// The classified error vocabulary shared by the whole host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCode {
    #[error("not found")]
    NotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("invalid handle")]
    InvalidHandle,
    #[error("os error {0}")]
    Generic(i32),
}

impl ErrorCode {
    /// The canonical numeric code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound => codes::NOT_FOUND,
            Self::AccessDenied => codes::ACCESS_DENIED,
            Self::InvalidHandle => codes::INVALID_HANDLE,
            Self::Generic(c) => *c,
        }
    }

    /// Classify the raw OS error behind an I/O error, when it has one.
    pub fn from_io(e: &std::io::Error) -> Option<Self> {
        e.raw_os_error().and_then(classify)
    }
}

/// Map a numeric result onto the vocabulary.  `0` is not an error.
pub fn classify(code: i32) -> Option<ErrorCode> {
    match code {
        codes::SUCCESS => None,
        codes::NOT_FOUND => Some(ErrorCode::NotFound),
        codes::ACCESS_DENIED => Some(ErrorCode::AccessDenied),
        codes::INVALID_HANDLE => Some(ErrorCode::InvalidHandle),
        c if codes::NOT_FOUND_ALIASES.contains(&c) => Some(ErrorCode::NotFound),
        c if codes::ACCESS_DENIED_ALIASES.contains(&c) => Some(ErrorCode::AccessDenied),
        c => Some(ErrorCode::Generic(c)),
    }
}

/// Succeed on `0`, fail with the classified error otherwise.
pub fn check_result(code: i32) -> Result<(), ErrorCode> {
    match classify(code) {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

/// Like `check_result`, but "not found" is a legitimate negative answer.
///
/// Returns `Ok(true)` on success, `Ok(false)` when the code means not found.
pub fn check_found_or_no_error(code: i32) -> Result<bool, ErrorCode> {
    match classify(code) {
        None => Ok(true),
        Some(ErrorCode::NotFound) => Ok(false),
        Some(e) => Err(e),
    }
}

/// Run the operation and report its outcome as a result code.
///
/// Classified failures become their numeric code.  Any other failure is not
/// a result code, and is handed back to the caller unchanged.
pub fn run_catching_to_code<F>(operation: F) -> Result<i32, SandboxError>
where
    F: FnOnce() -> Result<(), SandboxError>,
{
    match operation() {
        Ok(()) => Ok(codes::SUCCESS),
        Err(SandboxError::Classified(c)) => Ok(c.code()),
        Err(e) => Err(e),
    }
}

/// Variant of `run_catching_to_code` for probing operations, where `false`
/// reports as the "not found" code.
pub fn run_catching_found_to_code<F>(operation: F) -> Result<i32, SandboxError>
where
    F: FnOnce() -> Result<bool, SandboxError>,
{
    match operation() {
        Ok(true) => Ok(codes::SUCCESS),
        Ok(false) => Ok(codes::NOT_FOUND),
        Err(SandboxError::Classified(c)) => Ok(c.code()),
        Err(e) => Err(e),
    }
}
