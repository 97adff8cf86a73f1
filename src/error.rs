// SPDX-License-Identifier: MIT

//! Common error type.
//!

use std::ffi::NulError;

use crate::classify::ErrorCode;
use crate::launcher::descriptor::DescriptorError;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// A numeric OS result that maps onto the shared error vocabulary.
    #[error(transparent)]
    Classified(#[from] ErrorCode),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("i/o error: {0}")]
    Io(std::io::Error),
    #[error("problem setting up the isolated context: {0}")]
    ContextSetup(String),
    #[error("confinement not supported: {0}")]
    JailNotSupported(String),
    #[error("problem loading module: {0}")]
    ModuleLoad(String),
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("problem installing the fault filter: {0}")]
    Install(String),
}

impl SandboxError {
    /// The classified error code carried by this error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Classified(c) => Some(*c),
            _ => None,
        }
    }
}

/// OS errors with a raw code become classified errors so that callers can
/// match on `NotFound` and friends without caring which API produced them.
impl From<std::io::Error> for SandboxError {
    fn from(e: std::io::Error) -> Self {
        match ErrorCode::from_io(&e) {
            Some(c) => SandboxError::Classified(c),
            None => SandboxError::Io(e),
        }
    }
}

// `which` reports every lookup failure as "not found"; keep the reason in the log.
impl From<which::Error> for SandboxError {
    fn from(e: which::Error) -> Self {
        log::debug!("module lookup failed: {e}");
        SandboxError::Classified(ErrorCode::NotFound)
    }
}

impl From<NulError> for SandboxError {
    fn from(e: NulError) -> Self {
        SandboxError::Io(std::io::Error::new(std::io::ErrorKind::InvalidFilename, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::codes;

    #[test]
    fn io_error_with_known_code_is_classified() {
        let err: SandboxError = std::io::Error::from_raw_os_error(codes::NOT_FOUND).into();
        assert_eq!(err.code(), Some(ErrorCode::NotFound));
    }

    #[test]
    fn io_error_without_code_stays_io() {
        let err: SandboxError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, SandboxError::Io(_)), "unexpected: {:?}", err);
        assert_eq!(err.code(), None);
    }
}
