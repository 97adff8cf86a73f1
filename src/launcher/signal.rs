// SPDX-License-Identifier: MIT

//! The injector's "ready" signal.
//!
//! The injector owns the named synchronization object; the host only opens
//! it and waits.  Opening never creates the object, so a missing object is
//! reported as `NotFound`.

use std::time::Duration;

use crate::error::SandboxError;

/// Opens named synchronization objects.
pub trait SignalSource {
    fn open(&self, name: &str) -> Result<Box<dyn ReadySignal>, SandboxError>;
}

/// An opened synchronization object.
pub trait ReadySignal {
    /// Block until the object is signaled.  `None` waits forever; expiry is
    /// `SandboxError::Timeout`.
    fn wait(&self, timeout: Option<Duration>) -> Result<(), SandboxError>;
}
