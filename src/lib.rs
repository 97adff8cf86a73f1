// SPDX-License-Identifier: MIT

//! # sandboxhost
//!
//! The host side of an in-process application sandbox.  The host process is
//! started suspended by an injector, installs a crash trampoline that nothing
//! inside the sandbox can replace, waits for the injector to signal that it
//! is ready, and then runs the target inside an isolated context.

pub mod classify;
pub mod config;
pub mod error;
pub mod launcher;
pub mod module;
pub mod trampoline;

#[cfg(target_os = "windows")]
pub(crate) mod conv;


pub use classify::{ErrorCode, check_found_or_no_error, check_result, classify, run_catching_to_code};
pub use config::HostConfig;
pub use error::SandboxError;
pub use launcher::SandboxLauncher;
pub use trampoline::{CrashTrampoline, Disposition, FaultEvent, FilterRef};
