// SPDX-License-Identifier: MIT

//! The external crash reporting facility.

use std::{ffi::c_void, path::Path};

use super::{Disposition, FaultEvent, diagnostics::CRASH_LOG_TARGET};
use crate::{error::SandboxError, module::NativeModule};

/// Reports a fault.  Called from the crash worker thread, never from the
/// faulting thread.
pub trait CrashReporter: Send + Sync {
    fn report(&self, event: FaultEvent) -> Result<Disposition, SandboxError>;
}

impl<F> CrashReporter for F
where
    F: Fn(FaultEvent) -> Result<Disposition, SandboxError> + Send + Sync,
{
    fn report(&self, event: FaultEvent) -> Result<Disposition, SandboxError> {
        self(event)
    }
}

/// Native crash report entry point: takes the raw fault record, returns the
/// fault filter disposition.
pub type CrashReportEntry = unsafe extern "system" fn(record: *mut c_void) -> i32;

/// A crash reporter living in a separately loaded module.
pub struct ModuleCrashReporter {
    entry: CrashReportEntry,
    // Kept loaded for as long as the entry may be called.
    module: NativeModule,
}

impl ModuleCrashReporter {
    pub fn load(path: &Path, entry_name: &str) -> Result<Self, SandboxError> {
        let module = NativeModule::load(path, None)?;
        let entry = unsafe { module.symbol::<CrashReportEntry>(entry_name)? };
        log::info!(
            "crash reports go to {}!{}",
            module.name(),
            entry_name
        );
        Ok(ModuleCrashReporter { entry, module })
    }
}

impl CrashReporter for ModuleCrashReporter {
    fn report(&self, event: FaultEvent) -> Result<Disposition, SandboxError> {
        log::debug!(target: CRASH_LOG_TARGET, "calling {} for fault {event}", self.module.name());
        Ok(Disposition(unsafe { (self.entry)(event.as_ptr()) }))
    }
}

/// Used when no reporter is configured: the fault is logged, and the default
/// handler runs.
pub struct LogOnlyReporter;

impl CrashReporter for LogOnlyReporter {
    fn report(&self, event: FaultEvent) -> Result<Disposition, SandboxError> {
        log::error!(
            target: CRASH_LOG_TARGET,
            "no crash reporter configured; fault {event} goes to the default handler"
        );
        Ok(Disposition::EXECUTE_HANDLER)
    }
}
