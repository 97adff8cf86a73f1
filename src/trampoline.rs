// SPDX-License-Identifier: MIT

//! Crash interception for the sandboxed process.
//!
//! `CrashTrampoline` installs the one process-wide fault filter, and keeps it
//! installed for the life of the process.  When a fault reaches the filter,
//! the report is made from a freshly created worker thread, because the
//! faulting thread may be holding locks that the hooking layer also needs.
//! Afterwards, the host's own subsystems are told to shut down through the
//! shutdown callback, and the crash reporter's disposition is handed back to
//! the OS.
//!
//! Code running inside the sandbox is not allowed to replace the filter.  The
//! hooking engine routes every registration attempt to a
//! `FilterRegistrationHook`, whose policy (`AlwaysOverride`) keeps the
//! trampoline in place and reports the trampoline as the "previous" filter.

use std::{ffi::c_void, fmt::Display, sync::Arc, time::Duration};

use crate::error::SandboxError;

pub mod diagnostics;
pub mod handler;
pub mod hook;
pub mod registration;
pub mod reporter;

#[cfg(test)]
pub(crate) mod fakes;

#[cfg(target_os = "linux")]
mod filter_linux;

#[cfg(target_os = "linux")]
pub use filter_linux::NativeFilterInstaller;

#[cfg(target_os = "windows")]
mod filter_windows;

#[cfg(target_os = "windows")]
pub use filter_windows::{NativeFilterInstaller, set_unhandled_exception_filter_detour};

pub use diagnostics::{DiagnosticSink, LogSink};
pub use handler::{CrashHandler, OsThreadSpawner, WorkerSpawner, WorkerTask};
pub use hook::{AlwaysOverride, FilterRegistrationHook, RegistrationPolicy};
pub use registration::{FilterInstaller, FilterRegistration, FilterState, InstalledFilter};
pub use reporter::{CrashReporter, LogOnlyReporter, ModuleCrashReporter};

/// The value a fault filter hands back to the OS.
///
/// The crash reporter's answer is passed through untouched, so this is a
/// plain integer with the platform's well-known values named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disposition(pub i32);

impl Disposition {
    /// Run the default handler, which normally terminates the process.
    pub const EXECUTE_HANDLER: Disposition = Disposition(1);
    /// Not handled here; let the rest of fault processing decide.
    pub const CONTINUE_SEARCH: Disposition = Disposition(0);
    /// Resume at the fault site.
    pub const CONTINUE_EXECUTION: Disposition = Disposition(-1);

    pub fn code(self) -> i32 {
        self.0
    }
}

/// The platform's fault record, as an opaque pointer-sized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultEvent(usize);

impl FaultEvent {
    pub fn from_ptr<T>(record: *const T) -> Self {
        FaultEvent(record as usize)
    }

    pub fn from_raw(raw: usize) -> Self {
        FaultEvent(raw)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

impl Display for FaultEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// An opaque reference to a fault filter function.  `NONE` is no filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterRef(usize);

impl FilterRef {
    pub const NONE: FilterRef = FilterRef(0);

    pub fn from_raw(raw: usize) -> Self {
        FilterRef(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

impl Display for FilterRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The installed crash trampoline.
///
/// Only one is meaningful per process.  Dropping it does not remove the
/// filter; see `FilterRegistration`.
pub struct CrashTrampoline {
    handler: Arc<CrashHandler>,
    registration: Arc<FilterRegistration>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl CrashTrampoline {
    /// Start describing a trampoline.  The shutdown callback runs once at the
    /// end of every handled fault.
    pub fn builder<F>(shutdown: F) -> CrashTrampolineBuilder
    where
        F: Fn() + Send + Sync + 'static,
    {
        CrashTrampolineBuilder {
            shutdown: Box::new(shutdown),
            disabled: false,
            reporter: Arc::new(LogOnlyReporter),
            diagnostics: Arc::new(LogSink),
            spawner: Box::new(OsThreadSpawner),
            worker_timeout: None,
        }
    }

    /// Install a trampoline with the default collaborators.
    pub fn install<F>(
        shutdown: F,
        disabled: bool,
        installer: &dyn FilterInstaller,
    ) -> Result<Self, SandboxError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::builder(shutdown).disabled(disabled).install(installer)
    }

    pub fn state(&self) -> FilterState {
        self.registration.state()
    }

    pub fn registration(&self) -> &FilterRegistration {
        &self.registration
    }

    /// Run the installed filter against a fault record.
    pub fn filter(&self, event: FaultEvent) -> Disposition {
        self.handler.filter(event)
    }

    /// The policy to bind into the registration hook.
    pub fn override_policy(&self) -> AlwaysOverride {
        AlwaysOverride::new(Arc::clone(&self.registration), Arc::clone(&self.diagnostics))
    }
}

pub struct CrashTrampolineBuilder {
    shutdown: handler::ShutdownCallback,
    disabled: bool,
    reporter: Arc<dyn CrashReporter>,
    diagnostics: Arc<dyn DiagnosticSink>,
    spawner: Box<dyn WorkerSpawner>,
    worker_timeout: Option<Duration>,
}

impl CrashTrampolineBuilder {
    /// A disabled trampoline still owns the filter, but never reports.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn CrashReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn spawner(mut self, spawner: Box<dyn WorkerSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Bound the wait for the crash worker.  Unbounded by default.
    ///
    /// On expiry the worker is detached while it still holds the raw fault
    /// record.  The record lives on the faulting thread's stack (the
    /// `EXCEPTION_POINTERS` on Windows, the `siginfo_t` on Linux) and is only
    /// valid until the filter returns, so a reporter that is still running
    /// may then read freed memory.  Only set a timeout for reporters that
    /// copy what they need from the record up front.
    pub fn worker_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.worker_timeout = timeout;
        self
    }

    /// Register the filter with the installer and return the live trampoline.
    pub fn install(self, installer: &dyn FilterInstaller) -> Result<CrashTrampoline, SandboxError> {
        let state = if self.disabled {
            FilterState::Disabled
        } else {
            FilterState::Active
        };
        let handler = Arc::new(CrashHandler::new(
            self.reporter,
            Arc::clone(&self.diagnostics),
            self.spawner,
            self.shutdown,
            self.worker_timeout,
            self.disabled,
        ));
        let installed = installer.install(state, Arc::clone(&handler))?;
        self.diagnostics.write_line(&format!(
            "fault filter {} installed as {:?}; previous filter was {}",
            installed.own, state, installed.previous
        ));
        Ok(CrashTrampoline {
            handler,
            registration: Arc::new(FilterRegistration::new(state, installed)),
            diagnostics: self.diagnostics,
        })
    }
}
