// SPDX-License-Identifier: MIT

//! The process-wide fault filter registration.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use super::{FilterRef, handler::CrashHandler};
use crate::error::SandboxError;

/// Where the registration ended up at construction.  Both states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Faults are reported through the crash handler.
    Active,
    /// Verification mode: a no-op filter that always asks for the default handler.
    Disabled,
}

/// Result of registering a filter with the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstalledFilter {
    /// The filter that is now live.
    pub own: FilterRef,
    /// Whatever was registered before.
    pub previous: FilterRef,
}

/// Performs the real OS registration.
pub trait FilterInstaller {
    /// Register the native filter entry for `state`, routing faults to `handler`.
    fn install(
        &self,
        state: FilterState,
        handler: Arc<CrashHandler>,
    ) -> Result<InstalledFilter, SandboxError>;
}

/// The record of the installed filter.
///
/// There is intentionally no way to uninstall, and no `Drop` that restores
/// the previous filter.  Faults raised while the process tears itself down
/// still need to reach the trampoline, so the registration stays live until
/// the process ends.  The previous filter is kept for diagnostics only.
#[derive(Debug)]
pub struct FilterRegistration {
    state: FilterState,
    own: FilterRef,
    previous: FilterRef,
    active: AtomicUsize,
    overrides: AtomicU64,
}

impl FilterRegistration {
    pub(crate) fn new(state: FilterState, installed: InstalledFilter) -> Self {
        FilterRegistration {
            state,
            own: installed.own,
            previous: installed.previous,
            active: AtomicUsize::new(installed.own.raw()),
            overrides: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// The trampoline's own filter.
    pub fn own_filter(&self) -> FilterRef {
        self.own
    }

    pub fn previous_filter(&self) -> FilterRef {
        self.previous
    }

    /// The filter currently considered installed.  Always the trampoline's.
    pub fn active_filter(&self) -> FilterRef {
        FilterRef::from_raw(self.active.load(Ordering::Acquire))
    }

    /// How many registration attempts have been overridden.
    pub fn override_count(&self) -> u64 {
        self.overrides.load(Ordering::Relaxed)
    }

    /// Make the trampoline's filter the active one again, and return it.
    ///
    /// The OS registration never left the trampoline, because intercepted
    /// calls are not forwarded, so this only re-asserts the record.
    pub(crate) fn reassert(&self) -> FilterRef {
        self.active.store(self.own.raw(), Ordering::Release);
        self.overrides.fetch_add(1, Ordering::Relaxed);
        self.own
    }
}
