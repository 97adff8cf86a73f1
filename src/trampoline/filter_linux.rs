// SPDX-License-Identifier: MIT

//! Native fault filter for Linux.
//!
//! Linux has no single "unhandled fault filter", so the synchronous fault
//! signals play that role.  The signal handler hands the `siginfo_t` record
//! to the crash handler as the fault event.  Unless the disposition asks to
//! resume, the default action is put back for the one signal being handled
//! and the signal is raised again.  It stays blocked until the handler
//! returns, and is then delivered with the default action (normally a core
//! dump).  This covers signals sent with `raise` or `kill` as well as faulting
//! instructions.

use std::sync::{Arc, OnceLock};

use nix::{
    libc,
    sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, raise, sigaction},
};

use super::{
    Disposition, FaultEvent, FilterRef,
    handler::CrashHandler,
    registration::{FilterInstaller, FilterState, InstalledFilter},
};
use crate::error::SandboxError;

/// Signals raised synchronously by a faulting thread.
const FAULT_SIGNALS: [Signal; 5] = [
    Signal::SIGSEGV,
    Signal::SIGBUS,
    Signal::SIGILL,
    Signal::SIGFPE,
    Signal::SIGABRT,
];

static HANDLER: OnceLock<Arc<CrashHandler>> = OnceLock::new();

/// Registers the trampoline with `sigaction`.
pub struct NativeFilterInstaller;

impl FilterInstaller for NativeFilterInstaller {
    fn install(
        &self,
        state: FilterState,
        handler: Arc<CrashHandler>,
    ) -> Result<InstalledFilter, SandboxError> {
        HANDLER.set(handler).map_err(|_| {
            SandboxError::Install("a crash trampoline is already installed in this process".to_string())
        })?;

        let entry: extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void) = match state {
            FilterState::Active => on_fault,
            FilterState::Disabled => on_fault_disabled,
        };
        // SA_ONSTACK lets a stack overflow still reach the handler when an
        // alternate stack is set up for the thread.
        let action = SigAction::new(
            SigHandler::SigAction(entry),
            SaFlags::SA_SIGINFO | SaFlags::SA_ONSTACK,
            SigSet::empty(),
        );

        let mut previous = FilterRef::NONE;
        for sig in FAULT_SIGNALS {
            let old = unsafe { sigaction(sig, &action) }
                .map_err(|e| SandboxError::Install(format!("sigaction({:?}): {}", sig, e)))?;
            if sig == Signal::SIGSEGV {
                previous = handler_ref(old.handler());
            }
        }
        Ok(InstalledFilter {
            own: FilterRef::from_raw(entry as usize),
            previous,
        })
    }
}

fn handler_ref(handler: SigHandler) -> FilterRef {
    match handler {
        SigHandler::SigDfl => FilterRef::NONE,
        SigHandler::SigIgn => FilterRef::from_raw(1),
        SigHandler::Handler(f) => FilterRef::from_raw(f as usize),
        SigHandler::SigAction(f) => FilterRef::from_raw(f as usize),
    }
}

extern "C" fn on_fault(signum: libc::c_int, info: *mut libc::siginfo_t, _context: *mut libc::c_void) {
    let disposition = match HANDLER.get() {
        Some(h) => h.filter(FaultEvent::from_ptr(info)),
        None => Disposition::EXECUTE_HANDLER,
    };
    if disposition != Disposition::CONTINUE_EXECUTION {
        terminate_with(signum);
    }
}

extern "C" fn on_fault_disabled(
    signum: libc::c_int,
    _info: *mut libc::siginfo_t,
    _context: *mut libc::c_void,
) {
    terminate_with(signum);
}

/// Put back the default action and leave the signal pending for it.
fn terminate_with(signum: libc::c_int) {
    if let Ok(sig) = Signal::try_from(signum) {
        let dfl = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        // Nothing can be done about a failure this late.
        let _ = unsafe { sigaction(sig, &dfl) };
        let _ = raise(sig);
    }
}
