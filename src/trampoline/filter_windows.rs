// SPDX-License-Identifier: MIT

//! Native fault filter for Windows, through `SetUnhandledExceptionFilter`.

use std::sync::{Arc, OnceLock};

use windows::Win32::System::Diagnostics::Debug::{
    EXCEPTION_POINTERS, LPTOP_LEVEL_EXCEPTION_FILTER, SetUnhandledExceptionFilter,
};

use super::{
    Disposition, FaultEvent, FilterRef,
    handler::CrashHandler,
    hook,
    registration::{FilterInstaller, FilterState, InstalledFilter},
};
use crate::error::SandboxError;

type ExceptionFilter = unsafe extern "system" fn(*const EXCEPTION_POINTERS) -> i32;

static HANDLER: OnceLock<Arc<CrashHandler>> = OnceLock::new();

/// Registers the trampoline as the top-level exception filter.
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
        let entry: ExceptionFilter = match state {
            FilterState::Active => unhandled_exception_filter,
            FilterState::Disabled => disabled_exception_filter,
        };
        let previous = unsafe { SetUnhandledExceptionFilter(Some(entry)) };
        Ok(InstalledFilter {
            own: FilterRef::from_raw(entry as usize),
            previous: filter_ref(previous),
        })
    }
}

fn filter_ref(filter: LPTOP_LEVEL_EXCEPTION_FILTER) -> FilterRef {
    filter.map_or(FilterRef::NONE, |f| FilterRef::from_raw(f as usize))
}

unsafe extern "system" fn unhandled_exception_filter(info: *const EXCEPTION_POINTERS) -> i32 {
    match HANDLER.get() {
        Some(h) => h.filter(FaultEvent::from_ptr(info)).code(),
        None => Disposition::CONTINUE_SEARCH.code(),
    }
}

unsafe extern "system" fn disabled_exception_filter(_info: *const EXCEPTION_POINTERS) -> i32 {
    Disposition::EXECUTE_HANDLER.code()
}

/// Replacement for `SetUnhandledExceptionFilter`, for the hooking engine to
/// bind in front of the real function.
pub unsafe extern "system" fn set_unhandled_exception_filter_detour(
    requested: LPTOP_LEVEL_EXCEPTION_FILTER,
) -> LPTOP_LEVEL_EXCEPTION_FILTER {
    match hook::intercept_registration(filter_ref(requested)) {
        // Every FilterRef the hook hands back came from one of the filter
        // entries above, so it is a valid function pointer.
        Some(own) => unsafe { std::mem::transmute::<usize, LPTOP_LEVEL_EXCEPTION_FILTER>(own.raw()) },
        None => {
            log::error!("fault filter registration intercepted before the hook was bound");
            None
        }
    }
}
