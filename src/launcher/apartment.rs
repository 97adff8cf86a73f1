// SPDX-License-Identifier: MIT

//! The launcher thread's threading affinity.
//!
//! On Windows the target expects a single-threaded COM apartment on the
//! thread that calls it.  Elsewhere there is nothing to enter.

use crate::error::SandboxError;

/// Held for the duration of a launch.  Leaves the apartment on drop.
pub struct Apartment {
    #[cfg(target_os = "windows")]
    entered: bool,
}

#[cfg(target_os = "windows")]
impl Apartment {
    pub fn enter() -> Result<Self, SandboxError> {
        use windows::Win32::{
            Foundation::S_FALSE,
            System::Com::{COINIT_APARTMENTTHREADED, CoInitializeEx},
        };

        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr.is_err() {
            // RPC_E_CHANGED_MODE: the thread already joined a multithreaded apartment.
            return Err(SandboxError::ContextSetup(format!(
                "could not enter a single-threaded apartment: {:?}",
                hr
            )));
        }
        if hr == S_FALSE {
            log::debug!("thread was already in a single-threaded apartment");
        }
        Ok(Apartment { entered: true })
    }
}

#[cfg(target_os = "windows")]
impl Drop for Apartment {
    fn drop(&mut self) {
        if self.entered {
            unsafe { windows::Win32::System::Com::CoUninitialize() };
        }
    }
}

#[cfg(not(target_os = "windows"))]
impl Apartment {
    pub fn enter() -> Result<Self, SandboxError> {
        Ok(Apartment {})
    }
}
