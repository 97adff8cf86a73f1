// SPDX-License-Identifier: MIT

//! Named kernel events on Windows.

use std::{ffi::OsStr, time::Duration};

use windows::{
    Win32::{
        Foundation::{CloseHandle, HANDLE, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT},
        System::Threading::{INFINITE, OpenEventW, SYNCHRONIZATION_SYNCHRONIZE, WaitForSingleObject},
    },
    core::PCWSTR,
};

use super::signal::{ReadySignal, SignalSource};
use crate::{
    classify::classify,
    conv::{as_c_str_w, win32_code},
    error::SandboxError,
};

pub struct NamedEventSource;

impl SignalSource for NamedEventSource {
    fn open(&self, name: &str) -> Result<Box<dyn ReadySignal>, SandboxError> {
        let wide = as_c_str_w(OsStr::new(name));
        let handle = unsafe { OpenEventW(SYNCHRONIZATION_SYNCHRONIZE, false, PCWSTR(wide.as_ptr())) }
            .map_err(|e| classified(&e))?;
        log::debug!("opened event {}", name);
        Ok(Box::new(NamedEvent {
            handle: Some(handle),
            name: name.to_string(),
        }))
    }
}

fn classified(e: &windows::core::Error) -> SandboxError {
    match classify(win32_code(e.code())) {
        Some(c) => SandboxError::Classified(c),
        None => SandboxError::Io(std::io::Error::other(format!("{:?}", e))),
    }
}

struct NamedEvent {
    handle: Option<HANDLE>,
    name: String,
}

impl ReadySignal for NamedEvent {
    fn wait(&self, timeout: Option<Duration>) -> Result<(), SandboxError> {
        let handle = match self.handle {
            Some(h) => h,
            None => return Err(SandboxError::Classified(crate::classify::ErrorCode::InvalidHandle)),
        };
        let ms = match timeout {
            // INFINITE is u32::MAX, so cap finite waits just below it.
            Some(t) => t.as_millis().min((INFINITE - 1) as u128) as u32,
            None => INFINITE,
        };
        let ret = unsafe { WaitForSingleObject(handle, ms) };
        if ret == WAIT_OBJECT_0 {
            log::debug!("event {} is set", self.name);
            Ok(())
        } else if ret == WAIT_TIMEOUT {
            Err(SandboxError::Timeout(format!("event {}", self.name)))
        } else if ret == WAIT_FAILED {
            Err(classified(&windows::core::Error::from_win32()))
        } else {
            // WAIT_ABANDONED only applies to mutexes.
            Err(SandboxError::Io(std::io::Error::other(format!(
                "unexpected wait result {:?} for event {}",
                ret, self.name
            ))))
        }
    }
}

impl Drop for NamedEvent {
    fn drop(&mut self) {
        // Note: ignoring errors inside the drop.
        if let Some(h) = self.handle.take() {
            let _ = unsafe { CloseHandle(h) };
        }
    }
}
