// SPDX-License-Identifier: MIT

use std::{ffi::c_void, mem, path::Path};

use windows::{
    Win32::{
        Foundation::{CloseHandle, HANDLE},
        System::{
            JobObjects,
            LibraryLoader::{AddDllDirectory, RemoveDllDirectory},
            Threading::GetCurrentProcess,
        },
    },
    core::PCWSTR,
};

use super::context::ContextSpec;
use crate::{conv::as_c_str_w, error::SandboxError};

/// Per-context platform state.
///
/// While it lives, the base directory is on the DLL search path used for
/// the module's dependencies.  Once confined, the process belongs to a job
/// object that forbids creating child processes.  The job outlives the
/// guard: a process cannot leave its job, so only the handle is closed.
pub struct ContextGuard {
    dll_directory: Option<*mut c_void>,
    job: Option<HANDLE>,
}

impl ContextGuard {
    pub fn prepare(spec: &ContextSpec, _module_path: &Path) -> Result<Self, SandboxError> {
        let dir = as_c_str_w(spec.base_dir.as_os_str());
        let cookie = unsafe { AddDllDirectory(PCWSTR(dir.as_ptr())) };
        if cookie.is_null() {
            return Err(SandboxError::ContextSetup(format!(
                "AddDllDirectory({}): {:?}",
                spec.base_dir.display(),
                windows::core::Error::from_win32()
            )));
        }
        Ok(ContextGuard {
            dll_directory: Some(cookie),
            job: None,
        })
    }

    pub fn confine(&mut self, _spec: &ContextSpec) -> Result<(), SandboxError> {
        let job = unsafe { single_process_job() }
            .map_err(|e| SandboxError::ContextSetup(format!("job object: {:?}", e)))?;
        self.job = Some(job);
        log::debug!("host process is now limited to a single active process");
        Ok(())
    }

    pub fn is_confined(&self) -> bool {
        self.job.is_some()
    }
}

unsafe fn single_process_job() -> windows::core::Result<HANDLE> {
    unsafe {
        let job = JobObjects::CreateJobObjectW(None, PCWSTR::null())?;

        let mut basic: JobObjects::JOBOBJECT_BASIC_LIMIT_INFORMATION = mem::zeroed();
        basic.LimitFlags = JobObjects::JOB_OBJECT_LIMIT_ACTIVE_PROCESS;
        basic.ActiveProcessLimit = 1;

        let mut ext: JobObjects::JOBOBJECT_EXTENDED_LIMIT_INFORMATION = mem::zeroed();
        ext.BasicLimitInformation = basic;

        let applied = JobObjects::SetInformationJobObject(
            job,
            JobObjects::JobObjectExtendedLimitInformation,
            &mut ext as *mut _ as *mut _,
            mem::size_of::<JobObjects::JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
        )
        .and_then(|_| JobObjects::AssignProcessToJobObject(job, GetCurrentProcess()));
        if let Err(e) = applied {
            let _ = CloseHandle(job);
            return Err(e);
        }
        Ok(job)
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        // Note: ignoring errors inside the drop.
        if let Some(cookie) = self.dll_directory.take() {
            let _ = unsafe { RemoveDllDirectory(cookie) };
        }
        if let Some(job) = self.job.take() {
            let _ = unsafe { CloseHandle(job) };
        }
    }
}
