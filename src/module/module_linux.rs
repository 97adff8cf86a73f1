// SPDX-License-Identifier: MIT

//! `dlopen` based module loading.

use std::{
    ffi::{CStr, CString},
    os::unix::ffi::OsStrExt as _,
    path::Path,
};

use nix::libc;

use crate::error::SandboxError;

pub struct ModuleHandle {
    handle: Option<*mut libc::c_void>,
}

// The handle is an opaque token owned by the dynamic loader, which is
// itself thread safe.
unsafe impl Send for ModuleHandle {}
unsafe impl Sync for ModuleHandle {}

impl ModuleHandle {
    /// Linux resolves dependencies through the loader's own search rules, so
    /// the search directory is only used for logging.
    pub fn load(path: &Path, search_dir: Option<&Path>) -> Result<Self, SandboxError> {
        if let Some(dir) = search_dir {
            log::debug!("module {} loads relative to {}", path.display(), dir.display());
        }
        let c_path = CString::new(path.as_os_str().as_bytes())?;
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(SandboxError::ModuleLoad(format!(
                "{}: {}",
                path.display(),
                last_dl_error()
            )));
        }
        Ok(ModuleHandle { handle: Some(handle) })
    }

    /// Address of the named export, or 0 when there is none.
    pub fn symbol(&self, name: &str) -> Result<usize, SandboxError> {
        let handle = self
            .handle
            .ok_or_else(|| SandboxError::ModuleLoad("module already unloaded".to_string()))?;
        let c_name = CString::new(name)?;
        let addr = unsafe { libc::dlsym(handle, c_name.as_ptr()) };
        Ok(addr as usize)
    }

    pub fn unload(&mut self) -> Result<(), SandboxError> {
        match self.handle.take() {
            None => Ok(()),
            Some(h) => {
                if unsafe { libc::dlclose(h) } == 0 {
                    Ok(())
                } else {
                    Err(SandboxError::ModuleLoad(last_dl_error()))
                }
            }
        }
    }
}

fn last_dl_error() -> String {
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        "unknown loader error".to_string()
    } else {
        unsafe { CStr::from_ptr(msg) }.to_string_lossy().to_string()
    }
}
