// SPDX-License-Identifier: MIT

//! `LoadLibraryExW` based module loading.

use std::ffi::CString;
use std::path::Path;

use windows::{
    Win32::{
        Foundation::{FreeLibrary, HMODULE},
        System::LibraryLoader::{
            GetProcAddress, LOAD_LIBRARY_SEARCH_DEFAULT_DIRS, LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR,
            LoadLibraryExW,
        },
    },
    core::{PCSTR, PCWSTR},
};

use crate::error::SandboxError;

use crate::conv::as_c_str_w;

pub struct ModuleHandle {
    module: Option<HMODULE>,
}

// HMODULE is the module's base address; the loader lock guards its use.
unsafe impl Send for ModuleHandle {}
unsafe impl Sync for ModuleHandle {}

impl ModuleHandle {
    /// The module's own directory is always searched for its dependencies;
    /// the search directory is registered with `AddDllDirectory` by the
    /// isolated context, and `LOAD_LIBRARY_SEARCH_DEFAULT_DIRS` picks it up.
    pub fn load(path: &Path, _search_dir: Option<&Path>) -> Result<Self, SandboxError> {
        let wide = as_c_str_w(path.as_os_str());
        let module = unsafe {
            LoadLibraryExW(
                PCWSTR(wide.as_ptr()),
                None,
                LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR | LOAD_LIBRARY_SEARCH_DEFAULT_DIRS,
            )
        }
        .map_err(|e| SandboxError::ModuleLoad(format!("{}: {:?}", path.display(), e)))?;
        Ok(ModuleHandle { module: Some(module) })
    }

    /// Address of the named export, or 0 when there is none.
    pub fn symbol(&self, name: &str) -> Result<usize, SandboxError> {
        let module = self
            .module
            .ok_or_else(|| SandboxError::ModuleLoad("module already unloaded".to_string()))?;
        let c_name = CString::new(name)?;
        let proc = unsafe { GetProcAddress(module, PCSTR(c_name.as_ptr() as *const u8)) };
        Ok(proc.map_or(0, |f| f as usize))
    }

    pub fn unload(&mut self) -> Result<(), SandboxError> {
        match self.module.take() {
            None => Ok(()),
            Some(m) => unsafe { FreeLibrary(m) }
                .map_err(|e| SandboxError::ModuleLoad(format!("{:?}", e))),
        }
    }
}
