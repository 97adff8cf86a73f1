// SPDX-License-Identifier: MIT

//! Loaded native modules.
//!
//! Both the sandboxed target and the external crash reporter are dynamic
//! libraries that this host loads into its own address space.  A
//! `NativeModule` owns one loaded library and unloads it when dropped.

use std::path::Path;

use crate::error::SandboxError;

#[cfg(target_os = "linux")]
mod module_linux;

#[cfg(target_os = "linux")]
use module_linux as platform;

#[cfg(target_os = "windows")]
mod module_windows;

#[cfg(target_os = "windows")]
use module_windows as platform;

/// A dynamic library loaded into the host process.
pub struct NativeModule {
    inner: platform::ModuleHandle,
    name: String,
}

impl NativeModule {
    /// Load the library at `path`.
    ///
    /// `search_dir` is added to the library search path for the module's own
    /// dependencies where the platform supports it.
    pub fn load(path: &Path, search_dir: Option<&Path>) -> Result<Self, SandboxError> {
        if !path.exists() {
            log::warn!("module {} does not exist", path.display());
            return Err(SandboxError::Classified(crate::classify::ErrorCode::NotFound));
        }
        let inner = platform::ModuleHandle::load(path, search_dir)?;
        log::debug!("loaded module {}", path.display());
        Ok(NativeModule {
            inner,
            name: path.to_string_lossy().to_string(),
        })
    }

    /// Look up an exported symbol.  A missing export is `NotFound`.
    ///
    /// # Safety
    ///
    /// `T` must be a function pointer type matching the export's real signature.
    pub unsafe fn symbol<T: Copy>(&self, name: &str) -> Result<T, SandboxError> {
        assert_eq!(
            std::mem::size_of::<T>(),
            std::mem::size_of::<usize>(),
            "symbols can only be read as pointer-sized values"
        );
        let addr = self.inner.symbol(name)?;
        if addr == 0 {
            log::warn!("module {} has no export named {}", self.name, name);
            return Err(SandboxError::Classified(crate::classify::ErrorCode::NotFound));
        }
        Ok(unsafe { std::mem::transmute_copy::<usize, T>(&addr) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NativeModule {
    fn drop(&mut self) {
        // Note: ignoring errors inside the drop.
        if let Err(e) = self.inner.unload() {
            log::warn!("problem unloading module {}: {}", self.name, e);
        } else {
            log::debug!("unloaded module {}", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_module_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = NativeModule::load(&dir.path().join("absent.module"), None)
            .err()
            .expect("loading a missing module must fail");
        assert_eq!(err.code(), Some(crate::classify::ErrorCode::NotFound));
    }

    #[test]
    fn non_library_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.module");
        std::fs::write(&path, b"not a library").unwrap();
        match NativeModule::load(&path, None) {
            Err(SandboxError::ModuleLoad(_)) => (),
            Err(e) => panic!("unexpected error variant: {:?}", e),
            Ok(_) => panic!("loaded a non-library file"),
        }
    }
}
