// SPDX-License-Identifier: MIT

//! The isolated execution context the target runs inside.
//!
//! A context is created from a `ContextSpec` by a `ContextFactory`, runs the
//! target once, and is torn down when dropped.  Teardown happens on every
//! path out of the launch, including unwinding, because it lives in `Drop`.

use std::{
    ffi::{CString, OsStr, OsString, c_char, c_int},
    path::{Path, PathBuf},
};

use crate::{classify::ErrorCode, error::SandboxError, module::NativeModule};

#[cfg(target_os = "linux")]
use super::context_linux as platform;

#[cfg(target_os = "windows")]
use super::context_windows as platform;

/// What the factory needs to build a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSpec {
    /// The target module, as named by the launch descriptor.
    pub module_path: PathBuf,
    /// The target's own configuration file.
    pub config_path: PathBuf,
    /// The directory the context is rooted at.
    pub base_dir: PathBuf,
}

/// A live isolated context.  Dropping it tears it down.
pub trait IsolatedContext {
    /// Run the target's entry point with the given arguments, returning its
    /// exit code.
    fn execute(&mut self, args: &[OsString]) -> Result<i32, SandboxError>;
}

pub trait ContextFactory {
    fn create(&self, spec: &ContextSpec) -> Result<Box<dyn IsolatedContext>, SandboxError>;
}

/// Entry point every target module exports.
///
/// All strings are NUL terminated UTF-8 (raw bytes on Linux).  `argv` holds
/// `argc` entries followed by a null pointer.
pub type TargetEntry = unsafe extern "C" fn(
    base_dir: *const c_char,
    config_path: *const c_char,
    argc: c_int,
    argv: *const *const c_char,
) -> c_int;

/// Loads the target as a native module into this process.
pub struct ModuleContextFactory {
    entry_symbol: String,
    confine: bool,
}

impl ModuleContextFactory {
    pub fn new(entry_symbol: &str, confine: bool) -> Self {
        ModuleContextFactory {
            entry_symbol: entry_symbol.to_string(),
            confine,
        }
    }
}

impl ContextFactory for ModuleContextFactory {
    fn create(&self, spec: &ContextSpec) -> Result<Box<dyn IsolatedContext>, SandboxError> {
        let module_path = resolve_module_path(&spec.module_path, &spec.base_dir)?;
        if !module_path.is_file() {
            log::error!("target module {} not found", module_path.display());
            return Err(SandboxError::Classified(ErrorCode::NotFound));
        }

        // Anything set up by the guard is undone if a later step fails.
        let mut guard = platform::ContextGuard::prepare(spec, &module_path)?;
        let module = NativeModule::load(&module_path, Some(spec.base_dir.as_path()))?;
        let entry = unsafe { module.symbol::<TargetEntry>(&self.entry_symbol)? };
        if self.confine {
            guard.confine(spec)?;
        }
        log::info!(
            "created context for {} rooted at {} with configuration {}",
            module_path.display(),
            spec.base_dir.display(),
            spec.config_path.display()
        );

        Ok(Box::new(ModuleContext {
            entry,
            module,
            guard,
            base_dir: c_string(spec.base_dir.as_os_str())?,
            config_path: c_string(spec.config_path.as_os_str())?,
        }))
    }
}

// Field order matters: the module unloads before the guard restores the
// loader state it was loaded under.
struct ModuleContext {
    entry: TargetEntry,
    module: NativeModule,
    guard: platform::ContextGuard,
    base_dir: CString,
    config_path: CString,
}

impl IsolatedContext for ModuleContext {
    fn execute(&mut self, args: &[OsString]) -> Result<i32, SandboxError> {
        let args = args
            .iter()
            .map(|a| c_string(a.as_os_str()))
            .collect::<Result<Vec<CString>, SandboxError>>()?;
        let mut argv: Vec<*const c_char> = args.iter().map(|a| a.as_ptr()).collect();
        argv.push(std::ptr::null());

        log::info!("running {} with {} argument(s)", self.module.name(), args.len());
        let code = unsafe {
            (self.entry)(
                self.base_dir.as_ptr(),
                self.config_path.as_ptr(),
                args.len() as c_int,
                argv.as_ptr(),
            )
        };
        log::info!("{} returned {}", self.module.name(), code);
        Ok(code)
    }
}

impl Drop for ModuleContext {
    fn drop(&mut self) {
        log::debug!(
            "tearing down context for {} (confined: {})",
            self.module.name(),
            self.guard.is_confined()
        );
    }
}

/// Absolute paths are used as given.  Relative paths resolve against the
/// base directory, and bare names fall back to a `PATH` search.
fn resolve_module_path(target: &Path, base_dir: &Path) -> Result<PathBuf, SandboxError> {
    if target.is_absolute() {
        return Ok(target.to_path_buf());
    }
    let local = base_dir.join(target);
    if local.exists() || target.components().count() > 1 {
        return Ok(local);
    }
    Ok(which::which_in(target, std::env::var_os("PATH"), base_dir)?)
}

#[cfg(unix)]
fn c_string(s: &OsStr) -> Result<CString, SandboxError> {
    use std::os::unix::ffi::OsStrExt as _;
    Ok(CString::new(s.as_bytes())?)
}

#[cfg(not(unix))]
fn c_string(s: &OsStr) -> Result<CString, SandboxError> {
    let s = s.to_str().ok_or_else(|| {
        SandboxError::ContextSetup(format!("{:?} is not valid unicode", s))
    })?;
    Ok(CString::new(s)?)
}
