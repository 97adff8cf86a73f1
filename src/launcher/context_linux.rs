// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use super::{context::ContextSpec, dependencies::resolved_dependencies, jail::LandlockJail};
use crate::error::SandboxError;

/// Per-context platform state.
///
/// Landlock confinement cannot be lifted, so dropping the guard leaves the
/// launcher thread confined.
pub struct ContextGuard {
    dependencies: Vec<PathBuf>,
    confined: bool,
}

impl ContextGuard {
    /// Check that every required library of the module can be found.
    pub fn prepare(_spec: &ContextSpec, module_path: &Path) -> Result<Self, SandboxError> {
        let dependencies = resolved_dependencies(module_path)?;
        log::debug!(
            "{} resolves with {} file(s)",
            module_path.display(),
            dependencies.len()
        );
        Ok(ContextGuard {
            dependencies,
            confined: false,
        })
    }

    /// Confine the launcher thread to the module's files, the configuration
    /// file and the base directory.
    pub fn confine(&mut self, spec: &ContextSpec) -> Result<(), SandboxError> {
        let mut read_paths = self.dependencies.clone();
        read_paths.push(spec.config_path.clone());
        LandlockJail::new(&read_paths, &[spec.base_dir.clone()])?.restrict()?;
        self.confined = true;
        Ok(())
    }

    pub fn is_confined(&self) -> bool {
        self.confined
    }
}
