// SPDX-License-Identifier: MIT

//! Discover the shared libraries a target module pulls in.
//!
//! Used both as a load preflight (a missing required library is reported
//! before the loader gets a chance to fail obscurely) and to build the list
//! of files the confined launcher thread may still read.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::error::SandboxError;

/// A library dependency.  If the `realpath` is None, then it could not be found.
#[derive(Debug)]
pub struct Dependency {
    pub path: PathBuf,
    pub realpath: Option<PathBuf>,
    pub required: bool,
}

impl Dependency {
    fn from_module(path: &Path) -> Self {
        let realpath = if path.exists() {
            std::path::absolute(path).ok()
        } else {
            None
        };
        Dependency {
            path: path.to_path_buf(),
            realpath,
            required: true,
        }
    }

    fn from_library(lib: &lddtree::Library, required_set: &HashSet<String>) -> Self {
        Dependency {
            path: lib.path.clone(),
            realpath: lib.realpath.clone(),
            required: required_set.contains(&lib.name),
        }
    }

    pub fn exists(&self) -> bool {
        self.realpath.is_some()
    }

    pub fn best_path(&self) -> &Path {
        self.realpath.as_deref().unwrap_or(&self.path)
    }

    pub fn invalid(&self) -> bool {
        self.required && self.realpath.is_none()
    }
}

/// Every library the module declares, the module itself first.
///
/// Declared but unneeded libraries are included too, since the module may
/// load them on demand.
pub fn find_module_dependencies(module: &Path) -> Vec<Dependency> {
    let module_dep = Dependency::from_module(module);
    if !module_dep.exists() {
        return vec![module_dep];
    }

    let analyzer = lddtree::DependencyAnalyzer::new(PathBuf::from("/"));
    log::debug!("finding dependencies for {}", module_dep.best_path().display());
    let mut visited = HashSet::new();
    visited.insert(module_dep.best_path().to_path_buf());
    let mut ret = vec![module_dep];

    let tree = match analyzer.analyze(module) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("could not inspect {}: {}", module.display(), e);
            return ret;
        }
    };
    let required = load_required_libs(&tree);
    for lib in tree.libraries.values() {
        let dep = Dependency::from_library(lib, &required);
        if visited.insert(dep.best_path().to_path_buf()) {
            log::trace!("dependency {} (required: {})", dep.best_path().display(), dep.required);
            ret.push(dep);
        }
    }
    ret
}

/// The resolved paths of all dependencies, failing on any missing required one.
pub fn resolved_dependencies(module: &Path) -> Result<Vec<PathBuf>, SandboxError> {
    let deps = find_module_dependencies(module);
    let missing: Vec<String> = deps
        .iter()
        .filter(|d| d.invalid())
        .map(|d| d.path.display().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SandboxError::ModuleLoad(format!(
            "{} is missing required libraries: {}",
            module.display(),
            missing.join(", ")
        )));
    }
    Ok(deps
        .into_iter()
        .filter_map(|d| d.realpath)
        .collect())
}

fn load_required_libs(tree: &lddtree::DependencyTree) -> HashSet<String> {
    let mut ret = HashSet::new();
    ret.extend(tree.needed.iter().cloned());
    for lib in tree.libraries.values() {
        ret.extend(lib.needed.iter().cloned());
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_library_has_dependencies() {
        let p_exec = which::which("ls").unwrap();

        let deps = find_module_dependencies(&p_exec);
        assert!(deps[0].exists());
        assert!(deps.len() > 1, "must have at least 1 library: {:?}", deps);
        for d in deps.iter().filter(|d| d.exists()) {
            assert!(d.best_path().exists(), "resolved should exist");
        }
    }

    #[test]
    fn missing_module_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let deps = find_module_dependencies(&dir.path().join("gone.so"));
        assert_eq!(deps.len(), 1);
        assert!(deps[0].invalid());
        assert!(resolved_dependencies(&dir.path().join("gone.so")).is_err());
    }
}
