// SPDX-License-Identifier: MIT

//! Confine the launcher thread with Landlock before the target runs.
//!
//! Landlock restrictions apply to the calling thread and anything it later
//! spawns.  They cannot be undone, so the launcher thread stays confined
//! after the context is torn down.  It has an
//! [official website](https://landlock.io/).

use std::path::PathBuf;

use landlock::{
    ABI, Access, AccessFs, Compatible, LandlockStatus, Ruleset, RulesetAttr, RulesetCreatedAttr,
    path_beneath_rules,
};

use crate::error::SandboxError;

pub struct LandlockJail {
    ruleset: landlock::RulesetCreated,
}

impl LandlockJail {
    /// `read_paths` stay readable (and executable); everything beneath
    /// `full_paths` stays fully accessible.  Paths that do not exist are
    /// skipped.
    pub fn new(read_paths: &[PathBuf], full_paths: &[PathBuf]) -> Result<Self, SandboxError> {
        let read: Vec<&PathBuf> = read_paths.iter().filter(|p| p.exists()).collect();
        let full: Vec<&PathBuf> = full_paths.iter().filter(|p| p.exists()).collect();
        Ok(LandlockJail {
            ruleset: new_ruleset(&read, &full)
                .map_err(|e| SandboxError::ContextSetup(e.to_string()))?,
        })
    }

    /// Restrict the calling thread.
    pub fn restrict(self) -> Result<(), SandboxError> {
        let status = self
            .ruleset
            .restrict_self()
            .map_err(|e| SandboxError::ContextSetup(e.to_string()))?;
        match status.landlock {
            // Re-enable by prepending "landlock," to CONFIG_LSM, or to the
            // "lsm" kernel parameter at boot.
            LandlockStatus::NotEnabled => Err(SandboxError::JailNotSupported(
                "landlock is disabled in this kernel".to_string(),
            )),
            LandlockStatus::NotImplemented => Err(SandboxError::JailNotSupported(
                "landlock is not built into this kernel".to_string(),
            )),
            LandlockStatus::Available { effective_abi, .. } => {
                log::debug!("launcher thread confined (landlock {:?})", effective_abi);
                Ok(())
            }
        }
    }
}

fn new_ruleset(
    read_paths: &[&PathBuf],
    full_paths: &[&PathBuf],
) -> Result<landlock::RulesetCreated, landlock::RulesetError> {
    let abi = ABI::V1;
    Ruleset::default()
        .set_compatibility(landlock::CompatLevel::HardRequirement)
        .handle_access(AccessFs::from_all(abi))?
        .create()?
        .add_rules(path_beneath_rules(read_paths, AccessFs::from_read(abi)))?
        .add_rules(path_beneath_rules(full_paths, AccessFs::from_all(abi)))
}
