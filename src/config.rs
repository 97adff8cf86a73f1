// SPDX-License-Identifier: MIT

//! Host configuration.
//!
//! Everything is read from the process environment, because the injector
//! prepares the host's environment before resuming it.  Unset variables take
//! the defaults below; both blocking waits are unbounded unless a timeout is
//! given.

use std::{collections::HashMap, ffi::OsString, path::PathBuf, time::Duration};

use crate::error::SandboxError;

pub const LAUNCH_VAR: &str = "SANDBOX_LAUNCH";
pub const SIGNAL_TIMEOUT_VAR: &str = "SANDBOX_SIGNAL_TIMEOUT_MS";
pub const CRASH_WORKER_TIMEOUT_VAR: &str = "SANDBOX_CRASH_WORKER_TIMEOUT_MS";
pub const CRASH_REPORTING_VAR: &str = "SANDBOX_CRASH_REPORTING";
pub const CRASH_REPORTER_VAR: &str = "SANDBOX_CRASH_REPORTER";
pub const CRASH_REPORTER_ENTRY_VAR: &str = "SANDBOX_CRASH_REPORTER_ENTRY";
pub const ENTRY_SYMBOL_VAR: &str = "SANDBOX_ENTRY_SYMBOL";
pub const CONFINE_VAR: &str = "SANDBOX_CONFINE";
pub const SIGNAL_DIR_VAR: &str = "SANDBOX_SIGNAL_DIR";

pub const DEFAULT_CRASH_REPORTER_ENTRY: &str = "ReportCrash";
pub const DEFAULT_ENTRY_SYMBOL: &str = "sandbox_main";

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// The encoded launch descriptor, if the injector supplied one.
    pub launch: Option<String>,
    /// How long to wait for the injector; `None` waits forever.
    pub signal_timeout: Option<Duration>,
    /// How long a faulting thread waits for the crash worker; `None` waits forever.
    /// A worker that outlives this keeps a fault record that is no longer valid;
    /// see `CrashTrampolineBuilder::worker_timeout`.
    pub crash_worker_timeout: Option<Duration>,
    /// Verification builds turn crash reporting off entirely.
    pub crash_reporting_disabled: bool,
    pub crash_reporter: Option<PathBuf>,
    pub crash_reporter_entry: String,
    pub entry_symbol: String,
    pub confine: bool,
    pub signal_dir: PathBuf,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            launch: None,
            signal_timeout: None,
            crash_worker_timeout: None,
            crash_reporting_disabled: false,
            crash_reporter: None,
            crash_reporter_entry: DEFAULT_CRASH_REPORTER_ENTRY.to_string(),
            entry_symbol: DEFAULT_ENTRY_SYMBOL.to_string(),
            confine: true,
            signal_dir: std::env::temp_dir(),
        }
    }
}

impl HostConfig {
    /// Load the configuration from the current process environment.
    pub fn from_env() -> Result<Self, SandboxError> {
        Self::from_vars(std::env::vars_os())
    }

    /// Load the configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, SandboxError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let vars: HashMap<OsString, OsString> = vars.into_iter().collect();
        let text = |name: &str| -> Result<Option<String>, SandboxError> {
            match vars.get(&OsString::from(name)) {
                None => Ok(None),
                Some(v) => v
                    .to_str()
                    .map(|s| Some(s.to_string()))
                    .ok_or_else(|| SandboxError::Config(format!("{name} is not valid unicode"))),
            }
        };

        let mut ret = HostConfig::default();
        ret.launch = text(LAUNCH_VAR)?;
        ret.signal_timeout = parse_millis(SIGNAL_TIMEOUT_VAR, text(SIGNAL_TIMEOUT_VAR)?)?;
        ret.crash_worker_timeout =
            parse_millis(CRASH_WORKER_TIMEOUT_VAR, text(CRASH_WORKER_TIMEOUT_VAR)?)?;
        if let Some(v) = text(CRASH_REPORTING_VAR)? {
            ret.crash_reporting_disabled = !parse_switch(CRASH_REPORTING_VAR, &v)?;
        }
        if let Some(v) = vars.get(&OsString::from(CRASH_REPORTER_VAR)) {
            if !v.is_empty() {
                ret.crash_reporter = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = text(CRASH_REPORTER_ENTRY_VAR)? {
            ret.crash_reporter_entry = non_empty(CRASH_REPORTER_ENTRY_VAR, v)?;
        }
        if let Some(v) = text(ENTRY_SYMBOL_VAR)? {
            ret.entry_symbol = non_empty(ENTRY_SYMBOL_VAR, v)?;
        }
        if let Some(v) = text(CONFINE_VAR)? {
            ret.confine = parse_switch(CONFINE_VAR, &v)?;
        }
        if let Some(v) = vars.get(&OsString::from(SIGNAL_DIR_VAR)) {
            if !v.is_empty() {
                ret.signal_dir = PathBuf::from(v);
            }
        }
        Ok(ret)
    }
}

fn parse_millis(name: &str, value: Option<String>) -> Result<Option<Duration>, SandboxError> {
    match value {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| SandboxError::Config(format!("{name}={v:?}: {e}"))),
    }
}

fn parse_switch(name: &str, value: &str) -> Result<bool, SandboxError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" | "enabled" => Ok(true),
        "0" | "off" | "false" | "no" | "disabled" => Ok(false),
        _ => Err(SandboxError::Config(format!("{name}={value:?} is not an on/off value"))),
    }
}

fn non_empty(name: &str, value: String) -> Result<String, SandboxError> {
    if value.is_empty() {
        Err(SandboxError::Config(format!("{name} must not be empty")))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(OsString, OsString)> {
        pairs
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect()
    }

    #[test]
    fn defaults_are_unbounded_and_enabled() {
        let config = HostConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config.launch, None);
        assert_eq!(config.signal_timeout, None);
        assert_eq!(config.crash_worker_timeout, None);
        assert!(!config.crash_reporting_disabled);
        assert!(config.crash_reporter.is_none());
        assert_eq!(config.crash_reporter_entry, DEFAULT_CRASH_REPORTER_ENTRY);
        assert_eq!(config.entry_symbol, DEFAULT_ENTRY_SYMBOL);
        assert!(config.confine);
    }

    #[test]
    fn reads_all_variables() {
        let config = HostConfig::from_vars(vars(&[
            (LAUNCH_VAR, "evt1 \"app.dll\""),
            (SIGNAL_TIMEOUT_VAR, "1500"),
            (CRASH_WORKER_TIMEOUT_VAR, " 20 "),
            (CRASH_REPORTING_VAR, "disabled"),
            (CRASH_REPORTER_VAR, "reporter.dll"),
            (CRASH_REPORTER_ENTRY_VAR, "Report"),
            (ENTRY_SYMBOL_VAR, "main_entry"),
            (CONFINE_VAR, "off"),
            (SIGNAL_DIR_VAR, "/run/sandbox"),
        ]))
        .unwrap();
        assert_eq!(config.launch.as_deref(), Some("evt1 \"app.dll\""));
        assert_eq!(config.signal_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.crash_worker_timeout, Some(Duration::from_millis(20)));
        assert!(config.crash_reporting_disabled);
        assert_eq!(config.crash_reporter, Some(PathBuf::from("reporter.dll")));
        assert_eq!(config.crash_reporter_entry, "Report");
        assert_eq!(config.entry_symbol, "main_entry");
        assert!(!config.confine);
        assert_eq!(config.signal_dir, PathBuf::from("/run/sandbox"));
    }

    #[test]
    fn rejects_malformed_timeout() {
        let err = HostConfig::from_vars(vars(&[(SIGNAL_TIMEOUT_VAR, "soon")])).unwrap_err();
        match err {
            SandboxError::Config(msg) => assert!(msg.contains(SIGNAL_TIMEOUT_VAR), "{}", msg),
            e => panic!("unexpected error variant: {:?}", e),
        }
    }

    #[test]
    fn rejects_unknown_switch() {
        assert!(HostConfig::from_vars(vars(&[(CONFINE_VAR, "maybe")])).is_err());
    }

    #[test]
    fn rejects_empty_entry_symbol() {
        assert!(HostConfig::from_vars(vars(&[(ENTRY_SYMBOL_VAR, "")])).is_err());
    }
}
