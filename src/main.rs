// SPDX-License-Identifier: MIT

//! The sandbox host binary.
//!
//! Order matters: the trampoline and the registration hook are in place
//! before any target code is loaded.

use std::{ffi::OsString, sync::Arc};

use sandboxhost::{
    HostConfig, SandboxError, SandboxLauncher,
    config::LAUNCH_VAR,
    trampoline::{
        CrashReporter, CrashTrampoline, LogOnlyReporter, ModuleCrashReporter,
        NativeFilterInstaller, hook::{FilterRegistrationHook, bind_registration_hook},
    },
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            log::error!("sandbox host failed: {}", e);
            match e.code() {
                Some(c) => c.code(),
                None => 1,
            }
        }
    };
    log::logger().flush();
    std::process::exit(code);
}

fn run() -> Result<i32, SandboxError> {
    let config = HostConfig::from_env()?;
    log::debug!("host configuration: {:?}", config);

    let trampoline = install_trampoline(&config)?;
    bind_registration_hook(FilterRegistrationHook::new(Box::new(
        trampoline.override_policy(),
    )))?;

    let launch = config
        .launch
        .clone()
        .ok_or_else(|| SandboxError::Config(format!("{LAUNCH_VAR} is not set")))?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    SandboxLauncher::for_platform(&config).run(&launch, &args)
}

fn install_trampoline(config: &HostConfig) -> Result<CrashTrampoline, SandboxError> {
    let reporter: Arc<dyn CrashReporter> = match &config.crash_reporter {
        Some(path) => Arc::new(ModuleCrashReporter::load(path, &config.crash_reporter_entry)?),
        None => Arc::new(LogOnlyReporter),
    };
    CrashTrampoline::builder(shut_down_logging)
        .disabled(config.crash_reporting_disabled)
        .reporter(reporter)
        .worker_timeout(config.crash_worker_timeout)
        .install(&NativeFilterInstaller)
}

/// The host's own subsystems are told to stop after a crash report.
fn shut_down_logging() {
    log::logger().flush();
    log::set_max_level(log::LevelFilter::Off);
}
