// SPDX-License-Identifier: MIT

//! Bootstrap of the sandboxed target.
//!
//! The injector resumes the host with a launch descriptor naming a ready
//! signal and the target.  The launcher waits for that signal, builds an
//! isolated context rooted at the current directory, runs the target in it
//! and tears it down again, whatever the outcome.

use std::{ffi::OsString, marker::PhantomData, path::PathBuf, time::Duration};

use crate::{config::HostConfig, error::SandboxError};

pub mod apartment;
pub mod context;
pub mod descriptor;
pub mod signal;

#[cfg(target_os = "linux")]
mod context_linux;
#[cfg(target_os = "linux")]
mod dependencies;
#[cfg(target_os = "linux")]
mod jail;
#[cfg(target_os = "linux")]
pub mod signal_linux;

#[cfg(target_os = "windows")]
mod context_windows;
#[cfg(target_os = "windows")]
pub mod signal_windows;

pub use apartment::Apartment;
pub use context::{ContextFactory, ContextSpec, IsolatedContext, ModuleContextFactory, TargetEntry};
pub use descriptor::{DescriptorError, LaunchDescriptor};
pub use signal::{ReadySignal, SignalSource};

/// Runs one target per call, on the thread that created it.
///
/// Not `Send`: the whole launch must stay on the thread whose threading
/// affinity the target expects.
pub struct SandboxLauncher {
    signals: Box<dyn SignalSource>,
    contexts: Box<dyn ContextFactory>,
    signal_timeout: Option<Duration>,
    _same_thread: PhantomData<*const ()>,
}

impl SandboxLauncher {
    pub fn new(signals: Box<dyn SignalSource>, contexts: Box<dyn ContextFactory>) -> Self {
        SandboxLauncher {
            signals,
            contexts,
            signal_timeout: None,
            _same_thread: PhantomData,
        }
    }

    /// The launcher the host uses on this platform.
    pub fn for_platform(config: &HostConfig) -> Self {
        Self::new(
            platform_signal_source(config),
            Box::new(ModuleContextFactory::new(&config.entry_symbol, config.confine)),
        )
        .with_signal_timeout(config.signal_timeout)
    }

    /// Bound the wait for the ready signal.  `None`, the default, waits forever.
    pub fn with_signal_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.signal_timeout = timeout;
        self
    }

    /// Launch the target described by `descriptor`, passing `args` through.
    ///
    /// Returns the target's exit code.  Any failure before the target runs
    /// leaves no context behind, and a created context is always torn down
    /// before this returns.
    pub fn run(&self, descriptor: &str, args: &[OsString]) -> Result<i32, SandboxError> {
        let descriptor = LaunchDescriptor::parse(descriptor)?;
        let _apartment = Apartment::enter()?;
        log::info!(
            "launching {} once {} is signaled",
            descriptor.target_path(),
            descriptor.signal_name()
        );

        {
            let ready = self.signals.open(descriptor.signal_name())?;
            ready.wait(self.signal_timeout)?;
        }
        log::debug!("{} signaled", descriptor.signal_name());

        let spec = ContextSpec {
            module_path: PathBuf::from(descriptor.target_path()),
            config_path: descriptor.config_path(),
            base_dir: std::env::current_dir()?,
        };
        let mut context = self.contexts.create(&spec)?;
        let ret = context.execute(args);
        drop(context);

        match &ret {
            Ok(code) => log::info!("{} exited with {}", descriptor.target_path(), code),
            Err(e) => log::error!("{} failed: {}", descriptor.target_path(), e),
        }
        ret
    }
}

#[cfg(target_os = "linux")]
fn platform_signal_source(config: &HostConfig) -> Box<dyn SignalSource> {
    Box::new(signal_linux::FifoSignalSource::new(config.signal_dir.clone()))
}

#[cfg(target_os = "windows")]
fn platform_signal_source(_config: &HostConfig) -> Box<dyn SignalSource> {
    Box::new(signal_windows::NamedEventSource)
}
