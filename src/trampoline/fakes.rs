// SPDX-License-Identifier: MIT

//! Test doubles for the trampoline's collaborators.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::JoinHandle,
};

use super::{
    FilterRef,
    diagnostics::DiagnosticSink,
    handler::{CrashHandler, WorkerSpawner, WorkerTask},
    registration::{FilterInstaller, FilterState, InstalledFilter},
};
use crate::error::SandboxError;

/// Ordered record of what happened, shared between the fakes.
#[derive(Clone)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Journal(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn push(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

pub struct JournalSink(pub Journal);

impl DiagnosticSink for JournalSink {
    fn write_line(&self, line: &str) {
        self.0.push(&format!("log:{line}"));
    }
}

/// Records the spawn, then starts a real thread.
pub struct JournalSpawner(pub Journal);

impl WorkerSpawner for JournalSpawner {
    fn spawn(&self, task: WorkerTask) -> std::io::Result<JoinHandle<()>> {
        self.0.push("spawn");
        std::thread::Builder::new().spawn(task)
    }
}

pub struct FailingSpawner;

impl WorkerSpawner for FailingSpawner {
    fn spawn(&self, _task: WorkerTask) -> std::io::Result<JoinHandle<()>> {
        Err(std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no more threads"))
    }
}

pub const FAKE_OWN_FILTER: FilterRef = FilterRef(0x1000);
pub const FAKE_DISABLED_FILTER: FilterRef = FilterRef(0x2000);
pub const FAKE_PREVIOUS_FILTER: FilterRef = FilterRef(0x3000);

/// Stands in for the OS registration call, counting every use.
#[derive(Clone)]
pub struct CountingInstaller {
    pub calls: Arc<AtomicUsize>,
}

impl CountingInstaller {
    pub fn new() -> Self {
        CountingInstaller {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FilterInstaller for CountingInstaller {
    fn install(
        &self,
        state: FilterState,
        _handler: Arc<CrashHandler>,
    ) -> Result<InstalledFilter, SandboxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(InstalledFilter {
            own: match state {
                FilterState::Active => FAKE_OWN_FILTER,
                FilterState::Disabled => FAKE_DISABLED_FILTER,
            },
            previous: FAKE_PREVIOUS_FILTER,
        })
    }
}
