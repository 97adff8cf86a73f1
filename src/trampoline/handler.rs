// SPDX-License-Identifier: MIT

//! The fault handling protocol.
//!
//! Runs on whichever thread faulted.  Every failure in here is logged and
//! swallowed: an error escaping the filter would be a second unhandled fault
//! raised while handling the first.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    thread::JoinHandle,
    time::Duration,
};

use super::{Disposition, FaultEvent, diagnostics::DiagnosticSink, reporter::CrashReporter};

pub type ShutdownCallback = Box<dyn Fn() + Send + Sync>;

pub type WorkerTask = Box<dyn FnOnce() + Send + 'static>;

/// Creates the thread that talks to the crash reporter.
///
/// Implementations must create a brand new OS thread.  Handing the task to a
/// pool that the hooking layer also uses can deadlock against a lock the
/// faulting thread still holds.
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self, task: WorkerTask) -> std::io::Result<JoinHandle<()>>;
}

/// Spawns a plain, unmanaged OS thread per fault.
pub struct OsThreadSpawner;

impl WorkerSpawner for OsThreadSpawner {
    fn spawn(&self, task: WorkerTask) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("crash-report".to_string())
            .spawn(task)
    }
}

pub struct CrashHandler {
    reporter: Arc<dyn CrashReporter>,
    diagnostics: Arc<dyn DiagnosticSink>,
    spawner: Box<dyn WorkerSpawner>,
    shutdown: ShutdownCallback,
    worker_timeout: Option<Duration>,
    disabled: bool,
}

impl CrashHandler {
    pub(crate) fn new(
        reporter: Arc<dyn CrashReporter>,
        diagnostics: Arc<dyn DiagnosticSink>,
        spawner: Box<dyn WorkerSpawner>,
        shutdown: ShutdownCallback,
        worker_timeout: Option<Duration>,
        disabled: bool,
    ) -> Self {
        CrashHandler {
            reporter,
            diagnostics,
            spawner,
            shutdown,
            worker_timeout,
            disabled,
        }
    }

    /// The filter body.  A disabled handler asks for the default handler
    /// without reporting anything.
    pub fn filter(&self, event: FaultEvent) -> Disposition {
        if self.disabled {
            return Disposition::EXECUTE_HANDLER;
        }
        self.handle_fault(event)
    }

    fn handle_fault(&self, event: FaultEvent) -> Disposition {
        self.diagnostics
            .write_line(&format!("unhandled fault {event}; handing off to the crash reporter"));
        let mut pending = Disposition::CONTINUE_SEARCH;

        // Each fault gets its own result slot, so faults on different threads
        // never see each other's disposition.
        let (tx, rx) = mpsc::sync_channel::<Disposition>(1);
        let reporter = Arc::clone(&self.reporter);
        let diagnostics = Arc::clone(&self.diagnostics);
        let task: WorkerTask = Box::new(move || {
            let result = report_fault(reporter.as_ref(), diagnostics.as_ref(), event);
            // The faulting thread may have given up waiting.
            let _ = tx.send(result);
        });

        match self.spawner.spawn(task) {
            Ok(worker) => {
                pending = self.await_worker(worker, rx);
            }
            Err(e) => {
                self.diagnostics
                    .write_line(&format!("could not create the crash worker thread: {e}"));
            }
        }

        self.run_shutdown();
        pending
    }

    fn await_worker(&self, worker: JoinHandle<()>, rx: Receiver<Disposition>) -> Disposition {
        let received = match self.worker_timeout {
            None => rx.recv().ok(),
            Some(limit) => match rx.recv_timeout(limit) {
                Ok(d) => Some(d),
                Err(RecvTimeoutError::Timeout) => {
                    // Dropping the join handle detaches the worker, which
                    // still holds the fault record past its lifetime.
                    self.diagnostics.write_line(&format!(
                        "crash worker did not finish within {limit:?}; abandoning it"
                    ));
                    return Disposition::CONTINUE_SEARCH;
                }
                Err(RecvTimeoutError::Disconnected) => None,
            },
        };
        if worker.join().is_err() {
            self.diagnostics.write_line("crash worker thread panicked");
        }
        received.unwrap_or(Disposition::CONTINUE_SEARCH)
    }

    fn run_shutdown(&self) {
        // Logging is among the things being shut down, so a failure here has
        // nowhere left to go.
        let _ = panic::catch_unwind(AssertUnwindSafe(|| (self.shutdown)()));
    }
}

/// Worker thread body.
fn report_fault(
    reporter: &dyn CrashReporter,
    diagnostics: &dyn DiagnosticSink,
    event: FaultEvent,
) -> Disposition {
    match panic::catch_unwind(AssertUnwindSafe(|| reporter.report(event))) {
        Ok(Ok(d)) => d,
        Ok(Err(e)) => {
            diagnostics.write_line(&format!("crash report for fault {event} failed: {e}"));
            Disposition::CONTINUE_SEARCH
        }
        Err(_) => {
            diagnostics.write_line(&format!("crash reporter panicked on fault {event}"));
            Disposition::CONTINUE_SEARCH
        }
    }
}
