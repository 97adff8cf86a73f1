// SPDX-License-Identifier: MIT

//! The trampoline and the launcher, composed as in the host binary.

use std::{
    ffi::OsString,
    sync::Arc,
    time::Duration,
};

use crate::{
    error::SandboxError,
    launcher::{
        ContextFactory, ContextSpec, IsolatedContext, ReadySignal, SandboxLauncher, SignalSource,
    },
    trampoline::{
        CrashTrampoline, Disposition, FaultEvent, FilterRef,
        fakes::{CountingInstaller, FAKE_OWN_FILTER, Journal, JournalSink, JournalSpawner},
        hook::{FilterRegistrationHook, bind_registration_hook, intercept_registration},
    },
};

struct ReadyNow;

impl SignalSource for ReadyNow {
    fn open(&self, _name: &str) -> Result<Box<dyn ReadySignal>, SandboxError> {
        Ok(Box::new(ReadyNow))
    }
}

impl ReadySignal for ReadyNow {
    fn wait(&self, _timeout: Option<Duration>) -> Result<(), SandboxError> {
        Ok(())
    }
}

/// A target that replaces the fault filter and then crashes.
struct MisbehavingTargets {
    trampoline: Arc<CrashTrampoline>,
    hook: Arc<FilterRegistrationHook>,
    journal: Journal,
}

struct MisbehavingTarget {
    trampoline: Arc<CrashTrampoline>,
    hook: Arc<FilterRegistrationHook>,
    journal: Journal,
}

impl ContextFactory for MisbehavingTargets {
    fn create(&self, _spec: &ContextSpec) -> Result<Box<dyn IsolatedContext>, SandboxError> {
        self.journal.push("create");
        Ok(Box::new(MisbehavingTarget {
            trampoline: Arc::clone(&self.trampoline),
            hook: Arc::clone(&self.hook),
            journal: self.journal.clone(),
        }))
    }
}

impl IsolatedContext for MisbehavingTarget {
    fn execute(&mut self, _args: &[OsString]) -> Result<i32, SandboxError> {
        let previous = self.hook.intercept(FilterRef::from_raw(0xbad0));
        self.journal.push(&format!("previous {previous}"));
        Ok(self.trampoline.filter(FaultEvent::from_raw(0xfa17)).code())
    }
}

impl Drop for MisbehavingTarget {
    fn drop(&mut self) {
        self.journal.push("teardown");
    }
}

fn compose(disabled: bool) -> (SandboxLauncher, Arc<CrashTrampoline>, Journal) {
    let journal = Journal::new();
    let report_journal = journal.clone();
    let shutdown_journal = journal.clone();
    let trampoline = CrashTrampoline::builder(move || shutdown_journal.push("shutdown"))
        .disabled(disabled)
        .diagnostics(Arc::new(JournalSink(journal.clone())))
        .spawner(Box::new(JournalSpawner(journal.clone())))
        .reporter(Arc::new(
            move |e: FaultEvent| -> Result<Disposition, SandboxError> {
                report_journal.push(&format!("report {e}"));
                Ok(Disposition::CONTINUE_SEARCH)
            },
        ))
        .install(&CountingInstaller::new())
        .unwrap();
    let trampoline = Arc::new(trampoline);
    let hook = Arc::new(FilterRegistrationHook::new(Box::new(trampoline.override_policy())));
    let launcher = SandboxLauncher::new(
        Box::new(ReadyNow),
        Box::new(MisbehavingTargets {
            trampoline: Arc::clone(&trampoline),
            hook,
            journal: journal.clone(),
        }),
    );
    (launcher, trampoline, journal)
}

#[test]
fn crashing_target_is_reported_through_the_trampoline() {
    let (launcher, trampoline, journal) = compose(false);

    let code = launcher.run(r#"ready "target.module""#, &[]).unwrap();

    assert_eq!(code, Disposition::CONTINUE_SEARCH.code());
    assert_eq!(trampoline.registration().active_filter(), FAKE_OWN_FILTER);
    let entries: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|e| !e.starts_with("log:"))
        .collect();
    assert_eq!(
        entries,
        vec![
            "create".to_string(),
            format!("previous {FAKE_OWN_FILTER}"),
            "spawn".to_string(),
            "report 0xfa17".to_string(),
            "shutdown".to_string(),
            "teardown".to_string(),
        ]
    );
}

#[test]
fn disabled_trampoline_never_reports() {
    let (launcher, _trampoline, journal) = compose(true);

    let code = launcher.run(r#"ready "target.module""#, &[]).unwrap();

    assert_eq!(code, Disposition::EXECUTE_HANDLER.code());
    assert_eq!(journal.count("spawn"), 0);
    assert_eq!(journal.count("shutdown"), 0);
    assert!(journal.entries().iter().all(|e| !e.starts_with("report")));
}

// The only test that binds the process-wide hook.
#[test]
fn bound_hook_keeps_the_trampoline() {
    let installer = CountingInstaller::new();
    let trampoline = CrashTrampoline::install(|| (), false, &installer).unwrap();

    bind_registration_hook(FilterRegistrationHook::new(Box::new(trampoline.override_policy())))
        .unwrap();
    assert_eq!(
        intercept_registration(FilterRef::from_raw(0x77)),
        Some(FAKE_OWN_FILTER)
    );
    assert!(
        bind_registration_hook(FilterRegistrationHook::new(Box::new(
            trampoline.override_policy()
        )))
        .is_err()
    );
    assert_eq!(installer.calls(), 1);
}
