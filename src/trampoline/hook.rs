// SPDX-License-Identifier: MIT

//! Interception of fault filter registration.
//!
//! The hooking engine redirects every call the sandboxed code makes to the
//! OS's "set the unhandled fault filter" function here.  What happens to the
//! call is decided by a `RegistrationPolicy` bound in at composition time;
//! the host binds `AlwaysOverride`, which keeps the trampoline installed no
//! matter what the caller asked for.

use std::sync::{Arc, OnceLock};

use super::{FilterRef, diagnostics::DiagnosticSink, registration::FilterRegistration};
use crate::error::SandboxError;

/// Decides the outcome of an intercepted registration.
pub trait RegistrationPolicy: Send + Sync {
    /// Handle a registration of `requested`.  The return value is what the
    /// caller receives as the previously installed filter.
    fn on_register(&self, requested: FilterRef) -> FilterRef;
}

/// The trampoline always wins.
///
/// The caller gets the trampoline back as the "previous" filter, so a caller
/// that later restores what it replaced just re-installs the trampoline.
pub struct AlwaysOverride {
    registration: Arc<FilterRegistration>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl AlwaysOverride {
    pub fn new(registration: Arc<FilterRegistration>, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        AlwaysOverride {
            registration,
            diagnostics,
        }
    }
}

impl RegistrationPolicy for AlwaysOverride {
    fn on_register(&self, requested: FilterRef) -> FilterRef {
        self.diagnostics.write_line(&format!(
            "sandboxed code tried to install fault filter {requested}; keeping {}",
            self.registration.own_filter()
        ));
        self.registration.reassert()
    }
}

/// The real registration function, as handed over by the hooking engine.
pub type OriginalRegistration = Box<dyn Fn(FilterRef) -> FilterRef + Send + Sync>;

/// The interception point for filter registration.
pub struct FilterRegistrationHook {
    policy: Box<dyn RegistrationPolicy>,
    original: Option<OriginalRegistration>,
}

impl FilterRegistrationHook {
    pub fn new(policy: Box<dyn RegistrationPolicy>) -> Self {
        FilterRegistrationHook {
            policy,
            original: None,
        }
    }

    /// Keep the engine's pass-through to the real function.  It is held
    /// only so that nothing else can call it; the hook never does.
    pub fn with_original(mut self, original: OriginalRegistration) -> Self {
        self.original = Some(original);
        self
    }

    /// Handle a registration made by sandboxed code.
    pub fn intercept(&self, requested: FilterRef) -> FilterRef {
        self.policy.on_register(requested)
    }

    /// Pass-through requested by the hooking engine.
    ///
    /// Forwarding would let sandboxed code replace the trampoline, so this is
    /// a programming error: it panics in debug builds, and in release builds
    /// it is logged and handled as an ordinary interception.
    pub fn forward(&self, requested: FilterRef) -> FilterRef {
        debug_assert!(
            false,
            "fault filter registration must never be forwarded (requested {requested})"
        );
        log::error!(
            "refusing to forward fault filter registration of {requested} (pass-through {})",
            if self.original.is_some() { "bound" } else { "unbound" }
        );
        self.intercept(requested)
    }
}

static REGISTRATION_HOOK: OnceLock<FilterRegistrationHook> = OnceLock::new();

/// Bind the process-wide interception point.  Only one binding is allowed.
pub fn bind_registration_hook(hook: FilterRegistrationHook) -> Result<(), SandboxError> {
    REGISTRATION_HOOK
        .set(hook)
        .map_err(|_| SandboxError::Install("registration hook is already bound".to_string()))
}

/// Route a registration through the bound hook.  `None` when nothing is bound.
pub fn intercept_registration(requested: FilterRef) -> Option<FilterRef> {
    REGISTRATION_HOOK.get().map(|h| h.intercept(requested))
}
