// SPDX-License-Identifier: MIT

//! The line-oriented diagnostic channel used while handling faults.

/// Log target for everything the trampoline writes.
pub const CRASH_LOG_TARGET: &str = "sandboxhost::crash";

/// Where the trampoline writes its diagnostics.
///
/// Implementations must not panic; they run on a thread that has already
/// faulted.
pub trait DiagnosticSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Forwards to the `log` facade.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn write_line(&self, line: &str) {
        log::warn!(target: CRASH_LOG_TARGET, "{line}");
    }
}
