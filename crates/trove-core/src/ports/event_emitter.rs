//! Event emitter port definitions.
//!
//! Emission is fire-and-forget from the emitting side; delivery and
//! notification construction are the shell's concern. Noop
//! implementations exist for headless contexts and tests.

use crate::events::{CheckEvent, InstallEvent};

/// Port for surfacing update-check events.
pub trait CheckEventEmitter: Send + Sync {
    /// Emit one event. Must not block.
    fn emit(&self, event: CheckEvent);
}

/// Port for surfacing installation lifecycle events.
pub trait InstallEventEmitter: Send + Sync {
    /// Emit one event. Must not block.
    fn emit(&self, event: InstallEvent);
}

/// Emitter that drops every check event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCheckEmitter;

impl CheckEventEmitter for NoopCheckEmitter {
    fn emit(&self, _event: CheckEvent) {}
}

/// Emitter that drops every install event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopInstallEmitter;

impl InstallEventEmitter for NoopInstallEmitter {
    fn emit(&self, _event: InstallEvent) {}
}
