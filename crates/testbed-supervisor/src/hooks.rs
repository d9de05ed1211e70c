//! Scenario-hook surface for the test runner.
//!
//! The runner's tag-matching and dispatch mechanism stays external; it
//! only needs to call [`ScenarioHooks::before_scenario`] with the
//! scenario's tags and [`ScenarioHooks::after_scenario`] when it is done.
//! The lifecycle itself sits behind the [`ServerLifecycle`] seam so hook
//! dispatch is testable without spawning anything.

use crate::error::Result;
use crate::supervisor::Supervisor;
use tracing::debug;

/// Tag marking scenarios that need strict (non-legacy) identifiers.
pub const DATABASE_TAG: &str = "database";

/// Tag marking scenarios that manage the server themselves.
pub const NOSTART_TAG: &str = "nostart";

/// The three operations the hook dispatcher wires into.
#[cfg_attr(test, mockall::automock)]
pub trait ServerLifecycle {
    fn set_legacy_id_mode(&mut self, enabled: bool);
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
}

impl ServerLifecycle for Supervisor {
    fn set_legacy_id_mode(&mut self, enabled: bool) {
        Supervisor::set_legacy_id_mode(self, enabled);
    }

    fn start(&mut self) -> Result<()> {
        Supervisor::start(self)
    }

    fn stop(&mut self) -> Result<()> {
        Supervisor::stop(self)
    }
}

/// Owns the lifecycle value and applies the tag rules.
#[derive(Debug)]
pub struct ScenarioHooks<L> {
    lifecycle: L,
}

impl<L: ServerLifecycle> ScenarioHooks<L> {
    pub fn new(lifecycle: L) -> Self {
        Self { lifecycle }
    }

    /// Runs before a scenario.
    ///
    /// A `database` tag switches the server to strict identifier
    /// generation; unless the scenario carries `nostart`, the server is
    /// then started and this call blocks until it is ready.
    pub fn before_scenario(&mut self, tags: &[impl AsRef<str>]) -> Result<()> {
        if tags.iter().any(|tag| tag.as_ref() == DATABASE_TAG) {
            debug!("scenario requests strict identifier generation");
            self.lifecycle.set_legacy_id_mode(false);
        }

        if tags.iter().any(|tag| tag.as_ref() == NOSTART_TAG) {
            debug!("scenario manages the server itself; skipping start");
            return Ok(());
        }

        self.lifecycle.start()
    }

    /// Runs after every scenario, unconditionally stopping the server.
    pub fn after_scenario(&mut self) -> Result<()> {
        self.lifecycle.stop()
    }

    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut L {
        &mut self.lifecycle
    }
}
