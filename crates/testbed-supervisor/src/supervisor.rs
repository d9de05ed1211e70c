//! The supervisor state machine.
//!
//! One explicitly owned value, one process slot. The lifecycle is
//! `configure*` → `start` (prepare dirs, launch, poll to `Ready` or fail
//! with a timeout) → scenario runs → `stop` (PID-file kill), after which
//! the slot is free for the next scenario.

use crate::error::{Result, SupervisorError};
use crate::launch;
use crate::readiness::{self, Clock, HttpProbe, Readiness, StatusProbe, SystemClock};
use crate::shutdown;
use std::process::Child;
use testbed_config::SupervisorConfig;
use tracing::info;

/// Lifecycle supervisor for a single server-under-test process.
pub struct Supervisor {
    config: SupervisorConfig,
    legacy_id_mode: bool,
    process: Option<Child>,
    /// Handle of the last stopped child, kept until it can be reaped.
    defunct: Option<Child>,
}

impl Supervisor {
    /// Creates a supervisor with an empty process slot.
    ///
    /// Legacy identifier generation defaults to on; scenarios that need
    /// strict identifiers opt out via [`Supervisor::set_legacy_id_mode`]
    /// before calling [`Supervisor::start`].
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            legacy_id_mode: true,
            process: None,
            defunct: None,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Sets the identifier-generation toggle forwarded to the server.
    ///
    /// Read exactly once per [`Supervisor::start`]; mutating it after
    /// launch has no effect on the already-running process. Last write
    /// wins.
    pub fn set_legacy_id_mode(&mut self, enabled: bool) {
        self.legacy_id_mode = enabled;
    }

    pub fn legacy_id_mode(&self) -> bool {
        self.legacy_id_mode
    }

    /// PID of the launched child, while the slot is occupied.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(Child::id)
    }

    /// Launches the server and blocks until it reports ready.
    ///
    /// All-or-nothing: on success the server is observably healthy; on
    /// [`SupervisorError::SetupTimeout`] the scenario must treat setup as
    /// failed. There is no retry and no early cancellation.
    pub fn start(&mut self) -> Result<()> {
        let probe = HttpProbe::for_config(&self.config)?;
        self.start_with(&probe, &SystemClock)
    }

    /// [`Supervisor::start`] with injected probe and clock.
    pub fn start_with<P, C>(&mut self, probe: &P, clock: &C) -> Result<()>
    where
        P: StatusProbe + ?Sized,
        C: Clock + ?Sized,
    {
        if self.process.is_some() {
            return Err(SupervisorError::AlreadyRunning);
        }

        self.reap_defunct();

        let child = launch::spawn(&self.config, self.legacy_id_mode)?;

        match readiness::wait_for_ready(
            probe,
            clock,
            self.config.poll_interval(),
            self.config.ready_timeout(),
        ) {
            Readiness::Ready { attempts } => {
                info!(pid = child.id(), attempts, "server under test is ready");
                self.process = Some(child);
                Ok(())
            }
            Readiness::TimedOut { waited } => Err(SupervisorError::SetupTimeout { waited }),
        }
    }

    /// Terminates the server recorded in the PID file.
    ///
    /// The slot is freed even when termination fails: the in-memory
    /// handle may have outlived the process's own record of itself and
    /// is never trusted for termination. The handle is retained until
    /// the next [`Supervisor::start`] so the killed child can be reaped
    /// without waiting for it here.
    pub fn stop(&mut self) -> Result<()> {
        self.defunct = self.process.take();
        shutdown::kill_recorded(&self.config.pid_file())?;
        Ok(())
    }

    /// Collects the previously stopped child if it has exited.
    ///
    /// Non-blocking; a child that somehow survived its SIGKILL stays
    /// parked for the next attempt.
    fn reap_defunct(&mut self) {
        if let Some(mut child) = self.defunct.take() {
            match child.try_wait() {
                Ok(Some(_)) | Err(_) => {}
                Ok(None) => self.defunct = Some(child),
            }
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("legacy_id_mode", &self.legacy_id_mode)
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::ProbeError;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::time::{Duration, Instant};

    struct FakeClock {
        now: Cell<Instant>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now: Cell::new(Instant::now()),
            }
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.now.set(self.now.get() + duration);
        }
    }

    struct ScriptedProbe {
        outcomes: RefCell<VecDeque<std::result::Result<(), ProbeError>>>,
    }

    impl ScriptedProbe {
        fn always_ok() -> Self {
            Self::new((0..4).map(|_| Ok(())).collect())
        }

        fn never_ok() -> Self {
            Self::new(Vec::new())
        }

        fn new(outcomes: Vec<std::result::Result<(), ProbeError>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.into()),
            }
        }
    }

    impl StatusProbe for ScriptedProbe {
        fn check(&self) -> std::result::Result<(), ProbeError> {
            self.outcomes
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ProbeError::Transport("connection refused".into())))
        }
    }

    fn supervisor_in(dir: &tempfile::TempDir) -> Supervisor {
        Supervisor::new(SupervisorConfig {
            program: "true".to_string(),
            work_dir: dir.path().to_path_buf(),
            ..SupervisorConfig::default()
        })
    }

    #[test]
    fn legacy_id_mode_defaults_to_true() {
        let dir = tempfile::tempdir().unwrap();
        assert!(supervisor_in(&dir).legacy_id_mode());
    }

    #[test]
    fn legacy_id_mode_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = supervisor_in(&dir);
        supervisor.set_legacy_id_mode(false);
        supervisor.set_legacy_id_mode(true);
        assert!(supervisor.legacy_id_mode());
    }

    #[test]
    fn start_occupies_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = supervisor_in(&dir);

        supervisor
            .start_with(&ScriptedProbe::always_ok(), &FakeClock::new())
            .unwrap();
        assert!(supervisor.pid().is_some());

        let err = supervisor
            .start_with(&ScriptedProbe::always_ok(), &FakeClock::new())
            .unwrap_err();
        assert!(matches!(err, SupervisorError::AlreadyRunning));
    }

    #[test]
    fn timeout_leaves_the_slot_free() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = supervisor_in(&dir);

        let err = supervisor
            .start_with(&ScriptedProbe::never_ok(), &FakeClock::new())
            .unwrap_err();
        assert!(matches!(err, SupervisorError::SetupTimeout { .. }));
        assert!(supervisor.pid().is_none());

        // A later attempt is not blocked by the failed one.
        supervisor
            .start_with(&ScriptedProbe::always_ok(), &FakeClock::new())
            .unwrap();
    }

    #[test]
    fn stop_kills_the_recorded_pid_and_frees_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = supervisor_in(&dir);

        supervisor
            .start_with(&ScriptedProbe::always_ok(), &FakeClock::new())
            .unwrap();
        let pid = supervisor.pid().unwrap();

        // The launched `true` binary does not write a PID file itself, so
        // record its pid the way the real server would.
        std::fs::create_dir_all(supervisor.config().tmp_dir()).unwrap();
        std::fs::write(supervisor.config().pid_file(), format!("{pid}\n")).unwrap();

        supervisor.stop().unwrap();
        assert!(supervisor.pid().is_none());

        // The slot accepts the next scenario.
        supervisor
            .start_with(&ScriptedProbe::always_ok(), &FakeClock::new())
            .unwrap();
    }

    /// Process state letter from `/proc/<pid>/stat`, if the entry exists.
    fn proc_state(pid: u32) -> Option<char> {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        // The state field follows the parenthesized command name.
        stat.rsplit(')').next()?.trim().chars().next()
    }

    #[test]
    fn next_start_reaps_the_stopped_child() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = supervisor_in(&dir);

        supervisor
            .start_with(&ScriptedProbe::always_ok(), &FakeClock::new())
            .unwrap();
        let pid = supervisor.pid().unwrap();

        std::fs::create_dir_all(supervisor.config().tmp_dir()).unwrap();
        std::fs::write(supervisor.config().pid_file(), pid.to_string()).unwrap();
        supervisor.stop().unwrap();

        // The child stays in the process table as a zombie until reaped.
        let deadline = Instant::now() + Duration::from_secs(5);
        while proc_state(pid) != Some('Z') {
            assert!(Instant::now() < deadline, "child never became a zombie");
            std::thread::sleep(Duration::from_millis(10));
        }

        supervisor
            .start_with(&ScriptedProbe::always_ok(), &FakeClock::new())
            .unwrap();
        assert_eq!(proc_state(pid), None);
    }

    #[test]
    fn stop_without_pid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = supervisor_in(&dir);
        let err = supervisor.stop().unwrap_err();
        assert!(matches!(err, SupervisorError::PidFile { .. }));
    }
}
