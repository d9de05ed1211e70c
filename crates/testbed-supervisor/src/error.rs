//! Supervisor error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the supervisor to the scenario runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SupervisorError {
    #[error("a server process is already running")]
    AlreadyRunning,

    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        source: std::io::Error,
    },

    #[error("server did not report ready within {waited:?}")]
    SetupTimeout { waited: Duration },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("could not read PID file {path}: {source}")]
    PidFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("PID file {path} does not contain a process id: {contents:?}")]
    PidFileFormat { path: PathBuf, contents: String },

    #[error("failed to deliver SIGKILL to pid {pid}: {source}")]
    Signal { pid: i32, source: std::io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;
