//! Configuration for the testbed harness.
//!
//! The final configuration is determined by merging sources in this order:
//! 1. Built-in defaults (lowest precedence).
//! 2. `testbed.toml` in the working directory.
//! 3. `TESTBED_*` environment variables (highest precedence).
//!
//! # Usage
//!
//! ```no_run
//! use testbed_config::SupervisorConfig;
//!
//! let config = SupervisorConfig::load().expect("invalid testbed configuration");
//! println!("server binary: {}", config.program);
//! ```

pub mod logging;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the server's combined stdout/stderr sink under the log directory.
const LOG_FILE_NAME: &str = "apid.log";

/// Configuration for the server-under-test supervisor.
///
/// All paths are derived from `work_dir`, which is fixed at construction
/// time from the current working directory. The remaining fields feed the
/// launch environment, the command line, and the readiness poll.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Server binary invoked at launch.
    pub program: String,
    /// host:port the server binds to.
    pub listen: String,
    /// Base URL the readiness probe targets.
    pub base_url: String,
    /// Backing-store test endpoint handed to the server.
    pub audit_endpoint: String,
    /// Dataset prefix the server uses against the backing store in test runs.
    pub audit_prefix: String,
    /// Deterministic clock value passed on the server command line.
    pub test_clock: String,
    /// Token scenarios use when talking to the server API.
    pub api_token: String,
    /// Token scenarios use when talking to the server admin surface.
    pub admin_token: String,
    /// Overall readiness deadline, in seconds.
    pub ready_timeout_secs: u64,
    /// Pause between readiness attempts, in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-attempt HTTP timeout for the readiness probe, in seconds.
    pub probe_timeout_secs: u64,
    /// Root directory the server runs from.
    pub work_dir: PathBuf,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: "apid".to_string(),
            listen: "localhost:8081".to_string(),
            base_url: "http://localhost:8081".to_string(),
            audit_endpoint: "http://localhost:8082".to_string(),
            audit_prefix: "e2e".to_string(),
            test_clock: "20170101-1200".to_string(),
            api_token: "testtoken".to_string(),
            admin_token: "admintoken".to_string(),
            ready_timeout_secs: 30,
            poll_interval_ms: 500,
            probe_timeout_secs: 1,
            work_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl SupervisorConfig {
    /// Loads configuration from defaults, `testbed.toml`, and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("testbed.toml"))
    }

    /// Loads configuration with an explicit TOML file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("TESTBED_"))
            .extract()
            .map_err(ConfigError::from)
    }

    /// Scratch directory the server writes its PID file under.
    pub fn tmp_dir(&self) -> PathBuf {
        self.work_dir.join("tmp")
    }

    /// Directory holding the server log file.
    pub fn log_dir(&self) -> PathBuf {
        self.work_dir.join("log")
    }

    /// Configuration directory handed to the server.
    pub fn config_dir(&self) -> PathBuf {
        self.work_dir.join("config")
    }

    /// Path the server records its own PID at.
    pub fn pid_file(&self) -> PathBuf {
        self.tmp_dir().join("pid")
    }

    /// Append-only sink for the server's combined stdout/stderr.
    pub fn log_file(&self) -> PathBuf {
        self.log_dir().join(LOG_FILE_NAME)
    }

    /// Overall readiness deadline.
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Pause between readiness attempts.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-attempt HTTP timeout for the readiness probe.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),
}
