//! Bounded-deadline readiness polling.
//!
//! The server needs unpredictable warm-up time (socket bind, in-memory
//! fixture load), and its only reliable external signal is the status
//! endpoint. [`wait_for_ready`] polls that signal at a fixed interval,
//! absorbing every transient failure, until the signal passes or a hard
//! deadline bounds the worst-case wait. Both the clock and the probe are
//! trait seams so the loop is testable without real sleeping or a real
//! network.

use crate::error::{Result, SupervisorError};
use serde::Deserialize;
use std::time::{Duration, Instant};
use testbed_config::SupervisorConfig;
use thiserror::Error;
use tracing::debug;

/// Status endpoint path on the server under test.
const STATUS_PATH: &str = "/_status";

/// Outcome of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The server reported ready on the given attempt.
    Ready { attempts: u32 },
    /// The deadline elapsed without a passing signal.
    TimedOut { waited: Duration },
}

/// A single readiness attempt that failed.
///
/// These are absorbed by the polling loop and never surfaced individually.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("malformed status body: {0}")]
    MalformedBody(String),

    #[error("server reports status {0:?}")]
    NotReady(String),
}

/// One readiness check against the server.
pub trait StatusProbe {
    /// Returns `Ok(())` only when the server self-reports ready.
    fn check(&self) -> std::result::Result<(), ProbeError>;
}

/// Wall-clock seam for the polling loop.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Real clock backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Expected body of the status endpoint.
#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

/// HTTP implementation of [`StatusProbe`].
///
/// A probe passes only when the endpoint answers HTTP 200 with a JSON
/// body whose `status` field is exactly `"ok"`. The per-attempt timeout
/// is distinct from the overall polling deadline.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(base_url: &str, per_attempt_timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(per_attempt_timeout)
            .build()
            .map_err(|e| SupervisorError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}{}", base_url, STATUS_PATH),
        })
    }

    pub fn for_config(config: &SupervisorConfig) -> Result<Self> {
        Self::new(&config.base_url, config.probe_timeout())
    }
}

impl StatusProbe for HttpProbe {
    fn check(&self) -> std::result::Result<(), ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ProbeError::UnexpectedStatus(status.as_u16()));
        }

        let body: StatusBody = response
            .json()
            .map_err(|e| ProbeError::MalformedBody(e.to_string()))?;
        if body.status == "ok" {
            Ok(())
        } else {
            Err(ProbeError::NotReady(body.status))
        }
    }
}

/// Polls `probe` every `interval` until it passes or `deadline` elapses.
///
/// Sleeps before each attempt; every failed attempt is logged at debug
/// level and otherwise ignored. Returns immediately on the first passing
/// attempt.
pub fn wait_for_ready<P, C>(
    probe: &P,
    clock: &C,
    interval: Duration,
    deadline: Duration,
) -> Readiness
where
    P: StatusProbe + ?Sized,
    C: Clock + ?Sized,
{
    let started = clock.now();
    let limit = started + deadline;
    let mut attempts = 0u32;

    loop {
        clock.sleep(interval);
        attempts += 1;

        match probe.check() {
            Ok(()) => return Readiness::Ready { attempts },
            Err(err) => debug!(attempt = attempts, error = %err, "server not ready yet"),
        }

        let now = clock.now();
        if now > limit {
            return Readiness::TimedOut {
                waited: now - started,
            };
        }
    }
}
