//! Targeted termination via the server's own PID record.
//!
//! The server is launched detached, so the PID file it writes at startup
//! is the single source of truth for termination; the in-memory child
//! handle is never trusted for this. Delivery is fire-and-forget: SIGKILL
//! is not catchable, the call does not wait for exit, and the PID file is
//! left in place.

use crate::error::{Result, SupervisorError};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Reads the PID recorded at `pid_file` and delivers SIGKILL to it.
///
/// A PID that no longer exists is logged and treated as success; an
/// unreadable or garbled PID file and a permission failure are errors.
/// Returns the PID that was signalled.
pub fn kill_recorded(pid_file: &Path) -> Result<i32> {
    let raw = fs::read_to_string(pid_file).map_err(|source| SupervisorError::PidFile {
        path: pid_file.to_path_buf(),
        source,
    })?;

    let pid: i32 = raw
        .trim()
        .parse()
        .map_err(|_| SupervisorError::PidFileFormat {
            path: pid_file.to_path_buf(),
            contents: raw.trim().to_string(),
        })?;

    let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
    if rc == 0 {
        info!(pid, "SIGKILL delivered to server under test");
        return Ok(pid);
    }

    let errno = std::io::Error::last_os_error();
    match errno.raw_os_error() {
        Some(libc::ESRCH) => {
            warn!(pid, "server process already gone at teardown");
            Ok(pid)
        }
        _ => Err(SupervisorError::Signal { pid, source: errno }),
    }
}
