//! Lifecycle supervisor for a server under end-to-end test.
//!
//! Brings up one external server process, blocks until its status
//! endpoint reports healthy, and tears it down after the scenario. The
//! supervisor owns a single process slot; the scenario runner drives it
//! through [`ScenarioHooks`] or the three [`Supervisor`] operations
//! directly:
//!
//! ```no_run
//! use testbed_supervisor::{Supervisor, SupervisorConfig};
//!
//! let mut supervisor = Supervisor::new(SupervisorConfig::load().unwrap());
//! supervisor.set_legacy_id_mode(false);
//! supervisor.start().expect("server did not come up");
//! // ... run the scenario against the server ...
//! supervisor.stop().expect("teardown failed");
//! ```
//!
//! Communication with the server goes through exactly three channels: an
//! environment/argument set at launch, the polled status endpoint, and
//! the PID file the server writes at its own startup.

pub mod error;
pub mod hooks;
pub mod launch;
pub mod readiness;
pub mod shutdown;
pub mod supervisor;

pub use error::{Result, SupervisorError};
pub use hooks::{ScenarioHooks, ServerLifecycle, DATABASE_TAG, NOSTART_TAG};
pub use readiness::{Clock, HttpProbe, ProbeError, Readiness, StatusProbe, SystemClock};
pub use supervisor::Supervisor;
pub use testbed_config::SupervisorConfig;
