//! Filesystem preparation and detached server launch.
//!
//! The server is started as an independent OS process: arguments travel as
//! a structured list and configuration as an environment map, never as an
//! interpolated shell string. Its combined stdout/stderr is appended to
//! the log file, and the returned [`Child`] is not tied to the caller's
//! lifetime (dropping it does not kill the server).

use crate::error::{Result, SupervisorError};
use std::fs::{self, OpenOptions};
use std::process::{Child, Command, Stdio};
use testbed_config::SupervisorConfig;
use tracing::info;

/// Environment variable names the server binary expects.
const ENV_ROOT: &str = "APID_ROOT";
const ENV_CONFIG: &str = "APID_CONFIG";
const ENV_ENV: &str = "APID_ENV";
const ENV_AUDIT_PREFIX: &str = "APID_AUDIT_PREFIX";
const ENV_AUDIT_TEST: &str = "APID_AUDIT_TEST";
const ENV_LEGACY_IDS: &str = "APID_LEGACY_IDS";

/// Creates the scratch and log directories if absent.
///
/// Safe to call when they already exist.
pub fn prepare_dirs(config: &SupervisorConfig) -> std::io::Result<()> {
    fs::create_dir_all(config.tmp_dir())?;
    fs::create_dir_all(config.log_dir())?;
    Ok(())
}

/// Builds the launch command for the server under test.
///
/// Kept separate from [`spawn`] so tests can inspect the environment and
/// argument list without starting a process.
pub fn build_command(config: &SupervisorConfig, legacy_id_mode: bool) -> Command {
    let mut command = Command::new(&config.program);
    command
        .current_dir(&config.work_dir)
        .arg("-debug")
        .arg(format!("-pidfile={}", config.pid_file().display()))
        .arg("-testuuid")
        .arg(format!("-testclock={}", config.test_clock))
        .arg("api")
        .arg(format!("-listen={}", config.listen))
        .env(ENV_ROOT, &config.work_dir)
        .env(ENV_CONFIG, config.config_dir())
        .env(ENV_ENV, "test")
        .env(ENV_AUDIT_PREFIX, &config.audit_prefix)
        .env(ENV_AUDIT_TEST, &config.audit_endpoint)
        .env(ENV_LEGACY_IDS, if legacy_id_mode { "true" } else { "false" });
    command
}

/// Prepares the filesystem and starts the server detached.
///
/// Spawn failure is a fatal setup error and is surfaced immediately.
pub fn spawn(config: &SupervisorConfig, legacy_id_mode: bool) -> Result<Child> {
    prepare_dirs(config)?;

    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_file())?;
    let log_for_stderr = log.try_clone()?;

    let mut command = build_command(config, legacy_id_mode);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_for_stderr));

    info!(
        program = %config.program,
        listen = %config.listen,
        legacy_id_mode,
        "launching server under test"
    );

    command.spawn().map_err(|source| SupervisorError::SpawnFailed {
        program: config.program.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::ffi::OsStr;
    use std::path::PathBuf;
    use pretty_assertions::assert_eq;

    fn test_config(work_dir: PathBuf) -> SupervisorConfig {
        SupervisorConfig {
            work_dir,
            ..SupervisorConfig::default()
        }
    }

    fn env_map(command: &Command) -> HashMap<String, String> {
        command
            .get_envs()
            .filter_map(|(key, value)| {
                Some((
                    key.to_str()?.to_string(),
                    value.and_then(OsStr::to_str)?.to_string(),
                ))
            })
            .collect()
    }

    #[test]
    fn command_arguments_match_server_interface() {
        let config = test_config(PathBuf::from("/srv/e2e"));
        let command = build_command(&config, true);

        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-debug",
                "-pidfile=/srv/e2e/tmp/pid",
                "-testuuid",
                "-testclock=20170101-1200",
                "api",
                "-listen=localhost:8081",
            ]
        );
        assert_eq!(command.get_program().to_str(), Some("apid"));
    }

    #[test]
    fn environment_encodes_launch_context() {
        let config = test_config(PathBuf::from("/srv/e2e"));
        let env = env_map(&build_command(&config, true));

        assert_eq!(env["APID_ROOT"], "/srv/e2e");
        assert_eq!(env["APID_CONFIG"], "/srv/e2e/config");
        assert_eq!(env["APID_ENV"], "test");
        assert_eq!(env["APID_AUDIT_PREFIX"], "e2e");
        assert_eq!(env["APID_AUDIT_TEST"], "http://localhost:8082");
        assert_eq!(env["APID_LEGACY_IDS"], "true");
    }

    #[test]
    fn legacy_id_mode_serializes_as_boolean_string() {
        let config = test_config(PathBuf::from("/srv/e2e"));
        assert_eq!(env_map(&build_command(&config, true))["APID_LEGACY_IDS"], "true");
        assert_eq!(env_map(&build_command(&config, false))["APID_LEGACY_IDS"], "false");
    }

    #[test]
    fn prepare_dirs_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());

        prepare_dirs(&config).unwrap();
        prepare_dirs(&config).unwrap();

        assert!(config.tmp_dir().is_dir());
        assert!(config.log_dir().is_dir());
    }

    #[test]
    fn spawn_creates_log_file_and_starts_process() {
        let dir = tempfile::tempdir().unwrap();
        let config = SupervisorConfig {
            // `true` ignores the server flags and exits immediately.
            program: "true".to_string(),
            ..test_config(dir.path().to_path_buf())
        };

        let mut child = spawn(&config, true).unwrap();
        assert!(config.log_file().exists());
        child.wait().unwrap();
    }

    #[test]
    fn spawn_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let config = SupervisorConfig {
            program: "definitely-not-an-installed-binary".to_string(),
            ..test_config(dir.path().to_path_buf())
        };

        let err = spawn(&config, true).unwrap_err();
        assert!(matches!(err, SupervisorError::SpawnFailed { .. }));
    }
}
