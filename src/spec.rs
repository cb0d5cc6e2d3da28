//! Daemon specification: what to launch and where its artifacts live.

use std::{collections::HashMap, fmt, path::PathBuf, time::Duration};

use crate::{constants, error::GuardianError};

/// What the worker runs after the second fork.
pub enum WorkerCommand {
    /// Exec this argv as a fresh process image.
    Exec(Vec<String>),
    /// Invoke this callback in the worker and exit with its status.
    Callback(Box<dyn FnOnce() -> i32 + Send>),
}

impl WorkerCommand {
    /// Wraps a shell command line in `/bin/sh -c`.
    pub fn shell(command: impl Into<String>) -> Self {
        Self::Exec(vec!["/bin/sh".into(), "-c".into(), command.into()])
    }

    /// Builds an exec command from an argv.
    pub fn argv(argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Exec(argv.into_iter().map(Into::into).collect())
    }

    /// Builds an in-process callback command.
    pub fn callback(callback: impl FnOnce() -> i32 + Send + 'static) -> Self {
        Self::Callback(Box::new(callback))
    }
}

impl fmt::Debug for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exec(argv) => f.debug_tuple("Exec").field(argv).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Input to [`crate::start::start`].
///
/// Construct with [`DaemonSpec::new`] and adjust the public fields; the
/// defaults match an unconfigured daemon (`/dev/null` sinks, root working
/// directory, no term grace).
#[derive(Debug)]
pub struct DaemonSpec {
    /// Worker command.
    pub command: WorkerCommand,
    /// Absolute path of the pidfile the guardian will own.
    pub pidfile: PathBuf,
    /// Append-mode sink for worker stdout.
    pub stdout: PathBuf,
    /// Append-mode sink for worker stderr.
    pub stderr: PathBuf,
    /// Optional append-mode sink for guardian diagnostics.
    pub guardian_log: Option<PathBuf>,
    /// Human label; required for callback commands.
    pub name: Option<String>,
    /// Grace between SIGTERM and SIGKILL when stopping the worker.
    /// Zero skips SIGTERM entirely.
    pub term_timeout: Duration,
    /// Working directory for the guardian and worker.
    pub working_dir: PathBuf,
    /// Run the worker as this user (requires root).
    pub user: Option<String>,
    /// Run the worker with this group (requires root).
    pub group: Option<String>,
    /// Extra environment for the worker.
    pub env: HashMap<String, String>,
}

impl DaemonSpec {
    /// Creates a spec with default sinks, working directory, and timings.
    pub fn new(command: WorkerCommand, pidfile: impl Into<PathBuf>) -> Self {
        Self {
            command,
            pidfile: pidfile.into(),
            stdout: PathBuf::from(constants::DEV_NULL),
            stderr: PathBuf::from(constants::DEV_NULL),
            guardian_log: None,
            name: None,
            term_timeout: Duration::ZERO,
            working_dir: PathBuf::from(constants::DEFAULT_WORKING_DIR),
            user: None,
            group: None,
            env: HashMap::new(),
        }
    }

    /// Checks the structural invariants before any side effect.
    pub fn validate(&self) -> Result<(), GuardianError> {
        if !self.pidfile.is_absolute() {
            return Err(GuardianError::InvalidSpec(format!(
                "pidfile path '{}' must be absolute",
                self.pidfile.display()
            )));
        }
        match &self.command {
            WorkerCommand::Exec(argv) if argv.first().is_none_or(|arg| arg.is_empty()) => Err(
                GuardianError::InvalidSpec("command argv is empty".into()),
            ),
            WorkerCommand::Callback(_) if self.name.is_none() => Err(
                GuardianError::InvalidSpec("a name is required for callback daemons".into()),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_applies_documented_defaults() {
        let spec = DaemonSpec::new(WorkerCommand::shell("sleep 1"), "/run/demo.pid");
        assert_eq!(spec.stdout, PathBuf::from("/dev/null"));
        assert_eq!(spec.stderr, PathBuf::from("/dev/null"));
        assert_eq!(spec.working_dir, PathBuf::from("/"));
        assert_eq!(spec.term_timeout, Duration::ZERO);
        assert!(spec.env.is_empty());
        spec.validate().expect("defaults are valid");
    }

    #[test]
    fn shell_commands_run_through_sh() {
        let WorkerCommand::Exec(argv) = WorkerCommand::shell("echo hi") else {
            panic!("shell builds an exec command");
        };
        assert_eq!(argv, vec!["/bin/sh", "-c", "echo hi"]);
    }

    #[test]
    fn relative_pidfile_is_rejected() {
        let spec = DaemonSpec::new(WorkerCommand::shell("true"), "relative.pid");
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("must be absolute"));
    }

    #[test]
    fn empty_argv_is_rejected() {
        let spec = DaemonSpec::new(WorkerCommand::Exec(Vec::new()), "/run/demo.pid");
        assert!(spec.validate().is_err());

        let spec = DaemonSpec::new(WorkerCommand::Exec(vec![String::new()]), "/run/demo.pid");
        assert!(spec.validate().is_err());
    }

    #[test]
    fn callbacks_require_a_name() {
        let mut spec = DaemonSpec::new(WorkerCommand::callback(|| 0), "/run/demo.pid");
        assert!(spec.validate().is_err());

        spec.name = Some("callback-daemon".into());
        spec.validate().expect("named callback is valid");
    }
}
