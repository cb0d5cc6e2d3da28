//! Stop engine: SIGTERM-to-guardian escalation bounded by a caller
//! timeout.
//!
//! Stop only ever signals the guardian. The guardian, on SIGTERM, runs
//! its own escalation against the worker per the daemon's `term_timeout`;
//! this module just waits for the liveness check to flip.

use std::{
    path::Path,
    thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::signal::{Signal, kill},
    unistd::Pid,
};
use tracing::{debug, info};

use crate::{
    check, constants,
    error::GuardianError,
    pidfile::{self, PidfileState},
    validate,
};

/// Options accepted by [`stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOptions {
    /// Grace allowed to the guardian between SIGTERM and giving up.
    pub timeout: Duration,
}

impl Default for StopOptions {
    fn default() -> Self {
        Self {
            timeout: constants::DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl StopOptions {
    /// Builds options from a string-typed timeout, applying integer
    /// validation before any side effect.
    pub fn from_raw(timeout: &str) -> Result<Self, GuardianError> {
        Ok(Self {
            timeout: validate::seconds("timeout", timeout)?,
        })
    }
}

/// Outcome of a successful [`stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The daemon was alive and is now dead.
    Stopped,
    /// There was nothing to stop.
    NotRunning,
}

/// Stops the daemon published at `pidfile_path`.
///
/// Absent pidfiles are benign (`NotRunning`); unreadable ones are
/// refused. Polls liveness every 100 ms and fails with
/// [`GuardianError::StopTimeout`] once `options.timeout` expires.
pub fn stop(pidfile_path: &Path, options: StopOptions) -> Result<StopOutcome, GuardianError> {
    let guard_pid = match pidfile::read(pidfile_path)? {
        PidfileState::Absent => return Ok(StopOutcome::NotRunning),
        PidfileState::Unreadable => {
            return Err(GuardianError::UnreadablePidfile(pidfile_path.to_path_buf()));
        }
        PidfileState::Legacy(pid) => pid,
        PidfileState::Current(record) => record.guard_pid,
    };

    if !check::check(pidfile_path)? {
        debug!(
            "pidfile {} is stale; nothing to stop",
            pidfile_path.display()
        );
        return Ok(StopOutcome::NotRunning);
    }

    match kill(Pid::from_raw(guard_pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => return Err(err.into()),
    }

    let deadline = Instant::now() + options.timeout;
    loop {
        if !check::check(pidfile_path)? {
            info!(guard_pid, "daemon stopped");
            return Ok(StopOutcome::Stopped);
        }
        if Instant::now() >= deadline {
            return Err(GuardianError::StopTimeout);
        }
        thread::sleep(constants::STOP_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pidfile::PidfileRecord;
    use tempfile::tempdir;

    #[test]
    fn default_timeout_is_thirty_seconds() {
        assert_eq!(StopOptions::default().timeout, Duration::from_secs(30));
    }

    #[test]
    fn from_raw_applies_integer_validation() {
        assert_eq!(
            StopOptions::from_raw("5").expect("valid timeout").timeout,
            Duration::from_secs(5)
        );
        let err = StopOptions::from_raw("abc").unwrap_err();
        assert!(err.to_string().contains("did not pass regex check"));
    }

    #[test]
    fn absent_pidfile_is_not_running() {
        let temp = tempdir().expect("tempdir");
        let outcome = stop(&temp.path().join("nope.pid"), StopOptions::default())
            .expect("benign stop");
        assert_eq!(outcome, StopOutcome::NotRunning);
    }

    #[test]
    fn unreadable_pidfile_is_refused() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("daemon.pid");
        std::fs::write(&path, "garbage\n").expect("write garbage");

        let err = stop(&path, StopOptions::default()).unwrap_err();
        assert!(matches!(err, GuardianError::UnreadablePidfile(_)));
    }

    #[test]
    fn stale_record_without_lock_is_not_running() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("daemon.pid");
        let record = PidfileRecord {
            pid: 999_999,
            guard_pid: 999_998,
        };
        pidfile::write(&path, &record).expect("write pidfile");

        let outcome = stop(&path, StopOptions::default()).expect("stale stop");
        assert_eq!(outcome, StopOutcome::NotRunning);
    }
}
