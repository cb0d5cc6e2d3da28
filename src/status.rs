//! Status snapshots for the CLI and library callers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{check, error::GuardianError, pidfile};

/// Point-in-time view of a daemon: the liveness verdict plus whatever the
/// pidfile recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Whether the guardian currently holds the lock.
    pub alive: bool,
    /// Worker PID from the pidfile, when one is recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    /// Guardian PID from the pidfile, when one is recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard_pid: Option<i32>,
}

impl DaemonStatus {
    /// Renders the snapshot as pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Collects a status snapshot for the daemon at `pidfile_path`.
pub fn inspect(pidfile_path: &Path) -> Result<DaemonStatus, GuardianError> {
    let state = pidfile::read(pidfile_path)?;
    let alive = check::check(pidfile_path)?;
    Ok(DaemonStatus {
        alive,
        pid: state.worker_pid(),
        guard_pid: state.guard_pid(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lock::{self, LockAttempt},
        pidfile::PidfileRecord,
    };
    use tempfile::tempdir;

    #[test]
    fn absent_daemon_inspects_as_dead_with_no_pids() {
        let temp = tempdir().expect("tempdir");
        let status = inspect(&temp.path().join("nope.pid")).expect("inspect");
        assert_eq!(
            status,
            DaemonStatus {
                alive: false,
                pid: None,
                guard_pid: None
            }
        );
    }

    #[test]
    fn held_lock_inspects_as_alive_with_recorded_pids() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("daemon.pid");
        let record = PidfileRecord {
            pid: 100,
            guard_pid: 99,
        };
        pidfile::write(&path, &record).expect("write pidfile");

        let LockAttempt::Acquired(_handle) =
            lock::acquire_exclusive(&lock::lock_path(&path)).expect("acquire")
        else {
            panic!("lock should be free");
        };

        let status = inspect(&path).expect("inspect");
        assert!(status.alive);
        assert_eq!(status.pid, Some(100));
        assert_eq!(status.guard_pid, Some(99));
    }

    #[test]
    fn json_rendering_round_trips() {
        let status = DaemonStatus {
            alive: true,
            pid: Some(7),
            guard_pid: Some(6),
        };
        let rendered = status.to_json().expect("render");
        assert!(rendered.contains("\"alive\": true"));

        let parsed: DaemonStatus = serde_json::from_str(&rendered).expect("parse");
        assert_eq!(parsed, status);
    }
}
