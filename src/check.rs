//! Liveness check.
//!
//! The advisory lock is the ground truth: a PID can be recycled after a
//! crash, but a lock cannot be held by a dead process. The pidfile only
//! tells us a daemon was once published at this path; the probe decides
//! whether its guardian is still breathing.

use std::path::Path;

use crate::{
    error::GuardianError,
    lock::{self, LockProbe},
    pidfile::{self, PidfileState},
};

/// Whether the daemon published at `pidfile_path` is alive right now.
///
/// Never blocks; the underlying lock probe is non-blocking.
pub fn check(pidfile_path: &Path) -> Result<bool, GuardianError> {
    match pidfile::read(pidfile_path)? {
        PidfileState::Absent | PidfileState::Unreadable => return Ok(false),
        PidfileState::Legacy(_) | PidfileState::Current(_) => {}
    }

    let lock_path = lock::lock_path(pidfile_path);
    if !lock_path.exists() {
        return Ok(false);
    }
    match lock::probe(&lock_path)? {
        LockProbe::Free => Ok(false),
        LockProbe::Held => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lock::LockAttempt,
        pidfile::{PidfileRecord, write},
    };
    use tempfile::tempdir;

    fn publish(path: &Path) {
        let record = PidfileRecord {
            pid: std::process::id() as i32,
            guard_pid: std::process::id() as i32,
        };
        write(path, &record).expect("publish pidfile");
    }

    #[test]
    fn absent_pidfile_is_dead() {
        let temp = tempdir().expect("tempdir");
        assert!(!check(&temp.path().join("nope.pid")).expect("check"));
    }

    #[test]
    fn pidfile_without_lock_file_is_dead() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("daemon.pid");
        publish(&path);
        assert!(!check(&path).expect("check"));
    }

    #[test]
    fn free_lock_is_dead_held_lock_is_alive() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("daemon.pid");
        publish(&path);

        let lock_file = lock::lock_path(&path);
        std::fs::write(&lock_file, b"").expect("touch lock file");
        assert!(!check(&path).expect("check with free lock"));

        let LockAttempt::Acquired(handle) =
            lock::acquire_exclusive(&lock_file).expect("acquire")
        else {
            panic!("lock should be free");
        };
        assert!(check(&path).expect("check with held lock"));

        drop(handle);
        assert!(!check(&path).expect("check after release"));
    }

    #[test]
    fn unreadable_pidfile_is_dead_even_with_held_lock() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("daemon.pid");
        std::fs::write(&path, "garbage\n").expect("write garbage");

        let lock_file = lock::lock_path(&path);
        let _handle = lock::acquire_exclusive(&lock_file).expect("acquire");
        assert!(!check(&path).expect("check"));
    }
}
