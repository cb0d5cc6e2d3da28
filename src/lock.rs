//! Advisory lock manager for the guardian's sidecar lock file.
//!
//! The lock, not the process table, is the liveness oracle: a PID can be
//! recycled, but a `flock` cannot be held by a dead process. The guardian
//! takes the exclusive lock once and keeps the descriptor open for its
//! whole lifetime; release happens only when the kernel tears the process
//! down. Explicit unlocking is deliberately not offered.

use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::io::AsRawFd,
    path::{Path, PathBuf},
};

use crate::{constants, error::GuardianError};

/// Derives the sidecar lock path for a pidfile.
pub fn lock_path(pidfile_path: &Path) -> PathBuf {
    let mut raw = pidfile_path.as_os_str().to_os_string();
    raw.push(constants::LOCK_SUFFIX);
    PathBuf::from(raw)
}

/// A held exclusive lock.
///
/// The descriptor must stay open for as long as the daemon counts as
/// alive; dropping the handle releases the lock.
#[derive(Debug)]
pub struct LockHandle {
    _file: File,
}

/// Result of a non-blocking acquisition attempt.
#[derive(Debug)]
pub enum LockAttempt {
    /// The lock was free and is now held by the returned handle.
    Acquired(LockHandle),
    /// Another process holds the lock.
    Busy,
}

/// Result of a non-blocking probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockProbe {
    /// Nobody holds the lock.
    Free,
    /// A live process holds the lock.
    Held,
}

/// Attempts to take the exclusive whole-file lock without blocking.
///
/// Creates the lock file when missing. Contention yields
/// [`LockAttempt::Busy`] rather than an error.
pub fn acquire_exclusive(lock_path: &Path) -> Result<LockAttempt, GuardianError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;
    if try_flock(&file)? {
        Ok(LockAttempt::Acquired(LockHandle { _file: file }))
    } else {
        Ok(LockAttempt::Busy)
    }
}

/// Probes whether the lock is currently held, without ever blocking.
///
/// A successful trial acquisition is released immediately by dropping the
/// descriptor; a missing lock file probes as free.
pub fn probe(lock_path: &Path) -> Result<LockProbe, GuardianError> {
    let file = match OpenOptions::new().read(true).open(lock_path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(LockProbe::Free),
        Err(err) => return Err(err.into()),
    };
    if try_flock(&file)? {
        Ok(LockProbe::Free)
    } else {
        Ok(LockProbe::Held)
    }
}

fn try_flock(file: &File) -> Result<bool, GuardianError> {
    // SAFETY: flock is safe to call with a valid open descriptor
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err.into())
    }
}
