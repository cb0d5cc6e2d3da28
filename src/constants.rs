//! Timing, path, and format constants shared across the guardian.

use std::time::Duration;

/// Sidecar suffix appended to the pidfile path to form the lock file path.
pub const LOCK_SUFFIX: &str = ".lock";

/// Format marker written into new-style pidfiles.
pub const PIDFILE_FORMAT: u32 = 2;

/// Default grace the stop engine allows the guardian before giving up.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between liveness polls while stopping a daemon.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval between reap attempts while the guardian waits out the term grace.
pub const TERM_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on waiting for an orphaned worker to die after SIGKILL.
pub const ORPHAN_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit code a worker uses when exec of the requested command fails.
pub const WORKER_EXEC_FAILURE_CODE: i32 = 127;

/// Default sink for worker stdout and stderr.
pub const DEV_NULL: &str = "/dev/null";

/// Default working directory for the guardian and worker.
pub const DEFAULT_WORKING_DIR: &str = "/";
