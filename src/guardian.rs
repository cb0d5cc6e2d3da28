//! Guardian loop: supervises the worker and services stop requests.
//!
//! The guardian blocks in `waitpid` for its single worker. SIGTERM flips
//! an atomic flag; the handler is installed without `SA_RESTART` so a
//! signal arriving mid-wait surfaces as `EINTR` and the loop re-checks
//! the flag. On a stop request the guardian escalates against the
//! worker's process group: SIGTERM with the configured grace, then
//! SIGKILL.

use std::{
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::{
        signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, killpg, sigaction},
        wait::{WaitPidFlag, WaitStatus, waitpid},
    },
    unistd::Pid,
};
use tracing::{error, info, warn};

use crate::{constants, lock::LockHandle, pidfile};

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn flag_stop(_signo: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// Installs the SIGTERM handler that flags a stop request.
///
/// Must run before the first `waitpid` and before readiness is reported;
/// a SIGTERM landing in that window would otherwise be lost to the
/// default disposition.
pub fn install_stop_handler() -> Result<(), Errno> {
    let action = SigAction::new(
        SigHandler::Handler(flag_stop),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only stores to an atomic flag
    unsafe { sigaction(Signal::SIGTERM, &action) }?;
    Ok(())
}

fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}

/// Supervises `worker` until it exits on its own or a stop request
/// arrives, then removes the pidfile and returns the guardian's exit
/// code.
///
/// `_lock` is the exclusive lock taken during start; holding it here
/// keeps the liveness oracle accurate for the whole supervision.
pub fn run(worker: Pid, pidfile_path: &Path, term_timeout: Duration, _lock: LockHandle) -> i32 {
    info!(worker = worker.as_raw(), "guardian supervising worker");
    loop {
        if stop_requested() {
            return shut_down(worker, pidfile_path, term_timeout);
        }
        match waitpid(worker, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                info!(code, "worker exited on its own");
                remove_pidfile(pidfile_path);
                return code;
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                info!(signal = %signal, "worker killed by signal");
                remove_pidfile(pidfile_path);
                return 128 + signal as i32;
            }
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => {
                warn!("worker already reaped");
                remove_pidfile(pidfile_path);
                return 0;
            }
            Err(err) => {
                error!("waitpid failed: {err}");
                remove_pidfile(pidfile_path);
                return 1;
            }
        }
    }
}

fn shut_down(worker: Pid, pidfile_path: &Path, term_timeout: Duration) -> i32 {
    let mut reaped = false;

    if term_timeout.is_zero() {
        info!("stop requested; term timeout is zero, skipping SIGTERM");
    } else {
        info!(
            grace = term_timeout.as_secs(),
            "stop requested; sending SIGTERM to worker group"
        );
        let _ = killpg(worker, Signal::SIGTERM);
        let deadline = Instant::now() + term_timeout;
        while !reaped {
            match waitpid(worker, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive)
                | Ok(WaitStatus::Stopped(..))
                | Ok(WaitStatus::Continued(_)) => {
                    if Instant::now() >= deadline {
                        warn!("worker survived the term grace");
                        break;
                    }
                    thread::sleep(constants::TERM_POLL_INTERVAL);
                }
                Ok(_) => reaped = true,
                Err(Errno::EINTR) => continue,
                Err(_) => reaped = true,
            }
        }
    }

    if !reaped {
        let _ = killpg(worker, Signal::SIGKILL);
        loop {
            match waitpid(worker, None) {
                Err(Errno::EINTR) => continue,
                _ => break,
            }
        }
    }

    remove_pidfile(pidfile_path);
    0
}

fn remove_pidfile(path: &Path) {
    if let Err(err) = pidfile::remove(path) {
        warn!("failed to remove pidfile {}: {err}", path.display());
    }
}
