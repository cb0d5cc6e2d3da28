//! Start engine: double fork, pidfile publication, worker launch.
//!
//! `start` forks once to create the guardian, which detaches into its own
//! session, acquires the exclusive lock, forks again for the worker, and
//! publishes the pidfile before reporting readiness back over a pipe.
//! Ordering is load-bearing: lock, then pidfile, then readiness, so a
//! caller observing a successful start can rely on `check` immediately.

use std::{
    collections::HashMap,
    env,
    ffi::CString,
    fs::{self, File, OpenOptions},
    io::{Read, Write},
    os::unix::io::{AsRawFd, RawFd},
    path::Path,
    process, thread,
    time::Instant,
};

use nix::{
    errno::Errno,
    sys::{
        signal::{self, SigHandler, SigSet, SigmaskHow, Signal, kill, killpg},
        wait::{WaitPidFlag, waitpid},
    },
    unistd::{
        ForkResult, Pid, chdir, dup2, execvp, fork, getpgid, getpid, pipe, setpgid, setsid,
    },
};
use tracing::{info, warn};

use crate::{
    check, constants,
    error::GuardianError,
    guardian,
    lock::{self, LockAttempt, LockHandle},
    logs,
    pidfile::{self, PidfileRecord},
    privilege::WorkerCredentials,
    spec::{DaemonSpec, WorkerCommand},
};

/// Launches a guardian/worker pair for `spec`.
///
/// Returns only after the guardian holds the lock, the pidfile is
/// published, and readiness has been reported over the status pipe. On
/// any failure the error is propagated and no guardian is left running.
pub fn start(spec: DaemonSpec) -> Result<(), GuardianError> {
    spec.validate()?;

    let stdout_sink = open_sink(&spec.stdout)?;
    let stderr_sink = open_sink(&spec.stderr)?;

    if check::check(&spec.pidfile)? {
        return Err(GuardianError::AlreadyStarted);
    }
    reap_orphan(&spec.pidfile)?;

    let (pipe_read, pipe_write) = pipe()?;
    let mut report_read = File::from(pipe_read);
    let report_write = File::from(pipe_write);

    // SAFETY: start is documented as single-threaded per caller; the
    // child performs only fork-tolerant setup before exec or the
    // callback.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => {
            drop(report_write);
            drop(stdout_sink);
            drop(stderr_sink);
            let outcome = await_guardian_report(&mut report_read);
            if outcome.is_err() {
                // a guardian that failed before detaching is our child
                let _ = waitpid(child, Some(WaitPidFlag::WNOHANG));
            }
            outcome
        }
        ForkResult::Child => {
            drop(report_read);
            guardian_main(spec, report_write, stdout_sink, stderr_sink)
        }
    }
}

fn open_sink(path: &Path) -> Result<File, GuardianError> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|_| GuardianError::Unwritable(path.to_path_buf()))
}

/// Blocks until the guardian reports one line, or EOF if it died first.
fn await_guardian_report(pipe: &mut File) -> Result<(), GuardianError> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        let n = match pipe.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
        if raw.contains(&b'\n') {
            break;
        }
    }

    let line = String::from_utf8_lossy(&raw);
    let line = line.trim();
    if line == "ready" {
        return Ok(());
    }
    if let Some(message) = line.strip_prefix("error: ") {
        return Err(GuardianError::GuardianReport(message.to_string()));
    }
    Err(GuardianError::GuardianReport(
        "guardian exited before reporting readiness".to_string(),
    ))
}

/// Kills the process group of a worker left behind by a crashed guardian
/// and waits for it to vanish.
fn reap_orphan(pidfile_path: &Path) -> Result<(), GuardianError> {
    let state = pidfile::read(pidfile_path)?;
    let Some(worker_pid) = state.worker_pid() else {
        return Ok(());
    };
    let worker = Pid::from_raw(worker_pid);
    if !process_exists(worker) {
        return Ok(());
    }

    warn!(
        pid = worker_pid,
        "previous guardian died; killing orphaned worker group"
    );
    let group = getpgid(Some(worker)).unwrap_or(worker);
    let _ = killpg(group, Signal::SIGKILL);

    let deadline = Instant::now() + constants::ORPHAN_REAP_TIMEOUT;
    while process_exists(worker) {
        if Instant::now() >= deadline {
            return Err(GuardianError::OrphanSurvived(worker_pid));
        }
        thread::sleep(constants::STOP_POLL_INTERVAL);
    }
    Ok(())
}

fn process_exists(pid: Pid) -> bool {
    match kill(pid, None) {
        // a zombie still accepts signal 0 but is already gone for our
        // purposes; whoever inherited it will reap it
        Ok(()) => !is_zombie(pid),
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: Pid) -> bool {
    let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // the state letter follows the parenthesised comm field
    stat.rsplit_once(')')
        .map(|(_, rest)| matches!(rest.trim_start().chars().next(), Some('Z') | Some('X')))
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: Pid) -> bool {
    false
}

fn guardian_main(spec: DaemonSpec, report: File, stdout_sink: File, stderr_sink: File) -> ! {
    let mut report = Some(report);
    let code = match guardian_body(spec, &mut report, stdout_sink, stderr_sink) {
        Ok(code) => code,
        Err(err) => {
            if let Some(mut pipe) = report.take() {
                let _ = writeln!(pipe, "error: {err}");
            }
            1
        }
    };
    process::exit(code);
}

fn guardian_body(
    spec: DaemonSpec,
    report: &mut Option<File>,
    stdout_sink: File,
    stderr_sink: File,
) -> Result<i32, GuardianError> {
    setsid()?;

    let keep = [
        report.as_ref().map(|pipe| pipe.as_raw_fd()).unwrap_or(-1),
        stdout_sink.as_raw_fd(),
        stderr_sink.as_raw_fd(),
    ];
    close_inherited_fds(&keep);

    redirect_stdio(&stdout_sink, &stderr_sink)?;
    drop(stdout_sink);

    // the guardian's own stderr goes to the guardian log when one is
    // configured; the worker re-points fd 2 at the stderr sink after
    // the second fork
    let worker_stderr = match spec.guardian_log.as_deref() {
        Some(log_path) => {
            let log_file = open_sink(log_path)?;
            dup2(log_file.as_raw_fd(), 2)?;
            Some(stderr_sink)
        }
        None => {
            drop(stderr_sink);
            None
        }
    };

    chdir(spec.working_dir.as_path())?;
    logs::init_guardian_logging();

    if let Some(name) = spec.name.as_deref() {
        set_process_name(name);
    }

    let lock_path = lock::lock_path(&spec.pidfile);
    let lock_handle = match lock::acquire_exclusive(&lock_path)? {
        LockAttempt::Acquired(handle) => handle,
        LockAttempt::Busy => return Err(GuardianError::LockBusy(lock_path)),
    };

    // account lookups must happen before the fork; the worker only runs
    // the raw id switches
    let credentials = WorkerCredentials::resolve(spec.user.as_deref(), spec.group.as_deref())?;

    guardian::install_stop_handler()?;

    let DaemonSpec {
        command,
        pidfile,
        term_timeout,
        env,
        ..
    } = spec;

    // SAFETY: the guardian is single-threaded; the worker branch performs
    // only signal and credential setup before exec or the callback.
    match unsafe { fork() }? {
        ForkResult::Child => {
            let inherited_report = report.take();
            drop(inherited_report);
            if let Some(stderr_sink) = worker_stderr {
                let _ = dup2(stderr_sink.as_raw_fd(), 2);
                drop(stderr_sink);
            }
            worker_main(command, credentials, env, lock_handle)
        }
        ForkResult::Parent { child } => {
            drop(worker_stderr);
            // both sides set the group; whichever wins the race is fine
            let _ = setpgid(child, child);

            let record = PidfileRecord {
                pid: child.as_raw(),
                guard_pid: getpid().as_raw(),
            };
            if let Err(err) = pidfile::write(&pidfile, &record) {
                let _ = killpg(child, Signal::SIGKILL);
                let _ = waitpid(child, None);
                return Err(err);
            }

            if let Some(mut pipe) = report.take() {
                if let Err(err) = writeln!(pipe, "ready") {
                    warn!("failed to report readiness: {err}");
                }
            }

            info!(
                worker = child.as_raw(),
                pidfile = %pidfile.display(),
                "daemon started"
            );
            Ok(guardian::run(child, &pidfile, term_timeout, lock_handle))
        }
    }
}

fn worker_main(
    command: WorkerCommand,
    credentials: Option<WorkerCredentials>,
    env_overlay: HashMap<String, String>,
    lock_handle: LockHandle,
) -> ! {
    let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));

    // the flock follows the open file description; the worker must not
    // keep a reference to it
    drop(lock_handle);

    reset_signals();

    if let Some(credentials) = credentials {
        if let Err(err) = credentials.apply() {
            eprintln!("guardd worker: privilege drop failed: {err}");
            process::exit(1);
        }
        for (key, value) in credentials.env_overrides() {
            // SAFETY: the worker is single-threaded between fork and exec
            unsafe { env::set_var(key, value) };
        }
    }
    for (key, value) in &env_overlay {
        // SAFETY: as above
        unsafe { env::set_var(key, value) };
    }

    match command {
        WorkerCommand::Callback(callback) => process::exit(callback()),
        WorkerCommand::Exec(argv) => {
            let program = argv.first().cloned().unwrap_or_default();
            let args: Vec<CString> = match argv.into_iter().map(CString::new).collect() {
                Ok(args) => args,
                Err(_) => {
                    eprintln!("guardd worker: command contains interior NUL bytes");
                    process::exit(constants::WORKER_EXEC_FAILURE_CODE);
                }
            };
            if let Err(err) = execvp(&args[0], &args) {
                eprintln!("guardd worker: exec '{program}' failed: {err}");
            }
            process::exit(constants::WORKER_EXEC_FAILURE_CODE);
        }
    }
}

/// Restores default dispositions and an empty mask before handing the
/// process over to user code.
fn reset_signals() {
    for sig in [
        Signal::SIGTERM,
        Signal::SIGINT,
        Signal::SIGHUP,
        Signal::SIGQUIT,
        Signal::SIGPIPE,
        Signal::SIGCHLD,
    ] {
        // SAFETY: restoring the default disposition
        let _ = unsafe { signal::signal(sig, SigHandler::SigDfl) };
    }
    let _ = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None);
}

fn redirect_stdio(stdout_sink: &File, stderr_sink: &File) -> Result<(), GuardianError> {
    let devnull = File::open(constants::DEV_NULL)?;
    dup2(devnull.as_raw_fd(), 0)?;
    dup2(stdout_sink.as_raw_fd(), 1)?;
    dup2(stderr_sink.as_raw_fd(), 2)?;
    Ok(())
}

/// Closes every descriptor above stderr except the ones in `keep`.
fn close_inherited_fds(keep: &[RawFd]) {
    let fds: Vec<RawFd> = match fs::read_dir("/proc/self/fd") {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(|s| s.parse().ok()))
            .collect(),
        Err(_) => {
            let max = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
            let max = if max <= 0 { 1024 } else { max.min(4096) } as RawFd;
            (3..max).collect()
        }
    };
    for fd in fds {
        if fd > 2 && !keep.contains(&fd) {
            // SAFETY: descriptors not in `keep` are no longer referenced
            unsafe { libc::close(fd) };
        }
    }
}

#[cfg(target_os = "linux")]
fn set_process_name(name: &str) {
    if let Ok(cname) = CString::new(name) {
        // SAFETY: PR_SET_NAME reads a NUL-terminated string (truncated
        // to 15 bytes by the kernel)
        unsafe { libc::prctl(libc::PR_SET_NAME, cname.as_ptr()) };
    }
}

#[cfg(not(target_os = "linux"))]
fn set_process_name(_name: &str) {}
