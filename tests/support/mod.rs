#![allow(dead_code)]

use std::{path::Path, time::Duration};

use assert_cmd::Command;
use guardd::{check, pidfile, test_utils};
use nix::{
    sys::signal::{Signal, kill},
    unistd::Pid,
};
use sysinfo::{Pid as SysPid, ProcessStatus, ProcessesToUpdate, System};

pub fn guardd() -> Command {
    Command::cargo_bin("guardd").expect("binary under test")
}

pub fn is_alive(pidfile_path: &Path) -> bool {
    check::check(pidfile_path).unwrap_or(false)
}

pub fn wait_for_alive(pidfile_path: &Path, timeout: Duration) -> bool {
    test_utils::wait_until(timeout, || is_alive(pidfile_path))
}

pub fn wait_for_dead(pidfile_path: &Path, timeout: Duration) -> bool {
    test_utils::wait_until(timeout, || !is_alive(pidfile_path))
}

pub fn guard_pid(pidfile_path: &Path) -> i32 {
    match pidfile::read(pidfile_path).expect("pidfile readable") {
        pidfile::PidfileState::Current(record) => record.guard_pid,
        pidfile::PidfileState::Legacy(pid) => pid,
        other => panic!("unexpected pidfile state: {other:?}"),
    }
}

pub fn worker_pid(pidfile_path: &Path) -> i32 {
    match pidfile::read(pidfile_path).expect("pidfile readable") {
        pidfile::PidfileState::Current(record) => record.pid,
        pidfile::PidfileState::Legacy(pid) => pid,
        other => panic!("unexpected pidfile state: {other:?}"),
    }
}

pub fn kill9(pid: i32) {
    kill(Pid::from_raw(pid), Signal::SIGKILL).expect("SIGKILL target process");
}

pub fn is_process_alive(pid: i32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    match system.process(SysPid::from_u32(pid as u32)) {
        // an unreaped zombie is no longer running for our purposes
        Some(process) => !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
        None => false,
    }
}
