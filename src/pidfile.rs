//! Atomic pidfile store.
//!
//! The pidfile names the worker and guardian PIDs of a running daemon.
//! Writers publish via write-to-temp-then-rename on the same filesystem
//! so readers never observe a partial record. Readers also accept the
//! legacy single-integer shape left behind by earlier tooling; writers
//! never produce it.
//!
//! The store never decides liveness. A pidfile on disk only means some
//! process, possibly long dead, once published one.

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use tempfile::NamedTempFile;

use crate::{constants, error::GuardianError};

/// PIDs published by a running guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidfileRecord {
    /// Worker PID.
    pub pid: i32,
    /// Guardian PID.
    pub guard_pid: i32,
}

/// What reading a pidfile produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidfileState {
    /// No pidfile on disk.
    Absent,
    /// A file is present but holds neither format. Start treats this
    /// like [`PidfileState::Absent`]; stop refuses to act on it.
    Unreadable,
    /// Single-integer pidfile; the integer stands in for both PIDs.
    Legacy(i32),
    /// Current key/value record.
    Current(PidfileRecord),
}

impl PidfileState {
    /// Guardian PID, when one is recorded.
    pub fn guard_pid(&self) -> Option<i32> {
        match self {
            Self::Legacy(pid) => Some(*pid),
            Self::Current(record) => Some(record.guard_pid),
            Self::Absent | Self::Unreadable => None,
        }
    }

    /// Worker PID, when one is recorded.
    pub fn worker_pid(&self) -> Option<i32> {
        match self {
            Self::Legacy(pid) => Some(*pid),
            Self::Current(record) => Some(record.pid),
            Self::Absent | Self::Unreadable => None,
        }
    }
}

/// Atomically publishes `record` at `path`.
pub fn write(path: &Path, record: &PidfileRecord) -> Result<(), GuardianError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|source| write_error(path, source))?;
    write!(
        tmp,
        "pid {}\nguard_pid {}\nformat {}\n",
        record.pid,
        record.guard_pid,
        constants::PIDFILE_FORMAT
    )
    .map_err(|source| write_error(path, source))?;
    tmp.as_file()
        .sync_all()
        .map_err(|source| write_error(path, source))?;
    tmp.persist(path).map_err(|err| write_error(path, err.error))?;
    Ok(())
}

fn write_error(path: &Path, source: io::Error) -> GuardianError {
    GuardianError::PidfileWrite {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads the pidfile at `path`, tolerating both formats.
pub fn read(path: &Path) -> Result<PidfileState, GuardianError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(PidfileState::Absent),
        Err(err) => return Err(err.into()),
    };
    Ok(parse(&content))
}

fn parse(content: &str) -> PidfileState {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return PidfileState::Unreadable;
    }
    if trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return match trimmed.parse::<i32>() {
            Ok(pid) if pid > 0 => PidfileState::Legacy(pid),
            _ => PidfileState::Unreadable,
        };
    }

    let mut pid = None;
    let mut guard_pid = None;
    let mut format = None;
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(char::is_whitespace) else {
            return PidfileState::Unreadable;
        };
        let value = value.trim();
        match key {
            "pid" => pid = value.parse::<i32>().ok(),
            "guard_pid" => guard_pid = value.parse::<i32>().ok(),
            "format" => format = Some(value),
            // unknown keys are reserved for future formats
            _ => {}
        }
    }

    match (pid, guard_pid, format) {
        (Some(pid), Some(guard_pid), Some(_)) if pid > 0 && guard_pid > 0 => {
            PidfileState::Current(PidfileRecord { pid, guard_pid })
        }
        _ => PidfileState::Unreadable,
    }
}

/// Removes the pidfile; a missing file is not an error.
pub fn remove(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("daemon.pid");
        let record = PidfileRecord {
            pid: 4321,
            guard_pid: 4320,
        };

        write(&path, &record).expect("write pidfile");
        assert_eq!(read(&path).expect("read"), PidfileState::Current(record));

        let raw = fs::read_to_string(&path).expect("raw content");
        assert!(raw.contains("pid 4321"));
        assert!(raw.contains("guard_pid 4320"));
        assert!(raw.contains("format 2"));
    }

    #[test]
    fn missing_file_reads_as_absent() {
        let temp = tempdir().expect("tempdir");
        let state = read(&temp.path().join("nope.pid")).expect("read");
        assert_eq!(state, PidfileState::Absent);
        assert_eq!(state.guard_pid(), None);
    }

    #[test]
    fn legacy_single_integer_is_accepted() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("legacy.pid");
        fs::write(&path, "4242\n").expect("write legacy");

        let state = read(&path).expect("read");
        assert_eq!(state, PidfileState::Legacy(4242));
        assert_eq!(state.guard_pid(), Some(4242));
        assert_eq!(state.worker_pid(), Some(4242));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("future.pid");
        fs::write(&path, "pid 10\nguard_pid 11\nformat 3\nhost example\n").expect("write");

        assert_eq!(
            read(&path).expect("read"),
            PidfileState::Current(PidfileRecord {
                pid: 10,
                guard_pid: 11
            })
        );
    }

    #[test]
    fn garbage_is_unreadable() {
        let temp = tempdir().expect("tempdir");
        for garbage in [
            "not a pidfile",
            "pid abc\nguard_pid 3\nformat 2\n",
            "pid 10\nformat 2\n",
            "0",
            "-17",
            "",
        ] {
            let path = temp.path().join("bad.pid");
            fs::write(&path, garbage).expect("write");
            assert_eq!(
                read(&path).expect("read"),
                PidfileState::Unreadable,
                "content {garbage:?} should be unreadable"
            );
        }
    }

    #[test]
    fn remove_is_idempotent() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("gone.pid");
        fs::write(&path, "123").expect("write");

        remove(&path).expect("first remove");
        assert!(!path.exists());
        remove(&path).expect("second remove");
    }
}
