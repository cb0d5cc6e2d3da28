use std::{io, path::PathBuf};

use thiserror::Error;

/// Defines all possible errors raised by the guardian library.
///
/// Several variants carry messages that external callers match on
/// verbatim; their `Display` strings are part of the public contract.
#[derive(Debug, Error)]
pub enum GuardianError {
    /// A string-typed integer field failed validation.
    #[error("parameter '{field}' value '{value}' did not pass regex check")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// The raw value as supplied by the caller.
        value: String,
    },

    /// A daemon spec violated a structural invariant.
    #[error("invalid daemon spec: {0}")]
    InvalidSpec(String),

    /// A worker output sink could not be opened for appending.
    #[error("Error: Can't write to '{}'", .0.display())]
    Unwritable(PathBuf),

    /// The pidfile belongs to a live guardian.
    #[error("daemon already started")]
    AlreadyStarted,

    /// Lock acquisition lost a race against another guardian.
    #[error("daemon already started: lock file {} is held by another guardian", .0.display())]
    LockBusy(PathBuf),

    /// The guardian did not die within the stop timeout.
    #[error("failed to stop daemon")]
    StopTimeout,

    /// The pidfile holds neither format; stop refuses to guess a PID.
    #[error("pidfile {} is unreadable; refusing to stop", .0.display())]
    UnreadablePidfile(PathBuf),

    /// An orphaned worker outlived the SIGKILL sent by the reaper.
    #[error("orphaned worker {0} survived SIGKILL")]
    OrphanSurvived(i32),

    /// The guardian reported a start-time failure over the status pipe.
    #[error("{0}")]
    GuardianReport(String),

    /// Error publishing the pidfile record.
    #[error("failed to write pidfile {path}: {source}")]
    PidfileWrite {
        /// The pidfile that could not be written.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// Error rendering a status snapshot.
    #[error("failed to render status output: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected filesystem error, propagated unchanged.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Unexpected system call failure, propagated unchanged.
    #[error("{0}")]
    Sys(#[from] nix::errno::Errno),
}
