//! Pidfile-guarded daemon supervision for Unix hosts.
//!
//! Each supervised daemon is two processes: a *guardian* that owns the
//! pidfile and an exclusive advisory lock on a sidecar file, and the
//! *worker* it launched. The kernel releasing the lock on guardian death
//! is the liveness oracle; stop and check never trust the process table.

#![warn(unused_crate_dependencies)]
// Test dependencies are only used in the integration suite under tests/
#[cfg(test)]
use assert_cmd as _;
#[cfg(test)]
use predicates as _;
#[cfg(test)]
use sysinfo as _;

/// Liveness check.
pub mod check;

/// CLI parsing.
pub mod cli;

/// Constants.
pub mod constants;

/// Errors.
pub mod error;

/// Guardian loop.
pub mod guardian;

/// Advisory lock manager.
pub mod lock;

/// Logging setup.
pub mod logs;

/// Pidfile store.
pub mod pidfile;

/// Privilege dropping.
pub mod privilege;

/// Daemon specification.
pub mod spec;

/// Start engine.
pub mod start;

/// Status snapshots.
pub mod status;

/// Stop engine.
pub mod stop;

/// Integer-field validation.
pub mod validate;

/// Test utils.
#[doc(hidden)]
pub mod test_utils;
