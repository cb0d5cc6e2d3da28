//! Tracing setup for CLI invocations and the detached guardian.

use std::io;

use tracing_subscriber::EnvFilter;

/// Initializes logging for a CLI invocation.
///
/// `level` (the `--log-level` flag) overrides `RUST_LOG`; without either
/// the CLI stays quiet below `warn`.
pub fn init_cli_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Initializes guardian-side logging.
///
/// Runs after the guardian has re-pointed its stderr (at the guardian
/// log when one is configured), so the plain stderr writer is the right
/// destination either way. A subscriber inherited from the embedding
/// process keeps working for the same reason.
pub fn init_guardian_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
