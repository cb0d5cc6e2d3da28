//! Command-line interface for guardd.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line interface for guardd.
#[derive(Parser)]
#[command(name = "guardd", version, author)]
#[command(about = "Pidfile-guarded daemon supervisor", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation (tracing
    /// filter syntax, e.g. "debug" or "guardd=trace").
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for guardd.
#[derive(Subcommand)]
pub enum Commands {
    /// Launch a guardian/worker pair for a command.
    Start {
        /// Absolute path of the pidfile the guardian will own.
        #[arg(short, long)]
        pidfile: PathBuf,

        /// Append-mode sink for worker stdout (defaults to /dev/null).
        #[arg(long, value_name = "FILE")]
        stdout: Option<PathBuf>,

        /// Append-mode sink for worker stderr (defaults to /dev/null).
        #[arg(long, value_name = "FILE")]
        stderr: Option<PathBuf>,

        /// Append-mode sink for guardian diagnostics.
        #[arg(long, value_name = "FILE")]
        guardian_log: Option<PathBuf>,

        /// Human label for the daemon.
        #[arg(long)]
        name: Option<String>,

        /// Seconds of grace between SIGTERM and SIGKILL when stopping
        /// the worker; 0 skips SIGTERM.
        #[arg(long, value_name = "SECS", default_value = "0")]
        term_timeout: String,

        /// Working directory for the guardian and worker.
        #[arg(long, value_name = "DIR", default_value = "/")]
        working_dir: PathBuf,

        /// Run the worker as this user (requires root).
        #[arg(long)]
        user: Option<String>,

        /// Run the worker with this group (requires root).
        #[arg(long)]
        group: Option<String>,

        /// Extra worker environment entries.
        #[arg(long, value_name = "KEY=VALUE")]
        env: Vec<String>,

        /// Worker command; a single argument is run through `/bin/sh -c`.
        #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Stop the daemon owning a pidfile.
    Stop {
        /// Pidfile of the daemon to stop.
        #[arg(short, long)]
        pidfile: PathBuf,

        /// Seconds to wait for the guardian to exit.
        #[arg(long, value_name = "SECS", default_value = "30")]
        timeout: String,
    },

    /// Report whether the daemon owning a pidfile is alive.
    Check {
        /// Pidfile to inspect.
        #[arg(short, long)]
        pidfile: PathBuf,

        /// Emit a JSON status snapshot instead of plain text.
        #[arg(long)]
        json: bool,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
