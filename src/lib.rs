// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod session;
pub mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config_path, load_and_validate};
use crate::exec::ExecOptions;
use crate::session::{LocalSession, Session};
use crate::types::TaskState;

pub use crate::errors::{RcontrolError, Result as RcontrolResult};
pub use crate::exec::{CommandTask, ProcessHandle};
pub use crate::types::{ReaderState, StreamOrigin};

/// Exit status used by the binary when the command timed out.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// How long to wait for a killed command to be reaped and drained.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// High-level entry point used by `main.rs`.
///
/// Loads config, applies CLI overrides, runs the command through a
/// [`LocalSession`] with its output forwarded to our stdout/stderr, and returns
/// the exit status the binary should terminate with.
pub async fn run(args: CliArgs) -> Result<i32> {
    let mut cfg = load_config(&args)?;

    if args.combine_stderr {
        cfg.session.combine_stderr = true;
    }
    if let Some(timeout) = args.timeout {
        cfg.session.timeout = Some(timeout);
    }
    if let Some(shell) = &args.shell {
        cfg.session.shell = Some(shell.clone());
    }

    let defaults = ExecOptions::from_config(&cfg.session)
        .on_stdout(|line| println!("{line}"))
        .on_stderr(|line| eprintln!("{line}"));
    let session = LocalSession::from_config(&cfg.session).with_defaults(defaults);

    let command = args.command.join(" ");
    let task = session
        .execute(&command)
        .with_context(|| format!("running '{command}'"))?;

    match task.wait_default().await {
        TaskState::Finished { exit_code } => Ok(process_exit_status(exit_code)),
        _ => {
            warn!(command = %command, "command timed out; killing it");
            task.kill();
            // Bounds the drain too: a grandchild may still hold the pipes.
            let reaped = tokio::time::timeout(KILL_GRACE, task.wait(None)).await;
            if !reaped.is_ok_and(|state| state.is_finished()) {
                warn!(command = %command, "command still running after kill");
            }
            Ok(TIMEOUT_EXIT_CODE)
        }
    }
}

fn load_config(args: &CliArgs) -> Result<ConfigFile> {
    let (path, explicit) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (default_config_path(), false),
    };

    if !explicit && !path.exists() {
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(ConfigFile::default());
    }

    load_and_validate(&path).with_context(|| format!("loading config {}", path.display()))
}

/// Map a task exit code onto a status this process can exit with.
///
/// Negative codes (signal deaths) follow the shell convention `128 + signal`.
fn process_exit_status(exit_code: i32) -> i32 {
    if exit_code < 0 {
        128 + exit_code.saturating_neg()
    } else {
        exit_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_deaths_map_to_shell_convention() {
        assert_eq!(process_exit_status(0), 0);
        assert_eq!(process_exit_status(3), 3);
        assert_eq!(process_exit_status(-9), 137);
    }
}
