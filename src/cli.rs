// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::parse_duration;

/// Command-line arguments for `rcontrol`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rcontrol",
    version,
    about = "Run a command as a managed task, streaming its output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If omitted, `Rcontrol.toml` is used when it exists in the current
    /// working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Give up waiting after this long (e.g. `500ms`, `5s`, `1m`); the command
    /// is then killed and rcontrol exits with status 124.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Redirect the command's stderr into its stdout.
    #[arg(long)]
    pub combine_stderr: bool,

    /// Shell used to run the command (default: `sh`, or `cmd` on Windows).
    #[arg(long, value_name = "SHELL")]
    pub shell: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RCONTROL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// The command to run, passed to the shell as one string.
    #[arg(required = true, trailing_var_arg = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_trailing_command() {
        let args = CliArgs::try_parse_from([
            "rcontrol",
            "--timeout",
            "2s",
            "--combine-stderr",
            "--",
            "echo",
            "hi",
        ])
        .unwrap();

        assert_eq!(args.timeout, Some(Duration::from_secs(2)));
        assert!(args.combine_stderr);
        assert_eq!(args.command, vec!["echo", "hi"]);
    }

    #[test]
    fn rejects_bad_timeout() {
        assert!(CliArgs::try_parse_from(["rcontrol", "--timeout", "soon", "true"]).is_err());
    }
}
