// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RcontrolError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The process could not be started at all.
    #[error("failed to launch command '{command}': {source}")]
    LaunchFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An exit code was requested before the task reached FINISHED.
    #[error("command '{0}' has not finished; no exit code available")]
    NotFinished(String),

    #[error("command '{command}' timed out")]
    Timeout { command: String },

    #[error("command '{command}' exited with code {actual} (expected {expected})")]
    ExitCode {
        command: String,
        expected: i32,
        actual: i32,
    },

    #[error("{}", describe_task_errors(.0))]
    TaskErrors(Vec<RcontrolError>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn describe_task_errors(errors: &[RcontrolError]) -> String {
    let details = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} task(s) failed: {}", errors.len(), details)
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RcontrolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_errors_lists_every_failure() {
        let err = RcontrolError::TaskErrors(vec![
            RcontrolError::Timeout {
                command: "sleep 10".to_string(),
            },
            RcontrolError::ExitCode {
                command: "false".to_string(),
                expected: 0,
                actual: 1,
            },
        ]);

        let msg = err.to_string();
        assert!(msg.starts_with("2 task(s) failed"));
        assert!(msg.contains("'sleep 10' timed out"));
        assert!(msg.contains("exited with code 1 (expected 0)"));
    }
}
