use std::fmt;

/// Which output stream of a command a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamOrigin {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamOrigin::Stdout => f.write_str("stdout"),
            StreamOrigin::Stderr => f.write_str("stderr"),
        }
    }
}

/// Lifecycle of a single stream reader.
///
/// `NotStarted -> Running -> Finished`, never restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    NotStarted,
    Running,
    Finished,
}

/// Observable state of a command task.
///
/// - `Running`: the process has been launched and the task has not finished.
///   The process may already have exited while its output is still draining.
/// - `TimedOut`: a bounded `wait` elapsed before the process exited. The
///   process keeps running; this is superseded by `Finished` once it exits.
/// - `Finished`: the process exited, every output line was dispatched and the
///   exit code was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    TimedOut,
    Finished { exit_code: i32 },
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Finished { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TaskState::Finished { exit_code } => Some(*exit_code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_finished_carries_an_exit_code() {
        assert_eq!(TaskState::Running.exit_code(), None);
        assert_eq!(TaskState::TimedOut.exit_code(), None);
        assert_eq!(TaskState::Finished { exit_code: 3 }.exit_code(), Some(3));
        assert!(!TaskState::TimedOut.is_finished());
    }

    #[test]
    fn origin_display_is_lowercase_stream_name() {
        assert_eq!(StreamOrigin::Stdout.to_string(), "stdout");
        assert_eq!(StreamOrigin::Stderr.to_string(), "stderr");
    }
}
