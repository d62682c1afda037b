// src/exec/process.rs

//! Process handle abstraction.
//!
//! The task machinery only needs a handful of things from a running command:
//! its output streams, a way to wait for its exit code, a way to kill it and
//! a hook that runs once the task is finished. [`ProcessHandle`] captures
//! exactly that, so a remote implementation (e.g. an SSH channel) can plug into
//! the same reader/task protocol as [`LocalProcess`].

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::errors::{RcontrolError, Result};

/// Readable byte stream produced by a command.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed future returned by [`ProcessHandle`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A launched command, as seen by a `CommandTask`.
pub trait ProcessHandle: Send {
    /// Hand over the stdout stream. Returns `None` if there is none or it was
    /// already taken.
    fn take_stdout(&mut self) -> Option<OutputStream>;

    /// Hand over the stderr stream. Returns `None` if there is none, if it was
    /// already taken, or if stderr is redirected into stdout.
    fn take_stderr(&mut self) -> Option<OutputStream>;

    /// Wait for the command to exit and return its exit code.
    fn wait(&mut self) -> BoxFuture<'_, io::Result<i32>>;

    /// Forcibly terminate the command.
    fn kill(&mut self) -> BoxFuture<'_, io::Result<()>>;

    /// Completion hook, run exactly once when the owning task reaches
    /// FINISHED, after the exit code is recorded.
    fn on_finished(&mut self) {}
}

/// A command running on the local machine through a shell.
#[derive(Debug)]
pub struct LocalProcess {
    child: Child,
}

impl LocalProcess {
    /// Launch `command` through `shell` (or the platform default).
    ///
    /// With `combine_stderr`, stderr is redirected into stdout by the shell
    /// and no separate stderr pipe is created.
    pub fn spawn(command: &str, shell: Option<&str>, combine_stderr: bool) -> Result<Self> {
        let mut cmd = shell_command(command, shell, combine_stderr);

        cmd.stdout(Stdio::piped())
            .stderr(if combine_stderr {
                Stdio::null()
            } else {
                Stdio::piped()
            })
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| RcontrolError::LaunchFailed {
            command: command.to_string(),
            source,
        })?;

        info!(
            command = %command,
            pid = child.id(),
            combine_stderr,
            "launched local process"
        );

        Ok(Self { child })
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

impl ProcessHandle for LocalProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.child
            .stdout
            .take()
            .map(|s| Box::new(s) as OutputStream)
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.child
            .stderr
            .take()
            .map(|s| Box::new(s) as OutputStream)
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<i32>> {
        Box::pin(async move {
            let status = self.child.wait().await?;
            Ok(exit_code_of(status))
        })
    }

    fn kill(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            debug!(pid = self.child.id(), "killing local process");
            self.child.kill().await
        })
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(command: &str, shell: Option<&str>, combine_stderr: bool) -> Command {
    if cfg!(windows) {
        let mut c = Command::new(shell.unwrap_or("cmd"));
        let script = if combine_stderr {
            format!("{command} 2>&1")
        } else {
            command.to_string()
        };
        c.arg("/C").arg(script);
        c
    } else {
        let mut c = Command::new(shell.unwrap_or("sh"));
        let script = if combine_stderr {
            format!("exec 2>&1\n{command}")
        } else {
            command.to_string()
        };
        c.arg("-c").arg(script);
        c
    }
}

/// Map an exit status to an integer code.
///
/// Signal deaths on unix become `-signal`; anything else without a code is
/// reported as `-1`.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}
