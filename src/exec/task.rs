// src/exec/task.rs

//! Command task: the single source of truth for "is this command done, and
//! with what exit code".
//!
//! [`CommandTask::start`] wires a launched process to a
//! [`StreamsCoordinator`] and spawns a supervisor that:
//!
//! 1. waits for the process to exit (or for an explicit [`CommandTask::kill`])
//!    and publishes the exit code,
//! 2. joins the coordinator so every output line has been dispatched,
//! 3. finalizes: records the exit code once, runs completion hooks, then
//!    publishes `TaskState::Finished`.
//!
//! Callers observe the task through `watch` channels, so `wait` can be called
//! from any number of clones, and a timed-out task still converges to
//! FINISHED once the process exits. A `wait` window only bounds step 1; once
//! the process has exited the caller always waits for the drain.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::errors::{RcontrolError, Result};
use crate::exec::process::ProcessHandle;
use crate::exec::streams::{LineCallback, LineCallbacks, OutputSink, StreamsCoordinator};
use crate::types::TaskState;

/// Called once with the exit code when a task finishes.
pub type DoneCallback = Arc<dyn Fn(i32) + Send + Sync>;

/// Called once when a task first times out.
pub type TimeoutCallback = Arc<dyn Fn() + Send + Sync>;

/// Per-command execution options.
#[derive(Clone, Default)]
pub struct ExecOptions {
    /// Redirect stderr into stdout; only one reader is created.
    pub combine_stderr: bool,
    /// Window used by [`CommandTask::wait_default`].
    pub timeout: Option<Duration>,
    /// Exit code considered a success by [`CommandTask::error`].
    pub expected_exit_code: i32,
    pub on_stdout: Option<LineCallback>,
    pub on_stderr: Option<LineCallback>,
    /// Replaces `on_stdout`/`on_stderr` when set.
    pub sink: Option<Arc<dyn OutputSink>>,
    pub on_timeout: Option<TimeoutCallback>,
    pub on_done: Option<DoneCallback>,
}

impl fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("combine_stderr", &self.combine_stderr)
            .field("timeout", &self.timeout)
            .field("expected_exit_code", &self.expected_exit_code)
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .field("sink", &self.sink.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .field("on_done", &self.on_done.is_some())
            .finish()
    }
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &SessionConfig) -> Self {
        Self {
            combine_stderr: cfg.combine_stderr,
            timeout: cfg.timeout,
            expected_exit_code: cfg.expected_exit_code,
            ..Self::default()
        }
    }

    pub fn combine_stderr(mut self, val: bool) -> Self {
        self.combine_stderr = val;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn expected_exit_code(mut self, code: i32) -> Self {
        self.expected_exit_code = code;
        self
    }

    pub fn on_stdout(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_stdout = Some(Arc::new(f));
        self
    }

    pub fn on_stderr(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_stderr = Some(Arc::new(f));
        self
    }

    pub fn sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn on_timeout(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(Arc::new(f));
        self
    }

    pub fn on_done(mut self, f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.on_done = Some(Arc::new(f));
        self
    }

    fn output_sink(&self) -> Arc<dyn OutputSink> {
        match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => Arc::new(LineCallbacks {
                stdout: self.on_stdout.clone(),
                stderr: self.on_stderr.clone(),
            }),
        }
    }
}

/// State shared between task handles and the supervisor.
struct TaskShared {
    command: String,
    expected_exit_code: i32,
    default_timeout: Option<Duration>,
    state: watch::Sender<TaskState>,
    /// Exit code as soon as the process is reaped, before output is drained.
    exited: watch::Sender<Option<i32>>,
    exit_code: OnceLock<i32>,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
    on_timeout: Option<TimeoutCallback>,
    on_done: Option<DoneCallback>,
}

impl TaskShared {
    fn new(command: String, options: &ExecOptions, kill_tx: oneshot::Sender<()>) -> Self {
        let (state, _) = watch::channel(TaskState::Running);
        let (exited, _) = watch::channel(None);
        Self {
            command,
            expected_exit_code: options.expected_exit_code,
            default_timeout: options.timeout,
            state,
            exited,
            exit_code: OnceLock::new(),
            kill_tx: Mutex::new(Some(kill_tx)),
            on_timeout: options.on_timeout.clone(),
            on_done: options.on_done.clone(),
        }
    }

    /// RUNNING -> TIMED_OUT. No-op in any other state.
    fn mark_timed_out(&self) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == TaskState::Running {
                *state = TaskState::TimedOut;
                true
            } else {
                false
            }
        });

        if changed {
            warn!(command = %self.command, "command timed out; process left running");
            if let Some(cb) = &self.on_timeout {
                self.run_hook("on_timeout", || cb());
            }
        }
        changed
    }

    /// Run a completion hook; a panicking hook is logged and otherwise ignored
    /// so the task still reaches FINISHED.
    fn run_hook(&self, hook: &str, f: impl FnOnce()) {
        if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
            error!(command = %self.command, hook, "completion hook panicked");
        }
    }

    /// Record the exit code and run completion hooks, at most once.
    ///
    /// Returns false if the task was already finalized.
    fn finalize(&self, exit_code: i32, process: &mut dyn ProcessHandle) -> bool {
        if self.exit_code.set(exit_code).is_err() {
            debug!(
                command = %self.command,
                exit_code,
                recorded = self.exit_code.get().copied(),
                "task already finalized; ignoring"
            );
            return false;
        }

        self.run_hook("on_finished", || process.on_finished());
        if let Some(cb) = &self.on_done {
            self.run_hook("on_done", || cb(exit_code));
        }

        self.state.send_replace(TaskState::Finished { exit_code });
        true
    }
}

/// Handle to one command execution. Cheap to clone.
#[derive(Clone)]
pub struct CommandTask {
    shared: Arc<TaskShared>,
}

impl fmt::Debug for CommandTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTask")
            .field("command", &self.shared.command)
            .field("state", &self.state())
            .finish()
    }
}

impl CommandTask {
    /// Start supervising an already launched `process`.
    ///
    /// Output capture begins immediately. Must be called from within a Tokio
    /// runtime.
    pub fn start(
        command: impl Into<String>,
        mut process: Box<dyn ProcessHandle>,
        options: ExecOptions,
    ) -> Self {
        let command = command.into();

        let mut streams =
            StreamsCoordinator::new(process.as_mut(), options.combine_stderr, options.output_sink());
        streams.start();

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let shared = Arc::new(TaskShared::new(command, &options, kill_tx));

        debug!(
            command = %shared.command,
            readers = streams.reader_count(),
            "command task started"
        );

        tokio::spawn(supervise(Arc::clone(&shared), process, streams, kill_rx));

        Self { shared }
    }

    pub fn command(&self) -> &str {
        &self.shared.command
    }

    pub fn state(&self) -> TaskState {
        *self.shared.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// True iff a bounded wait elapsed and the task has not finished since.
    pub fn timed_out(&self) -> bool {
        self.state() == TaskState::TimedOut
    }

    /// Exit code of a finished task.
    pub fn exit_code(&self) -> Result<i32> {
        self.state()
            .exit_code()
            .ok_or_else(|| RcontrolError::NotFinished(self.shared.command.clone()))
    }

    /// Wait for the task to finish.
    ///
    /// `timeout` bounds how long to wait for the process to exit; `None` waits
    /// indefinitely. When the window elapses first the task is marked
    /// TIMED_OUT and returned as such; the process keeps running and a later
    /// `wait` can still observe FINISHED.
    ///
    /// Once the process has exited inside the window, this keeps waiting
    /// (without a bound) until all output has been dispatched and the task is
    /// FINISHED.
    pub async fn wait(&self, timeout: Option<Duration>) -> TaskState {
        // Both senders live in `shared`, so neither wait can close early.
        let mut exited = self.shared.exited.subscribe();
        let exit = async move { exited.wait_for(Option::is_some).await.is_ok() };

        if let Some(window) = timeout {
            if tokio::time::timeout(window, exit).await.is_err() {
                self.shared.mark_timed_out();
                return self.state();
            }
        }

        let mut state = self.shared.state.subscribe();
        let _ = state.wait_for(TaskState::is_finished).await;
        self.state()
    }

    /// [`wait`](Self::wait) with the `ExecOptions::timeout` the task was
    /// started with.
    pub async fn wait_default(&self) -> TaskState {
        self.wait(self.shared.default_timeout).await
    }

    /// Ask the supervisor to kill the process.
    ///
    /// The task then converges to FINISHED with the exit code of the killed
    /// process. Returns false if the process already exited or a kill was
    /// already requested.
    pub fn kill(&self) -> bool {
        let sender = match self.shared.kill_tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => {
                if tx.send(()).is_err() {
                    debug!(command = %self.shared.command, "process already exited; nothing to kill");
                    false
                } else {
                    info!(command = %self.shared.command, "kill requested");
                    true
                }
            }
            None => false,
        }
    }

    /// Failure of this task, if any.
    ///
    /// - TIMED_OUT -> `RcontrolError::Timeout`
    /// - FINISHED with a code other than the expected one -> `RcontrolError::ExitCode`
    pub fn error(&self) -> Option<RcontrolError> {
        match self.state() {
            TaskState::Running => None,
            TaskState::TimedOut => Some(RcontrolError::Timeout {
                command: self.shared.command.clone(),
            }),
            TaskState::Finished { exit_code } if exit_code != self.shared.expected_exit_code => {
                Some(RcontrolError::ExitCode {
                    command: self.shared.command.clone(),
                    expected: self.shared.expected_exit_code,
                    actual: exit_code,
                })
            }
            TaskState::Finished { .. } => None,
        }
    }

    pub fn ensure_success(&self) -> Result<()> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn supervise(
    shared: Arc<TaskShared>,
    mut process: Box<dyn ProcessHandle>,
    streams: StreamsCoordinator,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let status = tokio::select! {
        status = process.wait() => status,

        Ok(()) = &mut kill_rx => {
            info!(command = %shared.command, "killing process");
            if let Err(e) = process.kill().await {
                warn!(command = %shared.command, error = %e, "failed to kill process");
            }
            process.wait().await
        }
    };

    // Kill requests from here on have nothing left to act on.
    drop(kill_rx);

    let exit_code = match status {
        Ok(code) => code,
        Err(e) => {
            warn!(
                command = %shared.command,
                error = %e,
                "waiting for process failed; recording exit code -1"
            );
            -1
        }
    };

    shared.exited.send_replace(Some(exit_code));
    debug!(command = %shared.command, exit_code, "process exited; draining output");
    let stats = streams.join().await;

    info!(
        command = %shared.command,
        exit_code,
        stdout_lines = stats.stdout_lines,
        stderr_lines = stats.stderr_lines,
        "command finished"
    );

    shared.finalize(exit_code, process.as_mut());
}
