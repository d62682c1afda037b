// src/session/mod.rs

//! Sessions: where commands run.
//!
//! A session knows how to obtain a runnable process and wraps it in a
//! [`CommandTask`]. Only [`LocalSession`] lives here; a remote session
//! implements the same trait on top of its own `ProcessHandle`.

pub mod local;

use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::{RcontrolError, Result};
use crate::exec::{CommandTask, ExecOptions};
use crate::types::TaskState;

pub use local::LocalSession;

pub trait Session: Send + Sync {
    /// Options used by [`Session::execute`].
    fn defaults(&self) -> &ExecOptions;

    /// Tasks launched through this session.
    fn registry(&self) -> &TaskRegistry;

    /// Launch `command` with explicit options.
    ///
    /// A command that cannot be launched at all is reported here, never
    /// deferred to `wait`.
    fn execute_with(&self, command: &str, options: ExecOptions) -> Result<CommandTask>;

    /// Launch `command` with the session defaults.
    fn execute(&self, command: &str) -> Result<CommandTask> {
        self.execute_with(command, self.defaults().clone())
    }

    /// Tasks of this session that have not finished yet.
    fn tasks(&self) -> Vec<CommandTask> {
        self.registry().running()
    }
}

/// Book-keeping of the tasks launched by a session.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<Vec<CommandTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, task: CommandTask) {
        debug!(command = %task.command(), "registering task");
        self.lock().push(task);
    }

    /// Registered tasks that have not finished yet.
    pub fn running(&self) -> Vec<CommandTask> {
        self.lock()
            .iter()
            .filter(|t| !t.is_finished())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Wait for every unfinished task, each with the given window, or with
    /// its own configured timeout when `timeout` is `None`. Returns the state
    /// each task ended up in.
    pub async fn wait_all(&self, timeout: Option<Duration>) -> Vec<TaskState> {
        let tasks = self.running();
        let mut states = Vec::with_capacity(tasks.len());
        for task in &tasks {
            states.push(wait_within(task, timeout).await);
        }
        states
    }

    /// Wait for every registered task and collect the errors of tasks that
    /// timed out or exited with an unexpected code.
    ///
    /// Finished tasks leave the registry; timed-out ones stay registered.
    pub async fn wait_for_tasks(&self, timeout: Option<Duration>) -> Result<()> {
        let tasks = std::mem::take(&mut *self.lock());
        let mut errors = Vec::new();
        for task in tasks {
            wait_within(&task, timeout).await;
            if let Some(err) = task.error() {
                errors.push(err);
            }
            if !task.is_finished() {
                self.lock().push(task);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RcontrolError::TaskErrors(errors))
        }
    }

    /// Kill every unfinished task. Returns how many kill requests were sent.
    pub fn kill_all(&self) -> usize {
        let killed = self.running().iter().filter(|t| t.kill()).count();
        if killed > 0 {
            info!(killed, "killed unfinished tasks");
        }
        killed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CommandTask>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

async fn wait_within(task: &CommandTask, timeout: Option<Duration>) -> TaskState {
    match timeout {
        Some(window) => task.wait(Some(window)).await,
        None => task.wait_default().await,
    }
}
