// src/session/local.rs

use tracing::debug;

use crate::config::SessionConfig;
use crate::errors::Result;
use crate::exec::{CommandTask, ExecOptions, LocalProcess};
use crate::session::{Session, TaskRegistry};

/// A session on the local machine.
///
/// Commands run through a shell (`sh -c` by default). Must be used from
/// within a Tokio runtime.
#[derive(Debug, Default)]
pub struct LocalSession {
    shell: Option<String>,
    defaults: ExecOptions,
    registry: TaskRegistry,
}

impl LocalSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &SessionConfig) -> Self {
        Self {
            shell: cfg.shell.clone(),
            defaults: ExecOptions::from_config(cfg),
            registry: TaskRegistry::new(),
        }
    }

    /// Replace the options used by [`Session::execute`].
    pub fn with_defaults(mut self, defaults: ExecOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }
}

impl Session for LocalSession {
    fn defaults(&self) -> &ExecOptions {
        &self.defaults
    }

    fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    fn execute_with(&self, command: &str, options: ExecOptions) -> Result<CommandTask> {
        debug!(command = %command, ?options, "executing local command");
        let process = LocalProcess::spawn(command, self.shell.as_deref(), options.combine_stderr)?;
        let task = CommandTask::start(command, Box::new(process), options);
        self.registry.register(task.clone());
        Ok(task)
    }
}
