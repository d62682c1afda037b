// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

/// Configuration file as read from TOML, before validation.
///
/// ```toml
/// [session]
/// combine_stderr = true
/// timeout = "5s"
/// expected_exit_code = 0
/// shell = "bash"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Session-wide execution defaults from `[session]`.
    #[serde(default)]
    pub session: RawSessionSection,
}

/// `[session]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSessionSection {
    /// Redirect stderr into stdout so a single reader sees both.
    #[serde(default)]
    pub combine_stderr: bool,

    /// Default `wait` window, e.g. `"250ms"`, `"5s"`, `"1m"`.
    ///
    /// If absent, `wait` without an explicit timeout blocks until the command
    /// exits.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Exit code considered a success.
    #[serde(default)]
    pub expected_exit_code: i32,

    /// Shell used to run command strings. Defaults to `sh` (`cmd` on Windows).
    #[serde(default)]
    pub shell: Option<String>,
}

impl Default for RawSessionSection {
    fn default() -> Self {
        Self {
            combine_stderr: false,
            timeout: None,
            expected_exit_code: 0,
            shell: None,
        }
    }
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`) or
/// `Default`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub session: SessionConfig,
}

/// Typed session settings handed to a session implementation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub combine_stderr: bool,
    pub timeout: Option<Duration>,
    pub expected_exit_code: i32,
    pub shell: Option<String>,
}
