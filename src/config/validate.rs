// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile, RawSessionSection, SessionConfig};
use crate::errors::{RcontrolError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RcontrolError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let session = validate_session(raw.session)?;
        Ok(ConfigFile { session })
    }
}

fn validate_session(raw: RawSessionSection) -> Result<SessionConfig> {
    let timeout = match raw.timeout.as_deref() {
        Some(s) => Some(parse_duration(s).map_err(|e| {
            RcontrolError::ConfigError(format!("[session].timeout: {e}"))
        })?),
        None => None,
    };

    if let Some(shell) = &raw.shell {
        if shell.trim().is_empty() {
            return Err(RcontrolError::ConfigError(
                "[session].shell must not be empty".to_string(),
            ));
        }
    }

    Ok(SessionConfig {
        combine_stderr: raw.combine_stderr,
        timeout,
        expected_exit_code: raw.expected_exit_code,
        shell: raw.shell,
    })
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' out of range", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration(" 5s "), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_missing_or_unknown_units() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn rejects_durations_that_overflow() {
        let err = parse_duration("307445734561825862m").unwrap_err();
        assert!(err.contains("out of range"), "{err}");
        assert!(parse_duration("18446744073709551615h").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s"),
            Ok(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn empty_shell_is_a_config_error() {
        let raw = RawConfigFile {
            session: RawSessionSection {
                shell: Some("  ".to_string()),
                ..RawSessionSection::default()
            },
        };

        match ConfigFile::try_from(raw) {
            Err(RcontrolError::ConfigError(msg)) => assert!(msg.contains("shell")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }
}
