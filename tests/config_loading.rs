// tests/config_loading.rs

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use rcontrol::config::{load_and_validate, ConfigFile};
use rcontrol::exec::ExecOptions;
use rcontrol::RcontrolError;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn full_session_section_is_parsed() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
[session]
combine_stderr = true
timeout = "1500ms"
expected_exit_code = 3
shell = "bash"
"#
    )?;

    let cfg = load_and_validate(file.path())?;

    assert!(cfg.session.combine_stderr);
    assert_eq!(cfg.session.timeout, Some(Duration::from_millis(1500)));
    assert_eq!(cfg.session.expected_exit_code, 3);
    assert_eq!(cfg.session.shell.as_deref(), Some("bash"));

    let options = ExecOptions::from_config(&cfg.session);
    assert!(options.combine_stderr);
    assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
    assert_eq!(options.expected_exit_code, 3);
    Ok(())
}

#[test]
fn empty_file_uses_defaults() -> TestResult {
    let file = NamedTempFile::new()?;

    let cfg = load_and_validate(file.path())?;
    let defaults = ConfigFile::default();

    assert_eq!(cfg.session, defaults.session);
    assert!(!cfg.session.combine_stderr);
    assert_eq!(cfg.session.timeout, None);
    Ok(())
}

#[test]
fn bad_timeout_is_a_config_error() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
[session]
timeout = "forever"
"#
    )?;

    match load_and_validate(file.path()) {
        Err(RcontrolError::ConfigError(msg)) => assert!(msg.contains("[session].timeout")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
    Ok(())
}

#[test]
fn malformed_toml_is_reported() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(file, "[session\ncombine_stderr = ")?;

    assert!(matches!(
        load_and_validate(file.path()),
        Err(RcontrolError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/Rcontrol.toml"),
        Err(RcontrolError::IoError(_))
    ));
}
