//! Unit tests for log.rs
//!
//! Tests LogEntry, LogSeverity, DefaultLogger formatting and the error macros.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::lumen::{Engine, Error, Result};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "lumen::Test".to_string(),
        message: "hello".to_string(),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
}

// ============================================================================
// DEFAULT LOGGER FORMAT TESTS
// ============================================================================

#[test]
fn test_format_plain_without_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Info, None, None));
    assert!(line.contains("[INFO ]"));
    assert!(line.contains("[lumen::Test]"));
    assert!(line.ends_with("hello"));
}

#[test]
fn test_format_plain_with_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Error, Some("frame.rs"), Some(42)));
    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("hello (frame.rs:42)"));
}

#[test]
fn test_format_plain_ignores_partial_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Warn, Some("frame.rs"), None));
    assert!(!line.contains("frame.rs"));
}

#[test]
#[serial]
fn test_format_colored_matches_plain_text_for_every_severity() {
    colored::control::set_override(false);
    for severity in [LogSeverity::Trace, LogSeverity::Info, LogSeverity::Error] {
        let detailed = entry(severity, Some("upload.rs"), Some(7));
        let simple = entry(severity, None, None);
        assert_eq!(DefaultLogger::format_colored(&detailed), DefaultLogger::format_plain(&detailed));
        assert_eq!(DefaultLogger::format_colored(&simple), DefaultLogger::format_plain(&simple));
    }
    colored::control::unset_override();
}

// ============================================================================
// ERROR MACROS
// ============================================================================

fn bail_when(fail: bool) -> Result<u32> {
    if fail {
        crate::engine_bail!("lumen::Test", "bailing with code {}", 7);
    }
    Ok(1)
}

#[test]
#[serial]
fn test_engine_err_logs_and_builds_backend_error() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: entries.clone() });

    let err = crate::engine_err!("lumen::Test", "device lost ({})", -4);
    assert_eq!(err, Error::BackendError("device lost (-4)".to_string()));

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].message, "device lost (-4)");
    assert!(captured[0].file.is_some());
    assert!(captured[0].line.is_some());
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: entries.clone() });

    assert_eq!(bail_when(false), Ok(1));
    assert_eq!(
        bail_when(true),
        Err(Error::BackendError("bailing with code 7".to_string()))
    );
    assert_eq!(entries.lock().unwrap().len(), 1);

    Engine::reset_logger();
}
