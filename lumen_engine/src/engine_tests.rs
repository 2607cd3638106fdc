//! Unit tests for the Engine logging facade
//!
//! The logger is a process-wide static, so every test here is #[serial].

use crate::lumen::Engine;
use crate::lumen::log::{Logger, LogEntry, LogSeverity};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.push(format!("{:?}: {}", entry.severity, entry.message));
    }
}

fn install() -> Arc<Mutex<Vec<String>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(TestLogger { entries: entries.clone() });
    entries
}

// ============================================================================
// LOGGER TESTS
// ============================================================================

#[test]
#[serial]
fn test_custom_logger_receives_macro_output() {
    let entries = install();

    crate::engine_info!("lumen::Test", "{} slots", 2);
    crate::engine_warn!("lumen::Test", "suboptimal");

    let captured = entries.lock().unwrap().clone();
    assert_eq!(captured, vec!["Info: 2 slots".to_string(), "Warn: suboptimal".to_string()]);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_min_severity_filters_messages() {
    let entries = install();
    Engine::set_min_severity(LogSeverity::Warn);

    crate::engine_trace!("lumen::Test", "dropped");
    crate::engine_debug!("lumen::Test", "dropped");
    crate::engine_info!("lumen::Test", "dropped");
    crate::engine_warn!("lumen::Test", "kept");
    crate::engine_error!("lumen::Test", "kept too");

    assert_eq!(entries.lock().unwrap().len(), 2);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_reset_logger_detaches_custom_logger() {
    let entries = install();
    Engine::reset_logger();

    crate::engine_info!("lumen::Test", "goes to stdout");

    assert!(entries.lock().unwrap().is_empty());
}

#[test]
#[serial]
fn test_reset_logger_restores_trace_level() {
    Engine::set_min_severity(LogSeverity::Error);
    Engine::reset_logger();
    let entries = install();

    crate::engine_trace!("lumen::Test", "visible again");

    assert_eq!(entries.lock().unwrap().len(), 1);
    Engine::reset_logger();
}
