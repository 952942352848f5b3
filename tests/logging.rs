//! Process-wide logging configuration.
//!
//! Installs the global subscriber, so it lives in its own test binary with a
//! single test.

use heart_disease_mlops::observability::{logging::configure_logging_with_writer, LogLevel};

mod common;

use common::SharedBuffer;

#[test]
fn test_reconfiguration_keeps_one_destination() {
    let first = SharedBuffer::default();
    let writer = first.clone();
    let level = configure_logging_with_writer("info", false, move || writer.clone()).unwrap();
    assert_eq!(level, LogLevel::Info);
    assert!(first.contents().contains("Logging configured - Level: INFO, JSON: false"));

    let second = SharedBuffer::default();
    let writer = second.clone();
    let level = configure_logging_with_writer("not-a-level", true, move || writer.clone()).unwrap();
    assert_eq!(level, LogLevel::Info);

    first.clear();
    second.clear();
    tracing::info!("x");

    assert_eq!(first.contents(), "");
    let contents = second.contents();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);
    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    for key in ["timestamp", "level", "logger", "message"] {
        assert!(record.get(key).is_some(), "missing {key}");
    }
    assert_eq!(record["message"], "x");

    // Same destination configured twice still writes each record once.
    let writer = second.clone();
    configure_logging_with_writer("DEBUG", true, move || writer.clone()).unwrap();
    second.clear();
    tracing::debug!("y");
    assert_eq!(second.contents().lines().count(), 1);

    // Below the configured level nothing is written.
    let writer = second.clone();
    configure_logging_with_writer("ERROR", false, move || writer.clone()).unwrap();
    second.clear();
    tracing::warn!("suppressed");
    assert_eq!(second.contents(), "");
}
