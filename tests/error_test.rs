//! Tests for error types

use trueno_exp::repository::EntityKind;
use trueno_exp::Error;

#[test]
fn test_conflict_error() {
    let error = Error::conflict(EntityKind::Split, "s1");
    let error_str = format!("{error}");
    assert!(error_str.contains("split s1 already exists"));
    assert!(error_str.contains("Set allow_overwrite=true"));
    assert!(error.is_conflict());
    assert!(error.is_fatal());
}

#[test]
fn test_not_found_error() {
    let error = Error::not_found(EntityKind::Experiment, "iris");
    assert_eq!(format!("{error}"), "experiment iris not found");
    assert!(!error.is_conflict());
}

#[test]
fn test_precondition_error() {
    let error = Error::Precondition("parameters must be a mapping".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Precondition failed"));
    assert!(error.is_fatal());
}

#[test]
fn test_config_error() {
    let error = Error::Config("experiment iris is missing: backend".to_string());
    assert!(format!("{error}").contains("Configuration error"));
}

#[test]
fn test_invalid_transition_error() {
    let error = Error::InvalidTransition {
        entity: "run r1".to_string(),
        from: "completed".to_string(),
        to: "running".to_string(),
    };
    assert_eq!(format!("{error}"), "Invalid transition for run r1: completed -> running");
}

#[test]
fn test_storage_error() {
    let error = Error::StorageError("file not found".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Storage error"));
    assert!(error_str.contains("file not found"));
}

#[test]
fn test_pipeline_error_is_not_fatal() {
    let error = Error::from(anyhow::anyhow!("cannot fit on an empty training set"));
    assert!(format!("{error}").contains("Pipeline error"));
    assert!(!error.is_fatal());
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let error: Error = io.into();
    assert!(format!("{error}").contains("IO error"));
}

#[test]
fn test_json_error_conversion() {
    let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json.into();
    assert!(matches!(error, Error::Json(_)));
}

#[test]
fn test_pattern_error_conversion() {
    let error: Error = regex::Regex::new("(").unwrap_err().into();
    assert!(format!("{error}").contains("Invalid search pattern"));
}

#[test]
fn test_other_error() {
    let error = Error::Other("custom error".to_string());
    assert_eq!(format!("{error}"), "custom error");
}

#[test]
fn test_error_debug() {
    let error = Error::Other("test".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("Other"));
}
