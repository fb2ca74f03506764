//! Tests for error records and the user-facing message

#![allow(clippy::unwrap_used)]

use crate::constants::{ERROR_MSG_PREFIX, LOCAL_SOURCE_TYPE};
use crate::error::{CommError, ErrorDetails, ErrorKind, ErrorState};

#[test]
fn test_message_without_record() {
    let state = ErrorState::new();
    assert_eq!(
        state.message(),
        "[OpenSearch][SQL ODBC Driver][SQL Plugin] No error details available; check the driver logs."
    );
    assert!(state.kind().is_none());
}

#[test]
fn test_message_escapes_newlines() {
    let state = ErrorState::new();
    state.set_local(
        "Execution error",
        "line one\nline two\n",
        ErrorKind::QuerySyntax,
    );
    let message = state.message();
    assert_eq!(
        message,
        format!("{ERROR_MSG_PREFIX}Execution error: line one\\nline two\\n")
    );
    assert!(!message.contains('\n'));
}

#[test]
fn test_last_write_wins() {
    let state = ErrorState::new();
    state.set_local("First", "a", ErrorKind::InvalidAuth);
    state.set_local("Second", "b", ErrorKind::CommLinkFailure);

    let current = state.get().unwrap();
    assert_eq!(current.reason, "Second");
    assert_eq!(state.kind(), Some(ErrorKind::CommLinkFailure));

    state.clear();
    assert!(state.get().is_none());
}

#[test]
fn test_clones_share_the_slot() {
    let state = ErrorState::new();
    let background = state.clone();
    background.set_local("Cursor error", "boom", ErrorKind::QuerySyntax);
    assert_eq!(state.get().unwrap().details, "boom");
}

#[test]
fn test_local_records_use_sentinel_source_type() {
    let details = ErrorDetails::local("Connection error", "down", ErrorKind::CommLinkFailure);
    assert_eq!(details.source_type, LOCAL_SOURCE_TYPE);
    assert_eq!(details.to_string(), "Connection error: down");
}

#[test]
fn test_comm_error_conversion() {
    let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let details = ErrorDetails::from(CommError::parse(&parse, "{"));
    assert_eq!(details.kind, ErrorKind::QuerySyntax);
    assert!(details.details.contains("when parsing json string '{'"));

    let details = ErrorDetails::from(CommError::Transport("refused".to_string()));
    assert_eq!(details.kind, ErrorKind::CommLinkFailure);

    let details = ErrorDetails::from(CommError::Signing("no credentials".to_string()));
    assert_eq!(details.kind, ErrorKind::InvalidAuth);
}

#[test]
fn test_error_kind_codes_are_distinct() {
    let kinds = [
        ErrorKind::InvalidAuth,
        ErrorKind::UnableToEstablish,
        ErrorKind::CommLinkFailure,
        ErrorKind::InvalidNullPtr,
        ErrorKind::QuerySyntax,
    ];
    let codes: std::collections::HashSet<_> = kinds.iter().map(ErrorKind::code).collect();
    assert_eq!(codes.len(), kinds.len());
}
