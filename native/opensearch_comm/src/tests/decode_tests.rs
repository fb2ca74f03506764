//! Tests for response decoding

#![allow(clippy::unwrap_used)]

use serde_json::json;

use crate::constants::{KEYWORD_DISPLAY_SIZE, KEYWORD_TYPE_OID, KEYWORD_TYPE_SIZE};
use crate::decode;
use crate::error::{CommError, ErrorKind};
use crate::models::CommandType;

#[test]
fn test_query_page_builds_keyword_columns() {
    let body = json!({
        "schema": [
            {"name": "host", "type": "keyword"},
            {"name": "bytes", "type": "long"}
        ],
        "datarows": [["a", 1], ["b", 2]],
        "total": 2,
        "size": 2,
        "status": 200
    })
    .to_string();

    let page = decode::parse_query_page(&body).unwrap();
    assert_eq!(page.num_fields(), 2);
    assert_eq!(page.row_count(), 2);
    assert_eq!(page.total, Some(2));
    assert_eq!(page.size, Some(2));
    assert_eq!(page.status, Some(200));
    assert_eq!(page.cursor, None);
    assert_eq!(page.command_type, CommandType::Select);
    assert_eq!(page.raw, body);

    let bytes = &page.columns[1];
    assert_eq!(bytes.field_name, "bytes");
    assert_eq!(bytes.declared_type, "long");
    assert_eq!(bytes.type_oid, KEYWORD_TYPE_OID);
    assert_eq!(bytes.type_size, KEYWORD_TYPE_SIZE);
    assert_eq!(bytes.display_size, KEYWORD_DISPLAY_SIZE);
    assert_eq!(bytes.length_of_str, KEYWORD_TYPE_SIZE);
    assert_eq!(bytes.relation_id, 0);
    assert_eq!(bytes.attribute_number, 0);
}

#[test]
fn test_query_page_cursor() {
    let body = json!({
        "schema": [{"name": "host", "type": "keyword"}],
        "cursor": "abc",
        "datarows": [["a"]],
        "total": 10,
        "size": 1,
        "status": 200
    })
    .to_string();

    let page = decode::parse_query_page(&body).unwrap();
    assert_eq!(page.cursor.as_deref(), Some("abc"));
    assert!(page.has_cursor());
}

#[test]
fn test_empty_cursor_means_no_more_pages() {
    let body = json!({"datarows": [], "cursor": ""}).to_string();
    let page = decode::parse_cursor_page(&body).unwrap();
    assert!(!page.has_cursor());
}

#[test]
fn test_query_page_missing_field_is_parse_error() {
    let body = json!({
        "schema": [{"name": "host", "type": "keyword"}],
        "total": 1,
        "size": 1,
        "status": 200
    })
    .to_string();

    let err = decode::parse_query_page(&body).unwrap_err();
    assert!(matches!(
        &err,
        CommError::Parse { message, body: kept } if message.contains("datarows") && kept == &body
    ));
    assert!(err.to_string().starts_with("Exception obtained '"));
}

#[test]
fn test_query_page_wrong_type_is_parse_error() {
    let body = json!({
        "schema": "host",
        "datarows": [],
        "total": 0,
        "size": 0,
        "status": 200
    })
    .to_string();
    assert!(decode::parse_query_page(&body).is_err());
}

#[test]
fn test_cursor_page_carries_rows_only() {
    let body = json!({"cursor": "def", "datarows": [["c"], ["d"]]}).to_string();
    let page = decode::parse_cursor_page(&body).unwrap();
    assert!(page.columns.is_empty());
    assert_eq!(page.row_count(), 2);
    assert_eq!(page.cursor.as_deref(), Some("def"));
    assert_eq!(page.status, None);
}

#[test]
fn test_cursor_page_requires_datarows() {
    let body = json!({"cursor": "def"}).to_string();
    assert!(decode::parse_cursor_page(&body).is_err());
}

#[test]
fn test_error_response() {
    let body = json!({
        "error": {
            "reason": "Invalid SQL query",
            "details": "no such index [nope]",
            "type": "IndexNotFoundException"
        },
        "status": 404
    })
    .to_string();

    let details = decode::parse_error_response(&body, ErrorKind::QuerySyntax).unwrap();
    assert_eq!(details.reason, "Invalid SQL query");
    assert_eq!(details.details, "no such index [nope]");
    assert_eq!(details.source_type, "IndexNotFoundException");
    assert_eq!(details.kind, ErrorKind::QuerySyntax);
}

#[test]
fn test_error_response_requires_status() {
    let body = json!({
        "error": {"reason": "r", "details": "d", "type": "t"}
    })
    .to_string();
    assert!(decode::parse_error_response(&body, ErrorKind::QuerySyntax).is_err());
    assert!(decode::parse_error_response("Not Found", ErrorKind::QuerySyntax).is_err());
}

#[test]
fn test_column_names() {
    let body = json!({
        "schema": [{"name": "a", "type": "text"}, {"name": "b", "type": "date"}],
        "datarows": [],
        "total": 0,
        "size": 0,
        "status": 200
    })
    .to_string();
    assert_eq!(decode::parse_column_names(&body).unwrap(), vec!["a", "b"]);
}

#[test]
fn test_root_document() {
    let body = json!({
        "cluster_name": "prod",
        "version": {"number": "1.3.0", "distribution": "opensearch"}
    })
    .to_string();
    let root = decode::parse_root(&body).unwrap();
    assert_eq!(root.cluster_name.as_deref(), Some("prod"));
    let version = root.version.unwrap();
    assert_eq!(version.number.as_deref(), Some("1.3.0"));
    assert_eq!(version.distribution.as_deref(), Some("opensearch"));

    let legacy = decode::parse_root(r#"{"version": {"number": "7.10.2"}}"#).unwrap();
    assert_eq!(legacy.version.unwrap().distribution, None);
    assert_eq!(legacy.cluster_name, None);
}
