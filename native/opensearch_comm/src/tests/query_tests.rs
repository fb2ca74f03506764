//! Tests for `execute_direct` and first-page handling

#![allow(clippy::unwrap_used)]

use serde_json::json;
use std::time::{Duration, Instant};

use crate::constants::{OPENSEARCH_SQL_ENDPOINT, QUEUE_TIMEOUT};
use crate::error::ErrorKind;
use crate::models::RetrievalOutcome;
use crate::transport::HttpResponse;

use super::test_utils::*;

#[test]
fn test_null_query_rejected_without_request() {
    let transport = healthy_cluster(|_, _| Ok(query_page(&["a"], json!([]), None)));
    let mut conn = connected(transport.clone());
    let before = transport.request_count();

    let err = conn.execute_direct(None, "").unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidNullPtr);
    assert_eq!(err.details, "Query is NULL");
    assert_eq!(conn.error_kind(), Some(ErrorKind::InvalidNullPtr));
    assert_eq!(transport.request_count(), before);
}

#[test]
fn test_missing_client_rejected() {
    let transport = healthy_cluster(|_, _| Ok(query_page(&["a"], json!([]), None)));
    let mut conn = configured(transport.clone());

    let err = conn.execute_direct(Some("SELECT 1"), "").unwrap_err();
    assert_eq!(err.kind, ErrorKind::CommLinkFailure);
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_single_page_without_cursor() {
    let transport = healthy_cluster(|_, _| {
        Ok(query_page(
            &["host", "bytes"],
            json!([["a", 1], ["b", 2]]),
            None,
        ))
    });
    let mut conn = connected(transport.clone());

    conn.execute_direct(Some("SELECT host, bytes FROM logs"), "-1")
        .unwrap();
    assert!(conn.pagination.is_none());
    assert_eq!(conn.retrieval_outcome(), RetrievalOutcome::Completed);

    let page = conn.pop_result().unwrap();
    assert_eq!(page.num_fields(), 2);
    assert_eq!(page.row_count(), 2);

    // End of results after at most one more queue timeout
    let start = Instant::now();
    assert!(conn.pop_result().is_none());
    assert!(start.elapsed() < QUEUE_TIMEOUT * 10);

    let query = transport
        .requests_to(OPENSEARCH_SQL_ENDPOINT)
        .into_iter()
        .find(|r| body_json(r)["query"] == "SELECT host, bytes FROM logs")
        .unwrap();
    assert_eq!(body_json(&query), json!({"query": "SELECT host, bytes FROM logs"}));
    assert!(transport.cursor_requests(OPENSEARCH_SQL_ENDPOINT).is_empty());
}

#[test]
fn test_fetch_size_sent_with_query() {
    let transport = healthy_cluster(|_, _| Ok(query_page(&["a"], json!([]), None)));
    let mut conn = connected(transport.clone());

    conn.execute_direct(Some("SELECT a FROM t"), "50").unwrap();

    let last = transport.requests().pop().unwrap();
    assert_eq!(
        body_json(&last),
        json!({"query": "SELECT a FROM t", "fetch_size": 50})
    );
}

#[test]
fn test_server_error_body_becomes_record() {
    let transport = healthy_cluster(|_, _| {
        Ok(error_response(
            400,
            "SyntaxCheckException",
            "Invalid SQL query",
            "Failed to parse query due to offending symbol [FORM]",
        ))
    });
    let mut conn = connected(transport);

    let err = conn
        .execute_direct(Some("SELECT * FORM logs"), "")
        .unwrap_err();
    assert_eq!(err.reason, "Invalid SQL query");
    assert_eq!(err.source_type, "SyntaxCheckException");
    assert_eq!(err.kind, ErrorKind::QuerySyntax);
    assert_eq!(
        conn.error_message(),
        "[OpenSearch][SQL ODBC Driver][SQL Plugin] Invalid SQL query: \
         Failed to parse query due to offending symbol [FORM]"
    );
    assert_eq!(conn.retrieval_outcome(), RetrievalOutcome::Failed);
    assert!(conn.pop_result().is_none());
}

#[test]
fn test_unparseable_server_error_composes_message() {
    let transport = healthy_cluster(|_, _| {
        Ok(HttpResponse {
            status: 500,
            body: "upstream exploded".into(),
            client_error: Some("stream reset".to_string()),
        })
    });
    let mut conn = connected(transport);

    let err = conn.execute_direct(Some("SELECT 1"), "").unwrap_err();
    assert_eq!(err.reason, "Execution error");
    assert_eq!(err.kind, ErrorKind::QuerySyntax);
    assert_eq!(
        err.details,
        "Http response code was not OK. Code received: 500. Client error: 'stream reset'. \
         Response error: 'upstream exploded'."
    );
}

#[test]
fn test_no_response_is_not_retried() {
    let transport = healthy_cluster(|_, _| {
        Err(crate::error::CommError::Transport("timed out".to_string()))
    });
    let mut conn = connected(transport.clone());
    let before = transport.request_count();

    let err = conn.execute_direct(Some("SELECT 1"), "").unwrap_err();
    assert_eq!(err.reason, "Execution error");
    assert_eq!(
        err.details,
        "Failed to receive response from query. Received NULL response."
    );
    assert_eq!(err.kind, ErrorKind::QuerySyntax);
    assert_eq!(transport.request_count(), before + 1);
}

#[test]
fn test_malformed_page_is_query_syntax_error() {
    let transport = healthy_cluster(|_, _| Ok(json_response(200, &json!({"datarows": []}))));
    let mut conn = connected(transport);

    let err = conn.execute_direct(Some("SELECT 1"), "").unwrap_err();
    assert_eq!(err.kind, ErrorKind::QuerySyntax);
    assert!(err.details.starts_with("Received runtime exception: Exception obtained '"));
    assert!(conn.pop_result().is_none());
}

#[test]
fn test_successful_query_clears_previous_error() {
    let transport = healthy_cluster(|_, _| Ok(query_page(&["a"], json!([["x"]]), None)));
    let mut conn = connected(transport);

    assert!(conn.execute_direct(None, "").is_err());
    conn.execute_direct(Some("SELECT a FROM t"), "").unwrap();
    assert!(conn.error_details().is_none());
}

#[test]
fn test_consecutive_queries_do_not_mix_pages() {
    let transport = healthy_cluster(|_, body| {
        let query = body["query"].as_str().unwrap_or_default().to_string();
        Ok(query_page(&["q"], json!([[query]]), None))
    });
    let mut conn = connected(transport);

    conn.execute_direct(Some("SELECT 1"), "").unwrap();
    conn.execute_direct(Some("SELECT 2"), "").unwrap();

    let page = conn.pop_result().unwrap();
    assert_eq!(page.rows, vec![json!(["SELECT 2"])]);
    let start = Instant::now();
    assert!(conn.pop_result().is_none());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_signing_failure_is_not_a_missing_response() {
    let transport = healthy_cluster(|_, _| Ok(query_page(&["a"], json!([["x"]]), None)));
    let signer = std::sync::Arc::new(ToggleSigner::default());
    let mut conn = configured_with_signer(transport.clone(), signer.clone());
    conn.connect_db_start().unwrap();
    let before = transport.request_count();

    signer.set_failing(true);
    let err = conn.execute_direct(Some("SELECT 1"), "").unwrap_err();

    assert_eq!(err.reason, "Auth error");
    assert_eq!(err.kind, ErrorKind::InvalidAuth);
    assert!(err
        .details
        .contains("No AWS credentials found for profile 'opensearchodbc'"));
    assert!(!conn.error_message().contains("NULL response"));
    assert_eq!(conn.retrieval_outcome(), RetrievalOutcome::Failed);
    assert_eq!(transport.request_count(), before);
}
