//! Property-based tests using proptest
//!
//! These tests verify invariants that should hold for all inputs,
//! helping catch edge cases that unit tests might miss.

#![allow(clippy::unwrap_used)]

use base64::{engine::general_purpose::STANDARD, Engine};
use proptest::prelude::*;
use serde_json::Value;

use crate::config::{Authentication, ConnectionConfig};
use crate::decode::{parse_cursor_page, parse_error_response, parse_query_page};
use crate::error::ErrorKind;
use crate::request::{RequestBuilder, RequestPayload};
use crate::transport::HttpMethod;
use crate::utils::escape_newlines;

fn body_of(payload: &RequestPayload<'_>) -> Value {
    serde_json::from_str(&payload.to_body().unwrap()).unwrap()
}

proptest! {
    /// Property: connection string parsing never panics
    #[test]
    fn connection_string_never_panics(conn_str in ".*") {
        let config = ConnectionConfig::from_connection_string(&conn_str);
        let _ = config.validate();
    }

    /// Property: decoders reject or accept arbitrary bodies without panicking
    #[test]
    fn decoders_never_panic(body in ".*") {
        let _ = parse_query_page(&body);
        let _ = parse_cursor_page(&body);
        let _ = parse_error_response(&body, ErrorKind::QuerySyntax);
    }

    /// Property: escaped text is always a single line
    #[test]
    fn escape_newlines_leaves_single_line(text in ".*") {
        let escaped = escape_newlines(&text);
        prop_assert!(!escaped.contains('\n'));
        prop_assert_eq!(escaped.len(), text.len() + text.matches('\n').count());
    }

    /// Property: the basic auth header decodes back to `user:password`
    #[test]
    fn basic_auth_header_round_trips(
        username in "[A-Za-z0-9_]{1,16}",
        password in "[ -~]{1,24}"
    ) {
        let config = ConnectionConfig::from_connection_string("Host=localhost");
        let builder = RequestBuilder::new(
            &config,
            Authentication::Basic { username: username.clone(), password: password.clone() },
        );
        let request = builder
            .build("", HttpMethod::Get, None, &RequestPayload::Empty)
            .unwrap();

        let header = request.header("authorization").unwrap();
        let encoded = header.strip_prefix("Basic ").unwrap();
        let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        prop_assert_eq!(decoded, format!("{username}:{password}"));
    }

    /// Property: a numeric fetch size is sent as a JSON number
    #[test]
    fn numeric_fetch_size_is_a_number(fetch_size in 0i64..1_000_000) {
        let text = fetch_size.to_string();
        let body = body_of(&RequestPayload::Query { query: "SELECT 1", fetch_size: Some(&text) });
        prop_assert_eq!(body["fetch_size"].as_i64(), Some(fetch_size));
    }

    /// Property: the cursor body carries the token unchanged
    #[test]
    fn cursor_body_carries_token(cursor in "[A-Za-z0-9+/=:_-]{1,64}") {
        let body = body_of(&RequestPayload::Cursor(&cursor));
        prop_assert_eq!(body["cursor"].as_str(), Some(cursor.as_str()));
        prop_assert!(body.get("query").is_none());
    }
}
