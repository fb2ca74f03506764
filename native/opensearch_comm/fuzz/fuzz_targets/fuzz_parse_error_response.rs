#![no_main]
//! Structured error body fuzzing
//!
//! Builds error documents from arbitrary parts so the decoder sees mostly well-formed
//! JSON with hostile field contents, then checks the rendered message stays single-line.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use opensearch_comm::decode::parse_error_response;
use opensearch_comm::ErrorKind;

#[derive(Debug, Arbitrary)]
struct ErrorInput<'a> {
    reason: &'a str,
    details: &'a str,
    error_type: &'a str,
    status: i64,
    drop_details: bool,
}

fuzz_target!(|input: ErrorInput| {
    let mut error = serde_json::json!({
        "reason": input.reason,
        "details": input.details,
        "type": input.error_type,
    });
    if input.drop_details {
        if let Some(obj) = error.as_object_mut() {
            obj.remove("details");
        }
    }
    let body = serde_json::json!({"error": error, "status": input.status}).to_string();

    match parse_error_response(&body, ErrorKind::QuerySyntax) {
        Ok(details) => {
            assert!(!input.drop_details);
            assert_eq!(details.source_type, input.error_type);
            assert!(!details.user_message().contains('\n'));
        }
        Err(_) => assert!(input.drop_details),
    }
});
