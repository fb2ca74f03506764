//! SigV4 signing and credentials profile tests

#![allow(clippy::unwrap_used)]

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

use crate::auth::{
    parse_profile, uri_encode_path, AwsCredentials, RequestSigner, SigV4Signer,
    StaticCredentialsProvider,
};
use crate::transport::{HttpMethod, HttpRequest};

fn signer() -> SigV4Signer {
    SigV4Signer::new(
        Arc::new(StaticCredentialsProvider(AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: None,
        })),
        "us-east-1",
    )
}

fn request() -> HttpRequest {
    HttpRequest {
        method: HttpMethod::Post,
        scheme: "https".to_string(),
        authority: "search-domain.us-east-1.es.amazonaws.com".to_string(),
        path: "/_plugins/_sql".to_string(),
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: Some(Bytes::from_static(b"{\"query\":\"SELECT 1\"}")),
    }
}

#[test]
fn test_sign_adds_headers() {
    let mut req = request();
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    signer().sign_at(&mut req, now).unwrap();

    assert_eq!(req.header("x-amz-date"), Some("20240115T120000Z"));
    assert_eq!(
        req.header("host"),
        Some("search-domain.us-east-1.es.amazonaws.com")
    );
    let auth = req.header("authorization").unwrap();
    assert!(auth.starts_with(
        "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240115/us-east-1/es/aws4_request"
    ));
    assert!(auth.contains("SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date"));
    assert!(auth.contains("Signature="));
}

#[test]
fn test_signature_is_deterministic() {
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    let mut a = request();
    let mut b = request();
    signer().sign_at(&mut a, now).unwrap();
    signer().sign_at(&mut b, now).unwrap();
    assert_eq!(a.header("authorization"), b.header("authorization"));

    let mut c = request();
    c.body = Some(Bytes::from_static(b"{\"query\":\"SELECT 2\"}"));
    signer().sign_at(&mut c, now).unwrap();
    assert_ne!(a.header("authorization"), c.header("authorization"));
}

#[test]
fn test_resigning_replaces_authorization() {
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    let mut req = request();
    signer().sign_at(&mut req, now).unwrap();
    signer().sign_at(&mut req, now).unwrap();
    let count = req
        .headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("authorization"))
        .count();
    assert_eq!(count, 1);
}

#[test]
fn test_session_token_is_signed() {
    let signer = SigV4Signer::new(
        Arc::new(StaticCredentialsProvider(AwsCredentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: Some("token".to_string()),
        })),
        "eu-west-1",
    );
    let mut req = request();
    signer.sign(&mut req).unwrap();
    assert_eq!(req.header("x-amz-security-token"), Some("token"));
    assert!(req
        .header("authorization")
        .unwrap()
        .contains("x-amz-security-token"));
}

#[test]
fn test_parse_profile() {
    let file = "\
[default]
aws_access_key_id = DEFAULTKEY
aws_secret_access_key = defaultsecret

[opensearchodbc]
aws_access_key_id = ODBCKEY
aws_secret_access_key = odbcsecret
aws_session_token = odbctoken
";
    let creds = parse_profile(file, "opensearchodbc").unwrap();
    assert_eq!(creds.access_key_id, "ODBCKEY");
    assert_eq!(creds.secret_access_key, "odbcsecret");
    assert_eq!(creds.session_token.as_deref(), Some("odbctoken"));

    assert!(parse_profile(file, "missing").is_none());
}

#[test]
fn test_uri_encode_path() {
    assert_eq!(uri_encode_path("/_plugins/_sql"), "/_plugins/_sql");
    assert_eq!(uri_encode_path("/a b"), "/a%20b");
}
