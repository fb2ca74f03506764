//! HTTP request construction
//!
//! [`RequestBuilder`] turns an endpoint, a method and a [`RequestPayload`] into a
//! fully formed [`HttpRequest`] against the configured server, then applies the
//! connection's authentication:
//! - basic: `Authorization: Basic base64(username:password)`
//! - SigV4: signed in place by a [`RequestSigner`]
//! - none: no authorization header
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::auth::{ProfileCredentialsProvider, RequestSigner, SigV4Signer};
use crate::config::{Authentication, ConnectionConfig};
use crate::constants::FETCH_SIZE_UNSET;
use crate::error::Result;
use crate::transport::{HttpMethod, HttpRequest};

/// Body of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPayload<'a> {
    /// No body (metadata GETs)
    Empty,
    /// `{"query": .., "fetch_size": ..}`
    Query {
        query: &'a str,
        fetch_size: Option<&'a str>,
    },
    /// `{"cursor": ..}`
    Cursor(&'a str),
}

impl<'a> RequestPayload<'a> {
    /// Pick the payload from loose parts: a non-empty query wins, then a
    /// non-empty cursor, else no body.
    pub fn from_parts(query: &'a str, fetch_size: &'a str, cursor: &'a str) -> Self {
        if !query.is_empty() {
            RequestPayload::Query {
                query,
                fetch_size: Some(fetch_size),
            }
        } else if !cursor.is_empty() {
            RequestPayload::Cursor(cursor)
        } else {
            RequestPayload::Empty
        }
    }

    /// Serialized JSON body, if any
    pub fn to_body(&self) -> Option<String> {
        let mut body = Map::new();
        match *self {
            RequestPayload::Empty => return None,
            RequestPayload::Query { query, fetch_size } => {
                body.insert("query".to_string(), Value::String(query.to_string()));
                if let Some(fetch_size) = fetch_size
                    .map(str::trim)
                    .filter(|f| !f.is_empty() && *f != FETCH_SIZE_UNSET)
                {
                    let value = match fetch_size.parse::<i64>() {
                        Ok(n) => Value::from(n),
                        Err(_) => Value::String(fetch_size.to_string()),
                    };
                    body.insert("fetch_size".to_string(), value);
                }
            }
            RequestPayload::Cursor(cursor) => {
                body.insert("cursor".to_string(), Value::String(cursor.to_string()));
            }
        }
        Some(Value::Object(body).to_string())
    }
}

/// Builds authenticated requests for one connection
#[derive(Clone)]
pub struct RequestBuilder {
    scheme: String,
    authority: String,
    authentication: Authentication,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("scheme", &self.scheme)
            .field("authority", &self.authority)
            .field("authentication", &self.authentication)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    /// Builder for validated options. SigV4 uses the driver's credentials profile.
    pub fn new(config: &ConnectionConfig, authentication: Authentication) -> Self {
        let signer: Option<Arc<dyn RequestSigner>> = match &authentication {
            Authentication::AwsSigV4 { region } => Some(Arc::new(SigV4Signer::new(
                Arc::new(ProfileCredentialsProvider::default()),
                region,
            ))),
            _ => None,
        };

        Self {
            scheme: config.scheme().to_string(),
            authority: config.authority(),
            authentication,
            signer,
        }
    }

    /// Replace the signer used for SigV4 connections
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Build a request for `endpoint` (empty means the root document)
    pub fn build(
        &self,
        endpoint: &str,
        method: HttpMethod,
        content_type: Option<&str>,
        payload: &RequestPayload<'_>,
    ) -> Result<HttpRequest> {
        let path = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{endpoint}")
        };

        let mut request = HttpRequest {
            method,
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path,
            headers: Vec::new(),
            body: None,
        };

        if let Some(content_type) = content_type.filter(|c| !c.is_empty()) {
            request.set_header("Content-Type", content_type);
        }

        if let Some(body) = payload.to_body() {
            request.body = Some(Bytes::from(body));
        }

        match &self.authentication {
            Authentication::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                request.set_header("Authorization", format!("Basic {encoded}"));
            }
            Authentication::AwsSigV4 { .. } => {
                if let Some(signer) = &self.signer {
                    signer.sign(&mut request)?;
                }
            }
            Authentication::None => {}
        }

        Ok(request)
    }
}
