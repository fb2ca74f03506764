//! HTTP transport abstraction
//!
//! The communication layer only needs "send method + url + headers + optional body,
//! get back status + body". [`HttpTransport`] is that seam; [`ReqwestTransport`] is the
//! production implementation and tests plug in a scripted one.
//!
//! A transport that cannot produce a response at all returns [`CommError::Transport`].
//! Callers treat that as a failure of the current operation and never retry it.
use bytes::Bytes;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::error::{CommError, Result};
use crate::runtime::RuntimeLease;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// Fully formed request, ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub scheme: String,
    /// `host[:port]`
    pub authority: String,
    /// Absolute path, always starting with `/`
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority, self.path)
    }

    /// First header with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing value with the same name
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Body decoded as UTF-8, for logging and tests
    pub fn body_str(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| std::str::from_utf8(b).ok())
    }
}

/// Response as seen by the communication layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    /// Failure reported by the client after a status line was received
    pub client_error: Option<String>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
            client_error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body as text; invalid UTF-8 is replaced rather than rejected
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Describe a non-200 response: status, client error and body
    pub fn failure_description(&self) -> String {
        let mut message = format!(
            "Http response code was not OK. Code received: {}.",
            self.status
        );
        if let Some(client_error) = &self.client_error {
            let _ = write!(message, " Client error: '{client_error}'.");
        }
        if !self.body.is_empty() {
            let _ = write!(message, " Response error: '{}'.", self.body_text());
        }
        message
    }
}

/// Sends requests and hands back responses
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Creates the transport for a connection
pub trait TransportFactory: Send + Sync {
    fn create(
        &self,
        config: &ConnectionConfig,
        runtime: &RuntimeLease,
    ) -> Result<Arc<dyn HttpTransport>>;
}

/// reqwest-backed transport driven through the shared runtime
pub struct ReqwestTransport {
    client: reqwest::Client,
    runtime: RuntimeLease,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Build a client honouring the configured timeout and certificate verification
    pub fn new(config: &ConnectionConfig, runtime: RuntimeLease) -> Result<Self> {
        let timeout = config.response_timeout();
        let handle = runtime.handle()?;
        let _enter = handle.enter();

        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .danger_accept_invalid_certs(!config.verify_server)
            .build()
            .map_err(|e| CommError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, runtime })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url();
        let method_name = request.method.as_str();
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        self.runtime.block_on(read_response(builder, method_name, url))?
    }
}

async fn read_response(
    builder: reqwest::RequestBuilder,
    method_name: &str,
    url: String,
) -> Result<HttpResponse> {
    let response = builder
        .send()
        .await
        .map_err(|e| CommError::Transport(format!("{method_name} {url} failed: {e}")))?;

    let status = response.status().as_u16();
    match response.bytes().await {
        Ok(body) => Ok(HttpResponse {
            status,
            body,
            client_error: None,
        }),
        Err(e) => Ok(HttpResponse {
            status,
            body: Bytes::new(),
            client_error: Some(e.to_string()),
        }),
    }
}

/// Default factory producing [`ReqwestTransport`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestTransportFactory;

impl TransportFactory for ReqwestTransportFactory {
    fn create(
        &self,
        config: &ConnectionConfig,
        runtime: &RuntimeLease,
    ) -> Result<Arc<dyn HttpTransport>> {
        let transport = ReqwestTransport::new(config, runtime.try_clone()?)?;
        Ok(Arc::new(transport))
    }
}
