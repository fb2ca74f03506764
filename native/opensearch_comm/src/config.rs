//! Connection configuration and validation
//!
//! Options are supplied once at connect time and stay read-only until the next
//! reconnect. Validation happens before any network I/O and resolves the configured
//! authentication type into an [`Authentication`] the request builder can use.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants::DEFAULT_RESPONSE_TIMEOUT_SECS;
use crate::error::{ErrorDetails, ErrorKind};
use crate::utils::split_scheme;

pub const AUTHTYPE_NONE: &str = "NONE";
pub const AUTHTYPE_BASIC: &str = "BASIC";
pub const AUTHTYPE_AWS_SIGV4: &str = "AWS_SIGV4";

/// Authentication type named in the options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    None,
    Basic,
    AwsSigV4,
}

impl AuthType {
    /// Resolve a configured name (case-insensitive). Empty means `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case(AUTHTYPE_NONE) {
            Some(AuthType::None)
        } else if name.eq_ignore_ascii_case(AUTHTYPE_BASIC) {
            Some(AuthType::Basic)
        } else if name.eq_ignore_ascii_case(AUTHTYPE_AWS_SIGV4) {
            Some(AuthType::AwsSigV4)
        } else {
            None
        }
    }
}

/// Validated authentication, ready to be applied to requests
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    None,
    Basic { username: String, password: String },
    AwsSigV4 { region: String },
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authentication::None => write!(f, "None"),
            Authentication::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Authentication::AwsSigV4 { region } => {
                f.debug_struct("AwsSigV4").field("region", region).finish()
            }
        }
    }
}

/// Authentication options as supplied by the caller
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthOptions {
    /// `NONE`, `BASIC` or `AWS_SIGV4`
    pub auth_type: String,
    pub username: String,
    pub password: String,
    /// Region used in the SigV4 credential scope
    pub region: String,
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("auth_type", &self.auth_type)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Connection options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub auth: AuthOptions,
    /// Server host, optionally prefixed with `http://` or `https://`
    pub server: String,
    pub port: Option<u16>,
    pub use_ssl: bool,
    pub verify_server: bool,
    /// Response timeout in seconds, kept as text the way DSNs carry it
    pub response_timeout: Option<String>,
}

impl ConnectionConfig {
    /// Parse an ODBC-style `Key=Value;Key=Value` connection string.
    ///
    /// Keys are case-insensitive. Unknown keys are ignored.
    pub fn from_connection_string(conn_str: &str) -> Self {
        let mut config = ConnectionConfig {
            verify_server: true,
            ..Default::default()
        };

        for pair in conn_str.split(';') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "host" | "server" => config.server = value.to_string(),
                "port" => match value.parse::<u16>() {
                    Ok(port) => config.port = Some(port),
                    Err(_) if value.is_empty() => config.port = None,
                    Err(e) => tracing::warn!("Ignoring invalid port '{value}': {e}"),
                },
                "auth" => config.auth.auth_type = value.to_string(),
                "user" | "uid" => config.auth.username = value.to_string(),
                "password" | "pwd" => config.auth.password = value.to_string(),
                "region" => config.auth.region = value.to_string(),
                "usessl" => config.use_ssl = parse_flag(value),
                "hostnameverification" => config.verify_server = parse_flag(value),
                "responsetimeout" => config.response_timeout = Some(value.to_string()),
                _ => {}
            }
        }

        config
    }

    /// Check the options are self-consistent.
    ///
    /// Rules, in order:
    /// 1. A named type other than none/signing must be basic, and basic needs both
    ///    a username and a password.
    /// 2. With none/signing the server host must be present.
    pub fn validate(&self) -> Result<Authentication, ErrorDetails> {
        tracing::debug!("Verifying connection options.");

        let auth_type = AuthType::parse(&self.auth.auth_type);
        let authentication = match auth_type {
            Some(AuthType::Basic) => {
                if self.auth.username.is_empty() || self.auth.password.is_empty() {
                    return Err(ErrorDetails::local(
                        "Auth error",
                        format!("{AUTHTYPE_BASIC} authentication requires a username and password."),
                        ErrorKind::InvalidAuth,
                    ));
                }
                Authentication::Basic {
                    username: self.auth.username.clone(),
                    password: self.auth.password.clone(),
                }
            }
            Some(AuthType::None) => Authentication::None,
            Some(AuthType::AwsSigV4) => Authentication::AwsSigV4 {
                region: self.auth.region.clone(),
            },
            None => {
                return Err(ErrorDetails::local(
                    "Auth error",
                    format!("Unknown authentication type: '{}'", self.auth.auth_type),
                    ErrorKind::InvalidAuth,
                ));
            }
        };

        if !matches!(authentication, Authentication::Basic { .. }) && self.host().is_empty() {
            return Err(ErrorDetails::local(
                "Connection error",
                "Host connection option was not specified.",
                ErrorKind::UnableToEstablish,
            ));
        }

        tracing::debug!("Required connection option are valid.");
        Ok(authentication)
    }

    /// Scheme derived from an explicit prefix on the server, else from `use_ssl`
    pub fn scheme(&self) -> &'static str {
        match split_scheme(self.server.trim()) {
            (Some(scheme), _) => scheme,
            (None, _) if self.use_ssl => "https",
            (None, _) => "http",
        }
    }

    /// Host without any scheme prefix or trailing slash
    pub fn host(&self) -> &str {
        split_scheme(self.server.trim()).1.trim_end_matches('/')
    }

    /// `host[:port]`
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.host()),
            None => self.host().to_string(),
        }
    }

    /// `scheme://host[:port]`
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.authority())
    }

    /// Resolved response timeout; missing or unparsable values fall back to the default
    pub fn response_timeout(&self) -> Duration {
        let secs = self
            .response_timeout
            .as_deref()
            .map(str::trim)
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RESPONSE_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
