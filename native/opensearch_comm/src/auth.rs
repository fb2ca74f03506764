//! Request signing
//!
//! Requests to managed clusters are authenticated with AWS Signature Version 4,
//! signed in place as headers:
//! - `x-amz-date`, `x-amz-content-sha256` and `host` are added first,
//! - the canonical request covers every header in the signed set,
//! - `authorization` carries the credential scope and signature.
//!
//! Credentials come from a [`CredentialsProvider`]; the default reads the shared
//! credentials file under the driver's profile and falls back to the environment.
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::constants::{CREDENTIALS_PROFILE_NAME, SIGV4_SERVICE_NAME};
use crate::error::{CommError, Result};
use crate::transport::HttpRequest;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// AWS credentials used to sign a request
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Source of credentials, consulted on every signature
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Result<AwsCredentials>;
}

/// Fixed credentials
#[derive(Debug, Clone)]
pub struct StaticCredentialsProvider(pub AwsCredentials);

impl CredentialsProvider for StaticCredentialsProvider {
    fn credentials(&self) -> Result<AwsCredentials> {
        Ok(self.0.clone())
    }
}

/// Shared credentials file profile, falling back to `AWS_*` environment variables
#[derive(Debug, Clone)]
pub struct ProfileCredentialsProvider {
    profile: String,
    path: Option<PathBuf>,
}

impl Default for ProfileCredentialsProvider {
    fn default() -> Self {
        Self::new(CREDENTIALS_PROFILE_NAME)
    }
}

impl ProfileCredentialsProvider {
    pub fn new(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            path: None,
        }
    }

    /// Read from an explicit file instead of the default location
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn credentials_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.path {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var("AWS_SHARED_CREDENTIALS_FILE") {
            return Some(PathBuf::from(path));
        }
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(|home| PathBuf::from(home).join(".aws").join("credentials"))
    }

    fn from_file(&self) -> Option<AwsCredentials> {
        let path = self.credentials_path()?;
        let contents = std::fs::read_to_string(&path).ok()?;
        parse_profile(&contents, &self.profile)
    }

    fn from_env() -> Option<AwsCredentials> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        Some(AwsCredentials {
            access_key_id,
            secret_access_key,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

impl CredentialsProvider for ProfileCredentialsProvider {
    fn credentials(&self) -> Result<AwsCredentials> {
        self.from_file()
            .or_else(Self::from_env)
            .ok_or_else(|| {
                CommError::Signing(format!(
                    "No AWS credentials found for profile '{}' or in the environment",
                    self.profile
                ))
            })
    }
}

/// Pull one profile out of an INI-style credentials file
pub fn parse_profile(contents: &str, profile: &str) -> Option<AwsCredentials> {
    let mut in_profile = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;
    let mut session_token = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = section.trim() == profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "aws_access_key_id" => access_key_id = Some(value),
            "aws_secret_access_key" => secret_access_key = Some(value),
            "aws_session_token" => session_token = Some(value),
            _ => {}
        }
    }

    Some(AwsCredentials {
        access_key_id: access_key_id?,
        secret_access_key: secret_access_key?,
        session_token,
    })
}

/// Signs a request in place by mutating its headers
pub trait RequestSigner: Send + Sync {
    fn sign(&self, request: &mut HttpRequest) -> Result<()>;
}

/// AWS SigV4 header signer
pub struct SigV4Signer {
    provider: Arc<dyn CredentialsProvider>,
    service: String,
    region: String,
}

impl fmt::Debug for SigV4Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigV4Signer")
            .field("service", &self.service)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl SigV4Signer {
    pub fn new(provider: Arc<dyn CredentialsProvider>, region: &str) -> Self {
        Self {
            provider,
            service: SIGV4_SERVICE_NAME.to_string(),
            region: region.to_string(),
        }
    }

    /// Sign for a specific instant (used by tests for stable signatures)
    pub fn sign_at(&self, request: &mut HttpRequest, now: DateTime<Utc>) -> Result<()> {
        let credentials = self.provider.credentials()?;

        let date = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex_sha256(request.body.as_deref().unwrap_or_default());

        let authority = request.authority.clone();
        request.set_header("host", authority);
        request.set_header("x-amz-date", amz_date.clone());
        request.set_header("x-amz-content-sha256", payload_hash.clone());
        if let Some(token) = &credentials.session_token {
            request.set_header("x-amz-security-token", token.clone());
        }

        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("authorization"))
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
            .collect();
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
            request.method.as_str(),
            uri_encode_path(&request.path),
        );

        let credential_scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
            hex_sha256(canonical_request.as_bytes())
        );

        let signature = calculate_signature(
            &credentials.secret_access_key,
            &date,
            &self.region,
            &self.service,
            &string_to_sign,
        )?;

        request.set_header(
            "authorization",
            format!(
                "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
                credentials.access_key_id
            ),
        );
        Ok(())
    }
}

impl RequestSigner for SigV4Signer {
    fn sign(&self, request: &mut HttpRequest) -> Result<()> {
        self.sign_at(request, Utc::now())
    }
}

/// URI-encode a path (preserving slashes).
pub(crate) fn uri_encode_path(path: &str) -> String {
    use std::fmt::Write;
    let mut result = String::with_capacity(path.len() * 3);
    for b in path.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                result.push(b as char);
            }
            _ => {
                let _ = write!(result, "%{b:02X}");
            }
        }
    }
    result
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| CommError::Signing(format!("Invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn calculate_signature(
    secret_key: &str,
    date: &str,
    region: &str,
    service: &str,
    string_to_sign: &str,
) -> Result<String> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
    Ok(hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes())?))
}
