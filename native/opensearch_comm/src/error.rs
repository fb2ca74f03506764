//! Error types and the last-error slot
//!
//! Two layers of errors live here:
//! - [`CommError`]: internal failures (transport, decoding, signing, locking) that have not
//!   yet been turned into something a caller can act on.
//! - [`ErrorDetails`]: the error record handed to the ODBC layer. A connection keeps at most
//!   one current record in its [`ErrorState`]; setting a new one discards the old.
use std::sync::{Arc, Mutex, PoisonError};

use crate::constants::{ERROR_MSG_PREFIX, LOCAL_SOURCE_TYPE, NO_ERROR_DETAILS};
use crate::utils::escape_newlines;

/// Result type alias using CommError
pub type Result<T> = std::result::Result<T, CommError>;

/// Internal failure raised below the error-record layer
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    /// The transport produced no response at all
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response body did not match the expected document shape
    #[error("Exception obtained '{message}' when parsing json string '{body}'.")]
    Parse { message: String, body: String },

    /// The request could not be signed
    #[error("Signing error: {0}")]
    Signing(String),

    /// A mutex was poisoned
    #[error("Lock error: {0}")]
    Lock(String),

    /// The async runtime could not be created
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Invalid configuration detected while building the transport
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CommError {
    /// Build a decode error that keeps the offending body for diagnostics
    pub fn parse(err: &serde_json::Error, body: &str) -> Self {
        CommError::Parse {
            message: err.to_string(),
            body: body.to_string(),
        }
    }
}

/// Enumerated error kind for programmatic dispatch by the ODBC layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Authentication options are missing or unknown
    InvalidAuth,
    /// Required connection options are missing
    UnableToEstablish,
    /// The server could not be reached or refused the connection
    CommLinkFailure,
    /// A required argument was absent
    InvalidNullPtr,
    /// Query failed, or a response body was malformed or unexpected
    QuerySyntax,
}

impl ErrorKind {
    /// Stable label used in logs
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAuth => "INVALID_AUTH",
            ErrorKind::UnableToEstablish => "UNABLE_TO_ESTABLISH",
            ErrorKind::CommLinkFailure => "COMM_LINK_FAILURE",
            ErrorKind::InvalidNullPtr => "INVALID_NULL_PTR",
            ErrorKind::QuerySyntax => "QUERY_SYNTAX",
        }
    }
}

/// The error record: what went wrong, where it came from and how to dispatch on it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {details}")]
pub struct ErrorDetails {
    /// Short category label, e.g. "Connection error"
    pub reason: String,
    /// Free-text diagnostic
    pub details: String,
    /// Remote `error.type`, or a sentinel for locally constructed records
    pub source_type: String,
    /// Kind for programmatic dispatch
    pub kind: ErrorKind,
}

impl ErrorDetails {
    /// Construct a record for an error detected by the driver itself
    pub fn local(reason: impl Into<String>, details: impl Into<String>, kind: ErrorKind) -> Self {
        ErrorDetails {
            reason: reason.into(),
            details: details.into(),
            source_type: LOCAL_SOURCE_TYPE.to_string(),
            kind,
        }
    }

    /// Render the single-line string handed to the ODBC layer
    pub fn user_message(&self) -> String {
        format!(
            "{ERROR_MSG_PREFIX}{}: {}",
            self.reason,
            escape_newlines(&self.details)
        )
    }
}

impl From<CommError> for ErrorDetails {
    fn from(err: CommError) -> Self {
        let (reason, kind) = match &err {
            CommError::Parse { .. } => ("Execution error", ErrorKind::QuerySyntax),
            CommError::Signing(_) => ("Auth error", ErrorKind::InvalidAuth),
            CommError::Transport(_)
            | CommError::Lock(_)
            | CommError::Runtime(_)
            | CommError::Config(_) => ("Connection error", ErrorKind::CommLinkFailure),
        };
        ErrorDetails::local(reason, err.to_string(), kind)
    }
}

/// Shared slot holding the current error record
///
/// Cloning shares the slot, so the background pagination task records into the
/// same place the caller reads from.
#[derive(Debug, Clone, Default)]
pub struct ErrorState {
    current: Arc<Mutex<Option<ErrorDetails>>>,
}

impl ErrorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current record and log it
    pub fn set(&self, details: ErrorDetails) {
        tracing::error!(
            kind = details.kind.code(),
            reason = %details.reason,
            "{}",
            details.details
        );
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(details);
    }

    /// Convenience for records constructed locally
    pub fn set_local(&self, reason: &str, details: impl Into<String>, kind: ErrorKind) -> ErrorDetails {
        let record = ErrorDetails::local(reason, details, kind);
        self.set(record.clone());
        record
    }

    pub fn clear(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn get(&self) -> Option<ErrorDetails> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.get().map(|d| d.kind)
    }

    /// Translate the current record into the user-facing string
    pub fn message(&self) -> String {
        match self.get() {
            Some(details) => details.user_message(),
            None => format!("{ERROR_MSG_PREFIX}{NO_ERROR_DETAILS}"),
        }
    }
}
