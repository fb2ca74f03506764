//! Utility functions and helpers
//!
//! Locking helpers that turn mutex poisoning into errors, and string helpers used
//! when rendering error records for the ODBC layer.
use crate::error::CommError;
use std::sync::{Arc, Mutex, MutexGuard};

/// Safely lock a mutex with proper error handling
///
/// Returns a descriptive error message if the mutex is poisoned.
pub fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> Result<MutexGuard<'a, T>, CommError> {
    mutex
        .lock()
        .map_err(|e| CommError::Lock(format!("Mutex poisoned in {context}: {e}")))
}

/// Safely lock an Arc<Mutex<T>> with proper error handling
///
/// Returns a descriptive error message if the mutex is poisoned.
pub fn safe_lock_arc<'a, T>(
    arc_mutex: &'a Arc<Mutex<T>>,
    context: &str,
) -> Result<MutexGuard<'a, T>, CommError> {
    arc_mutex
        .lock()
        .map_err(|e| CommError::Lock(format!("Arc mutex poisoned in {context}: {e}")))
}

/// Replace every literal newline with the two-character sequence `\n`.
///
/// The ODBC layer hands error strings to callers that expect a single line.
pub fn escape_newlines(text: &str) -> String {
    text.replace('\n', "\\n")
}

/// Strip an `http://` or `https://` prefix, returning the scheme if one was present.
pub fn split_scheme(server: &str) -> (Option<&'static str>, &str) {
    if let Some(rest) = server.strip_prefix("https://") {
        (Some("https"), rest)
    } else if let Some(rest) = server.strip_prefix("http://") {
        (Some("http"), rest)
    } else {
        (None, server)
    }
}
