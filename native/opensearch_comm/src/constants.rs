//! Global constants and registries for the OpenSearch communication layer
//!
//! This module holds all static configuration (endpoint paths, timeouts, column
//! descriptor constants, user-facing message fragments) and the global connection
//! registry used by the handle-based facade in [`crate::registry`].
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::registry::RegisteredConnection;

/// Content type sent with every body-bearing request.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// SQL endpoint exposed by OpenSearch distributions.
pub const OPENSEARCH_SQL_ENDPOINT: &str = "/_plugins/_sql";

/// SQL endpoint exposed by legacy Open Distro clusters.
pub const OPENDISTRO_SQL_ENDPOINT: &str = "/_opendistro/_sql";

/// Suffix appended to the SQL endpoint to release a server-side cursor.
pub const CURSOR_CLOSE_SUFFIX: &str = "/close";

/// Value of `version.distribution` that selects [`OPENSEARCH_SQL_ENDPOINT`].
pub const OPENSEARCH_DISTRIBUTION: &str = "opensearch";

/// Harmless metadata query used to probe SQL plugin availability.
pub const PLUGIN_PROBE_QUERY: &str = "SHOW TABLES LIKE %";

/// Remote error type reported when the SQL plugin is installed but disabled.
pub const SQL_FEATURE_DISABLED: &str = "SQLFeatureDisabledException";

/// Prefix of every error string handed to the ODBC layer.
pub const ERROR_MSG_PREFIX: &str = "[OpenSearch][SQL ODBC Driver][SQL Plugin] ";

/// Message returned when no error record is set.
pub const NO_ERROR_DETAILS: &str = "No error details available; check the driver logs.";

/// Source type stored on locally constructed error records.
pub const LOCAL_SOURCE_TYPE: &str = "Dummy type";

/// Fetch size value meaning "let the server decide".
pub const FETCH_SIZE_UNSET: &str = "-1";

/// Default response timeout (in seconds) when none or an unparsable value is configured.
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 10;

/// Capacity of the result queue between the pagination task and the row-fetch caller.
pub const RESULT_QUEUE_CAPACITY: usize = 2;

/// Timeout of a single blocking push/pop attempt on the result queue.
pub const QUEUE_TIMEOUT: Duration = Duration::from_millis(20);

/// Extra time granted to an outstanding pagination task on top of the response timeout
/// before it is abandoned.
pub const PAGINATION_JOIN_GRACE: Duration = Duration::from_secs(1);

/// Every column is described as a keyword (varchar) column.
pub const KEYWORD_TYPE_OID: u32 = 1043;
pub const KEYWORD_TYPE_SIZE: i32 = 255;
pub const KEYWORD_DISPLAY_SIZE: i32 = 255;

/// Client encodings the driver can hand rows back in.
pub const SUPPORTED_CLIENT_ENCODINGS: &[&str] = &["UTF8"];

/// Service name used in the SigV4 credential scope.
pub const SIGV4_SERVICE_NAME: &str = "es";

/// Shared-credentials profile read by the SigV4 credentials provider.
pub const CREDENTIALS_PROFILE_NAME: &str = "opensearchodbc";

// Global registry for open connections - Maps connection ID to the connection and its cancel handle
lazy_static! {
    pub static ref CONNECTION_REGISTRY: Mutex<HashMap<String, RegisteredConnection>> =
        Mutex::new(HashMap::new());
}
