/// Connection lifecycle for the OpenSearch SQL endpoint
///
/// This module owns the [`Connection`] object and its state machine:
/// `Bad -> (validate options) -> Needed -> (establish) -> Ok`, falling back to `Bad`
/// with an error record on any failure.
///
/// Establishing a connection:
/// - lazily creates the HTTP client from the configured scheme, TLS flags and timeout
/// - resolves the SQL endpoint once, from `version.distribution` of `GET /`
/// - probes the SQL plugin with a harmless `SHOW TABLES LIKE %`
///
/// Query execution lives in [`crate::query`], metadata lookups in [`crate::metadata`].
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::auth::RequestSigner;
use crate::config::{Authentication, ConnectionConfig};
use crate::constants::*;
use crate::cursor::RetrievalState;
use crate::decode;
use crate::error::{CommError, ErrorDetails, ErrorKind, ErrorState, Result};
use crate::models::ConnStatus;
use crate::queue::ResultQueue;
use crate::request::{RequestBuilder, RequestPayload};
use crate::runtime::RuntimeLease;
use crate::transport::{HttpMethod, HttpTransport, ReqwestTransportFactory, TransportFactory};

const ESTABLISH_FAILED: &str = "Failed to establish connection to DB.";
const PLUGIN_DISABLED: &str = "SQL plugin is disabled, please enable the plugin to use this driver.";
const PLUGIN_UNAVAILABLE: &str =
    "SQL plugin is not available, please install the SQL plugin to use this driver.";

/// One logical connection to an OpenSearch cluster
pub struct Connection {
    pub(crate) options: ConnectionConfig,
    valid_options: bool,
    authentication: Option<Authentication>,
    signer: Option<Arc<dyn RequestSigner>>,
    pub(crate) requests: Option<RequestBuilder>,
    pub(crate) status: ConnStatus,
    factory: Arc<dyn TransportFactory>,
    pub(crate) client: Option<Arc<dyn HttpTransport>>,
    pub(crate) sql_endpoint: Option<String>,
    pub(crate) errors: ErrorState,
    message_to_user: String,
    pub(crate) queue: Arc<ResultQueue>,
    pub(crate) retrieval: Arc<RetrievalState>,
    pub(crate) pagination: Option<JoinHandle<()>>,
    client_encoding: String,
    pub(crate) runtime: RuntimeLease,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("options", &self.options)
            .field("status", &self.status)
            .field("sql_endpoint", &self.sql_endpoint)
            .field("client_encoding", &self.client_encoding)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// New, unconfigured connection using the reqwest transport
    pub fn new() -> Result<Self> {
        Self::with_transport_factory(Arc::new(ReqwestTransportFactory))
    }

    /// New, unconfigured connection with a custom transport
    pub fn with_transport_factory(factory: Arc<dyn TransportFactory>) -> Result<Self> {
        let runtime = RuntimeLease::acquire()?;
        let client_encoding = SUPPORTED_CLIENT_ENCODINGS
            .first()
            .copied()
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            options: ConnectionConfig::default(),
            valid_options: false,
            authentication: None,
            signer: None,
            requests: None,
            status: ConnStatus::Bad,
            factory,
            client: None,
            sql_endpoint: None,
            errors: ErrorState::new(),
            message_to_user: String::new(),
            queue: Arc::new(ResultQueue::new(RESULT_QUEUE_CAPACITY)),
            retrieval: Arc::new(RetrievalState::new()),
            pagination: None,
            client_encoding,
            runtime,
        })
    }

    /// Sign SigV4 requests with this signer instead of the credentials profile
    pub fn with_request_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Store the options and validate them. No network I/O.
    pub fn connection_options(
        &mut self,
        options: ConnectionConfig,
    ) -> std::result::Result<(), ErrorDetails> {
        // The client and endpoint belong to the previous options
        if self.options.base_url() != options.base_url() {
            self.sql_endpoint = None;
        }
        self.options = options;
        self.client = None;
        self.requests = None;
        self.status = ConnStatus::Bad;

        match self.options.validate() {
            Ok(authentication) => {
                self.authentication = Some(authentication);
                self.valid_options = true;
                Ok(())
            }
            Err(details) => {
                self.authentication = None;
                self.valid_options = false;
                self.errors.set(details.clone());
                Err(details)
            }
        }
    }

    pub fn options(&self) -> &ConnectionConfig {
        &self.options
    }

    pub fn has_valid_options(&self) -> bool {
        self.valid_options
    }

    /// Run the handshake. On failure the connection is dropped and left `Bad`.
    pub fn connect_db_start(&mut self) -> std::result::Result<(), ErrorDetails> {
        tracing::info!("Starting DB connection.");
        self.fence_pagination();
        self.status = ConnStatus::Bad;
        self.message_to_user.clear();

        if !self.valid_options {
            let details = self.errors.set_local(
                "Invalid connection options",
                "Invalid connection options, unable to connect to DB.",
                ErrorKind::CommLinkFailure,
            );
            self.drop_db_connection();
            return Err(details);
        }

        self.status = ConnStatus::Needed;
        if !self.establish() {
            let message = if self.message_to_user.is_empty() {
                ESTABLISH_FAILED.to_string()
            } else {
                self.message_to_user.clone()
            };
            let details =
                self.errors
                    .set_local("Connection error", message, ErrorKind::CommLinkFailure);
            self.drop_db_connection();
            return Err(details);
        }

        tracing::info!(
            server = %self.options.base_url(),
            endpoint = self.sql_endpoint.as_deref().unwrap_or_default(),
            "Connection established."
        );
        self.status = ConnStatus::Ok;
        Ok(())
    }

    fn establish(&mut self) -> bool {
        tracing::debug!("Attempting to establish DB connection.");
        if (self.client.is_none() || self.requests.is_none())
            && self.initialize_connection().is_err()
        {
            return false;
        }

        if self.sql_endpoint.is_none() {
            self.set_sql_endpoint();
        }

        self.check_sql_plugin_availability()
    }

    /// Create the HTTP client and request builder for the current options
    pub fn initialize_connection(&mut self) -> std::result::Result<(), ErrorDetails> {
        let authentication = self
            .authentication
            .clone()
            .unwrap_or(Authentication::None);
        let mut requests = RequestBuilder::new(&self.options, authentication);
        if let Some(signer) = &self.signer {
            requests = requests.with_signer(signer.clone());
        }

        match self.factory.create(&self.options, &self.runtime) {
            Ok(client) => {
                self.client = Some(client);
                self.requests = Some(requests);
                Ok(())
            }
            Err(e) => Err(self.errors.set_local(
                "Connection error",
                format!("Failed to initialize HTTP client: {e}"),
                ErrorKind::CommLinkFailure,
            )),
        }
    }

    /// Pick the SQL endpoint from the server's distribution
    pub fn set_sql_endpoint(&mut self) {
        let distribution = self.server_distribution();
        let endpoint = if distribution == OPENSEARCH_DISTRIBUTION {
            OPENSEARCH_SQL_ENDPOINT
        } else {
            OPENDISTRO_SQL_ENDPOINT
        };
        tracing::debug!(distribution = %distribution, endpoint, "Resolved SQL endpoint.");
        self.sql_endpoint = Some(endpoint.to_string());
    }

    /// Probe the SQL plugin.
    ///
    /// A 200 means available. An error body of type `SQLFeatureDisabledException` or a
    /// body that is not an error document fails the probe; any other server error is
    /// recorded and the plugin is treated as present.
    pub fn check_sql_plugin_availability(&mut self) -> bool {
        tracing::debug!("Checking for SQL plugin status.");
        let (Some(client), Some(requests)) = (self.client.clone(), self.requests.clone()) else {
            return false;
        };

        let payload = RequestPayload::Query {
            query: PLUGIN_PROBE_QUERY,
            fetch_size: None,
        };
        let response = requests
            .build(
                self.sql_endpoint(),
                HttpMethod::Post,
                Some(CONTENT_TYPE_JSON),
                &payload,
            )
            .and_then(|request| client.send(request));

        let response = match response {
            Ok(response) => response,
            Err(e @ (CommError::Signing(_) | CommError::Lock(_))) => {
                let details = ErrorDetails::from(e);
                self.message_to_user = details.details.clone();
                self.errors.set(details);
                return false;
            }
            Err(e) => {
                self.errors.set_local(
                    "Execution error",
                    format!("Failed to receive response. Received NULL response. {e}"),
                    ErrorKind::QuerySyntax,
                );
                return false;
            }
        };

        if response.is_ok() {
            return true;
        }

        let body = response.body_text();
        match decode::parse_error_response(&body, ErrorKind::CommLinkFailure) {
            Ok(details) if details.source_type == SQL_FEATURE_DISABLED => {
                self.message_to_user = PLUGIN_DISABLED.to_string();
                self.errors.set_local(
                    "Connection error",
                    format!(
                        "The SQL plugin is disabled. The SQL plugin must be enabled in order to \
                         use this driver. Response body: '{body}'"
                    ),
                    ErrorKind::CommLinkFailure,
                );
                false
            }
            Ok(details) => {
                tracing::warn!(
                    "SQL plugin probe returned an error. {}",
                    response.failure_description()
                );
                self.errors.set(details);
                true
            }
            Err(e) => {
                self.message_to_user = PLUGIN_UNAVAILABLE.to_string();
                self.errors.set_local(
                    "Server error",
                    format!(
                        "Unexpected exception thrown from the server, the SQL plugin is not \
                         installed or in unhealthy status. {e}"
                    ),
                    ErrorKind::CommLinkFailure,
                );
                false
            }
        }
    }

    /// Release the client, stop any result retrieval and go `Bad`. Never blocks.
    pub fn drop_db_connection(&mut self) {
        tracing::info!("Dropping DB connection.");
        self.client = None;
        self.status = ConnStatus::Bad;
        self.stop_result_retrieval();

        // Detach: the task sees the stop signal on its own and exits.
        self.pagination = None;
    }

    pub fn connection_status(&self) -> ConnStatus {
        self.status
    }

    /// Current error record rendered for the ODBC layer
    pub fn error_message(&self) -> String {
        self.errors.message()
    }

    pub fn error_details(&self) -> Option<ErrorDetails> {
        self.errors.get()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.errors.kind()
    }

    /// Resolved SQL endpoint, or the legacy one while unresolved
    pub fn sql_endpoint(&self) -> &str {
        self.sql_endpoint
            .as_deref()
            .unwrap_or(OPENDISTRO_SQL_ENDPOINT)
    }

    pub fn client_encoding(&self) -> &str {
        &self.client_encoding
    }

    /// Switch the client encoding. Only supported encodings are accepted.
    pub fn set_client_encoding(&mut self, encoding: &str) -> bool {
        if SUPPORTED_CLIENT_ENCODINGS.contains(&encoding) {
            self.client_encoding = encoding.to_string();
            return true;
        }
        tracing::error!("Failed to find encoding {encoding}");
        false
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.stop_result_retrieval();
        self.pagination = None;
    }
}
