/// Cluster and table metadata lookups
///
/// Column discovery runs `SELECT * FROM <table> LIMIT 0` and reads the schema section
/// only. Server version, distribution and cluster name all come from the root document
/// (`GET /`). These lookups degrade to empty results; the error record says why.
use crate::connection::Connection;
use crate::constants::CONTENT_TYPE_JSON;
use crate::decode::{self, RootResponse};
use crate::error::{CommError, ErrorKind};
use crate::request::RequestPayload;
use crate::transport::HttpMethod;

impl Connection {
    /// Column names of `table_name`, in schema order.
    ///
    /// An empty name yields an empty list and an `InvalidNullPtr` record without
    /// issuing a request.
    pub fn get_columns_for_table(&mut self, table_name: &str) -> Vec<String> {
        if table_name.is_empty() {
            self.errors
                .set_local("Execution error", "Query is NULL", ErrorKind::InvalidNullPtr);
            return Vec::new();
        }

        let (Some(client), Some(requests)) = (self.client.clone(), self.requests.clone()) else {
            self.errors.set_local(
                "Execution error",
                "Unable to connect. Please try connecting again.",
                ErrorKind::CommLinkFailure,
            );
            return Vec::new();
        };

        let query = format!("SELECT * FROM {table_name} LIMIT 0");
        tracing::debug!("Attempting to execute a query \"{query}\"");

        let payload = RequestPayload::Query {
            query: &query,
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
            Err(CommError::Transport(e)) => {
                tracing::debug!(error = %e, "Column query produced no response");
                self.errors.set_local(
                    "HTTP client error",
                    "Failed to receive response from query. Received NULL response.",
                    ErrorKind::CommLinkFailure,
                );
                return Vec::new();
            }
            Err(e) => {
                self.errors.set(e.into());
                return Vec::new();
            }
        };

        if !response.is_ok() {
            self.errors.set_local(
                "Connection error",
                response.failure_description(),
                ErrorKind::CommLinkFailure,
            );
            return Vec::new();
        }

        match decode::parse_column_names(&response.body_text()) {
            Ok(columns) => columns,
            Err(e) => {
                self.errors.set_local(
                    "Execution error",
                    format!("Received runtime exception: {e}"),
                    ErrorKind::QuerySyntax,
                );
                Vec::new()
            }
        }
    }

    /// `version.number`, or empty when unknown
    pub fn server_version(&mut self) -> String {
        self.root_document("server version")
            .and_then(|root| root.version)
            .and_then(|version| version.number)
            .unwrap_or_default()
    }

    /// `version.distribution`, or empty when unknown
    pub fn server_distribution(&mut self) -> String {
        self.root_document("server distribution")
            .and_then(|root| root.version)
            .and_then(|version| version.distribution)
            .unwrap_or_default()
    }

    /// `cluster_name`, or empty when unknown
    pub fn cluster_name(&mut self) -> String {
        self.root_document("cluster name")
            .and_then(|root| root.cluster_name)
            .unwrap_or_default()
    }

    fn root_document(&mut self, what: &str) -> Option<RootResponse> {
        if (self.client.is_none() || self.requests.is_none())
            && self.initialize_connection().is_err()
        {
            return None;
        }
        let (Some(client), Some(requests)) = (self.client.clone(), self.requests.clone()) else {
            return None;
        };

        let response = requests
            .build("", HttpMethod::Get, None, &RequestPayload::Empty)
            .and_then(|request| client.send(request));

        let response = match response {
            Ok(response) => response,
            Err(CommError::Transport(e)) => {
                tracing::debug!(error = %e, "Root document request produced no response");
                self.errors.set_local(
                    "Connection error",
                    format!("Failed to receive response from {what} query. Received NULL response."),
                    ErrorKind::CommLinkFailure,
                );
                return None;
            }
            Err(e) => {
                self.errors.set(e.into());
                return None;
            }
        };

        if !response.is_ok() {
            tracing::error!(
                "Unable to read the {what}. {}",
                response.failure_description()
            );
            return None;
        }

        match decode::parse_root(&response.body_text()) {
            Ok(root) => Some(root),
            Err(e) => {
                self.errors.set_local(
                    "Connection error",
                    format!("Error parsing main endpoint response: {e}"),
                    ErrorKind::CommLinkFailure,
                );
                None
            }
        }
    }
}
