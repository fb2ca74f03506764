//! `opensearch_comm`: communication layer of the OpenSearch SQL ODBC driver
//!
//! This is the root module of the library. It turns the driver's
//! connect / execute / fetch protocol into authenticated HTTP requests against the SQL
//! plugin endpoint and hands cursor-paginated results back through a small blocking
//! queue.
//!
//! ```no_run
//! use opensearch_comm::{Connection, ConnectionConfig};
//!
//! let mut conn = Connection::new()?;
//! conn.connection_options(ConnectionConfig::from_connection_string(
//!     "Host=localhost;Port=9200;Auth=NONE",
//! ))?;
//! conn.connect_db_start()?;
//! conn.execute_direct(Some("SELECT * FROM logs"), "200")?;
//! while let Some(page) = conn.pop_result() {
//!     println!("{} rows", page.row_count());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod auth;
pub mod config;
pub mod connection;
pub mod constants;
pub mod cursor;
pub mod decode;
pub mod error;
pub mod metadata;
pub mod models;
pub mod query;
pub mod queue;
pub mod registry;
pub mod request;
pub mod runtime;
pub mod transport;
pub mod utils;

// Re-export key types for the driver layer
pub use config::{AuthOptions, Authentication, ConnectionConfig};
pub use connection::Connection;
pub use error::{CommError, ErrorDetails, ErrorKind, ErrorState};
pub use models::*;
pub use query::CancelHandle;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportFactory};

#[cfg(test)]
mod tests;
