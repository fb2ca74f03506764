/// Handle-based access to connections
///
/// The ODBC shim holds plain string ids rather than Rust objects. Each id maps to a
/// connection in [`CONNECTION_REGISTRY`] together with its cancel handle, so retrieval can
/// be stopped from another thread while a fetch holds the connection lock.
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::constants::CONNECTION_REGISTRY;
use crate::error::{ErrorDetails, ErrorKind};
use crate::models::{ResultPage, RetrievalOutcome};
use crate::query::CancelHandle;
use crate::transport::{ReqwestTransportFactory, TransportFactory};
use crate::utils::{safe_lock, safe_lock_arc};

#[derive(Clone)]
pub struct RegisteredConnection {
    pub connection: Arc<Mutex<Connection>>,
    pub cancel: CancelHandle,
}

fn invalid_id() -> ErrorDetails {
    ErrorDetails::local(
        "Connection error",
        "Invalid connection ID",
        ErrorKind::CommLinkFailure,
    )
}

fn lookup(conn_id: &str) -> Result<RegisteredConnection, ErrorDetails> {
    let registry = safe_lock(&CONNECTION_REGISTRY, "registry lookup")?;
    registry.get(conn_id).cloned().ok_or_else(invalid_id)
}

/// Validate, connect and register a connection using the reqwest transport
pub fn open(config: ConnectionConfig) -> Result<String, ErrorDetails> {
    open_with_factory(config, Arc::new(ReqwestTransportFactory))
}

pub fn open_with_factory(
    config: ConnectionConfig,
    factory: Arc<dyn TransportFactory>,
) -> Result<String, ErrorDetails> {
    let mut connection = Connection::with_transport_factory(factory)?;
    connection.connection_options(config)?;
    connection.connect_db_start()?;

    let cancel = connection.cancel_handle();
    let conn_id = Uuid::new_v4().to_string();
    safe_lock(&CONNECTION_REGISTRY, "registry open")?.insert(
        conn_id.clone(),
        RegisteredConnection {
            connection: Arc::new(Mutex::new(connection)),
            cancel,
        },
    );

    tracing::debug!(conn_id = %conn_id, "Connection registered");
    Ok(conn_id)
}

pub fn execute(conn_id: &str, query: &str, fetch_size: &str) -> Result<(), ErrorDetails> {
    let entry = lookup(conn_id)?;
    let mut connection = safe_lock_arc(&entry.connection, "registry execute")?;
    connection.execute_direct(Some(query), fetch_size)
}

/// Next page of the running query, `None` at the end of the result
pub fn pop_result(conn_id: &str) -> Result<Option<ResultPage>, ErrorDetails> {
    let entry = lookup(conn_id)?;
    let connection = safe_lock_arc(&entry.connection, "registry pop_result")?;
    Ok(connection.pop_result())
}

/// Stop result retrieval. Does not wait for the connection lock.
pub fn cancel(conn_id: &str) -> Result<(), ErrorDetails> {
    lookup(conn_id)?.cancel.cancel();
    Ok(())
}

pub fn retrieval_outcome(conn_id: &str) -> Result<RetrievalOutcome, ErrorDetails> {
    Ok(lookup(conn_id)?.cancel.outcome())
}

pub fn error_message(conn_id: &str) -> Result<String, ErrorDetails> {
    let entry = lookup(conn_id)?;
    let connection = safe_lock_arc(&entry.connection, "registry error_message")?;
    Ok(connection.error_message())
}

/// Drop the connection and forget the id
pub fn close(conn_id: &str) -> Result<(), ErrorDetails> {
    let entry = safe_lock(&CONNECTION_REGISTRY, "registry close")?
        .remove(conn_id)
        .ok_or_else(invalid_id)?;

    entry.cancel.cancel();
    safe_lock_arc(&entry.connection, "registry close connection")?.drop_db_connection();

    tracing::debug!(conn_id = %conn_id, "Connection closed");
    Ok(())
}

pub fn connection_count() -> usize {
    CONNECTION_REGISTRY
        .lock()
        .map(|registry| registry.len())
        .unwrap_or_default()
}
