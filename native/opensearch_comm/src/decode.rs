//! Response decoding
//!
//! This module turns raw response bodies into typed documents. Each response shape
//! has a concrete struct; required fields are enforced by deserialization, and a
//! missing or mistyped field is reported as [`CommError::Parse`] carrying the body.
use serde::Deserialize;

use crate::error::{CommError, ErrorDetails, ErrorKind, Result};
use crate::models::{ColumnInfo, CommandType, ResultPage};

/// One entry of the `schema` array
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// First page of a query
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub schema: Vec<SchemaField>,
    #[serde(default)]
    pub cursor: Option<String>,
    pub total: i64,
    pub datarows: Vec<serde_json::Value>,
    pub size: i64,
    pub status: i64,
}

/// Follow-up page fetched with a cursor
#[derive(Debug, Deserialize)]
pub struct CursorResponse {
    #[serde(default)]
    pub cursor: Option<String>,
    pub datarows: Vec<serde_json::Value>,
    #[serde(default)]
    pub status: Option<i64>,
}

/// Schema section only, used for column discovery
#[derive(Debug, Deserialize)]
pub struct SchemaResponse {
    pub schema: Vec<SchemaField>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub reason: String,
    pub details: String,
    #[serde(rename = "type")]
    pub error_type: String,
}

/// Error body returned with non-200 responses
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub status: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub distribution: Option<String>,
}

/// Document returned by `GET /`
#[derive(Debug, Default, Deserialize)]
pub struct RootResponse {
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub version: Option<VersionInfo>,
}

fn parse<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| CommError::parse(&e, body))
}

/// An empty token is the same as no token
fn non_empty(cursor: Option<String>) -> Option<String> {
    cursor.filter(|c| !c.is_empty())
}

/// Decode the first page of a query and build its column descriptors
pub fn parse_query_page(body: &str) -> Result<ResultPage> {
    tracing::debug!("Parsing result JSON with schema.");
    let response: QueryResponse = parse(body)?;

    let columns = response
        .schema
        .into_iter()
        .map(|field| ColumnInfo::keyword(field.name, field.type_name))
        .collect();

    Ok(ResultPage {
        raw: body.to_string(),
        columns,
        rows: response.datarows,
        total: Some(response.total),
        size: Some(response.size),
        status: Some(response.status),
        cursor: non_empty(response.cursor),
        command_type: CommandType::Select,
    })
}

/// Decode a cursor page. The page carries rows only.
pub fn parse_cursor_page(body: &str) -> Result<ResultPage> {
    tracing::debug!("Parsing result JSON with cursor.");
    let response: CursorResponse = parse(body)?;

    Ok(ResultPage {
        raw: body.to_string(),
        columns: Vec::new(),
        rows: response.datarows,
        total: None,
        size: None,
        status: response.status,
        cursor: non_empty(response.cursor),
        command_type: CommandType::Select,
    })
}

/// Decode only the column names of a result
pub fn parse_column_names(body: &str) -> Result<Vec<String>> {
    let response: SchemaResponse = parse(body)?;
    Ok(response.schema.into_iter().map(|f| f.name).collect())
}

/// Decode an error body into an error record of the given kind
pub fn parse_error_response(body: &str, kind: ErrorKind) -> Result<ErrorDetails> {
    tracing::debug!("Parsing error response.");
    let response: ErrorResponse = parse(body)?;

    Ok(ErrorDetails {
        reason: response.error.reason,
        details: response.error.details,
        source_type: response.error.error_type,
        kind,
    })
}

/// Decode the root document
pub fn parse_root(body: &str) -> Result<RootResponse> {
    parse(body)
}
