//! Data structures shared across the communication layer
//!
//! This module defines the connection status, the column descriptors handed to the
//! ODBC layer, and the result page that travels through the result queue.
use crate::constants::{KEYWORD_DISPLAY_SIZE, KEYWORD_TYPE_OID, KEYWORD_TYPE_SIZE};

/// Connection state machine
///
/// `Bad` is initial and terminal on failure, `Needed` is transient during the
/// handshake and `Ok` holds until the connection is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnStatus {
    #[default]
    Bad,
    Needed,
    Ok,
}

/// Statement classification attached to each page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandType {
    /// Every SQL plugin query is treated as a generic read
    #[default]
    Select,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Select => "SELECT",
        }
    }
}

/// How the last query's result retrieval ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalOutcome {
    /// No query has run yet
    #[default]
    Idle,
    /// Pages are still being fetched in the background
    InProgress,
    /// Every page was fetched
    Completed,
    /// Retrieval stopped on an error; the connection's error record says why
    Failed,
    /// Retrieval was stopped by the caller or by dropping the connection
    Cancelled,
}

/// Column descriptor
///
/// The remote schema's declared type is kept for reference only. Every column is
/// described to the ODBC layer as a keyword (varchar) column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub field_name: String,
    /// Type as declared by the server, not mapped
    pub declared_type: String,
    pub type_oid: u32,
    pub type_size: i32,
    pub display_size: i32,
    pub length_of_str: i32,
    pub relation_id: u32,
    pub attribute_number: i16,
}

impl ColumnInfo {
    pub fn keyword(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        ColumnInfo {
            field_name: name.into(),
            declared_type: declared_type.into(),
            type_oid: KEYWORD_TYPE_OID,
            type_size: KEYWORD_TYPE_SIZE,
            display_size: KEYWORD_DISPLAY_SIZE,
            length_of_str: KEYWORD_TYPE_SIZE,
            relation_id: 0,
            attribute_number: 0,
        }
    }
}

/// One page of query results
///
/// Column descriptors are only present on the first page of a query; cursor pages
/// carry rows only and are read against the first page's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage {
    /// Raw response body the page was decoded from
    pub raw: String,
    pub columns: Vec<ColumnInfo>,
    /// Each row is a JSON array of cell values
    pub rows: Vec<serde_json::Value>,
    /// `total` reported by the first page
    pub total: Option<i64>,
    /// `size` reported by the first page
    pub size: Option<i64>,
    pub status: Option<i64>,
    /// Continuation token; `None` means no more pages
    pub cursor: Option<String>,
    pub command_type: CommandType,
}

impl ResultPage {
    pub fn num_fields(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_cursor(&self) -> bool {
        self.cursor.is_some()
    }
}
