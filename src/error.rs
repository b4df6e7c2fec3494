//! Error types for gateway operations

use rmcp::ErrorData as McpError;
use thiserror::Error;

/// Gateway operation errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Failed to connect to the warehouse
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed
    #[error("Query error: {0}")]
    QueryError(String),

    /// Missing or malformed tool arguments
    #[error("{0}")]
    InvalidArguments(String),

    /// Write operation submitted through a read-only tool
    #[error("Read-only violation: {0}")]
    ReadOnlyViolation(String),

    /// Statement rejected by a write tool's policy (writes disabled, wrong kind)
    #[error("{0}")]
    WriteRejected(String),

    /// Resource URI not served by this gateway
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// Tool name not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Invalid startup or runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// sqlx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Shorthand for a missing required tool argument
    pub fn missing_argument(name: &str) -> Self {
        Self::InvalidArguments(format!("Missing {} argument", name))
    }
}

/// Convert GatewayError to a protocol-level error
impl From<GatewayError> for McpError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidArguments(msg) => McpError::invalid_params(msg, None),
            GatewayError::UnknownTool(name) => {
                McpError::invalid_params(format!("Unknown tool: {}", name), None)
            }
            GatewayError::UnknownResource(uri) => {
                McpError::resource_not_found(format!("Unknown resource: {}", uri), None)
            }
            GatewayError::ReadOnlyViolation(msg) => {
                McpError::invalid_request(format!("[Read-only] {}", msg), None)
            }
            GatewayError::WriteRejected(msg) => McpError::invalid_request(msg, None),
            GatewayError::UrlParse(url_err) => {
                McpError::invalid_params(format!("[URL Parse] {}", url_err), None)
            }
            GatewayError::ConnectionError(msg) => {
                McpError::internal_error(format!("[Warehouse Connection] {}", msg), None)
            }
            GatewayError::QueryError(msg) => {
                McpError::internal_error(format!("[Warehouse Query] {}", msg), None)
            }
            GatewayError::Sqlx(sqlx_err) => convert_sqlx_error(sqlx_err),
            other => McpError::internal_error(other.to_string(), None),
        }
    }
}

/// Convert sqlx errors to McpError with detailed error handling
fn convert_sqlx_error(err: sqlx::Error) -> McpError {
    match err {
        sqlx::Error::Configuration(msg) => {
            McpError::invalid_params(format!("Warehouse configuration error: {}", msg), None)
        }
        sqlx::Error::Database(db_err) => {
            McpError::internal_error(format!("Warehouse error: {}", db_err), None)
        }
        sqlx::Error::RowNotFound => {
            McpError::resource_not_found("No rows returned by query".to_string(), None)
        }
        sqlx::Error::ColumnNotFound(col) => {
            McpError::invalid_params(format!("Column not found: {}", col), None)
        }
        sqlx::Error::PoolTimedOut => {
            McpError::internal_error("Connection pool timed out".to_string(), None)
        }
        sqlx::Error::PoolClosed => {
            McpError::internal_error("Connection pool closed".to_string(), None)
        }
        other => McpError::internal_error(format!("Warehouse error: {}", other), None),
    }
}
