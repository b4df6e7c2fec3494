//! MCP gateway for a cloud data warehouse
//!
//! Exposes metadata exploration, guarded read queries, optional write tools
//! and an in-memory insight memo over the Model Context Protocol. Every
//! `read_query` passes through [`SqlWriteDetector`] before it reaches the
//! warehouse.

pub mod error;
pub mod types;

pub mod keywords;
pub mod sql_parser;
pub mod write_detector;

pub mod config;
pub mod dsn;
pub mod exclusion;
pub mod validate;

pub mod connection;
pub mod row_converter;
pub mod schema;
pub mod timeout;

pub mod insights;
pub mod server;
pub mod tools;

// Re-export secrecy types for consumers
pub use secrecy::{ExposeSecret, SecretString};

// Re-exports
pub use config::{Cli, ConnectionSettings, RuntimeConfig, ServerConfig};
pub use connection::{SqlxWarehouse, WarehouseClient};
pub use dsn::{DSNInfo, parse_dsn, redact_dsn, validate_dsn};
pub use error::GatewayError;
pub use exclusion::{ExcludePatterns, ObjectKind};
pub use insights::{InsightsMemo, MEMO_URI};
pub use server::{GatewayServer, detector_for, run_server};
pub use sql_parser::{SqlDialect, extract_first_keyword, parse_statements};
pub use tools::{Tool, ToolRegistry, build_registry};
pub use types::{ColumnInfo, ConstraintInfo, DatabaseInfo, Row, TableInfo, WriteAnalysis};
pub use write_detector::{CTE_WRITE, SqlWriteDetector};
