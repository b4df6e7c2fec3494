//! Type definitions shared across the gateway

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::write_detector::CTE_WRITE;

/// A result row keyed by column name
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Outcome of classifying a batch of SQL statements
///
/// `has_cte_write` implies `contains_write`, and `write_operations` is
/// non-empty exactly when `contains_write` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WriteAnalysis {
    /// True if any statement writes, at top level or inside a CTE body
    pub contains_write: bool,

    /// Uppercase write keywords found at top level, plus `CTE_WRITE`
    pub write_operations: BTreeSet<String>,

    /// True if some CTE body contains a write keyword
    pub has_cte_write: bool,
}

impl WriteAnalysis {
    /// Whether `operation` (uppercase) was detected
    pub fn has_operation(&self, operation: &str) -> bool {
        self.write_operations.contains(operation)
    }

    /// Detected operations joined for display, e.g. `"DELETE, INSERT"`
    pub fn operations_display(&self) -> String {
        self.write_operations
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// A write that is a CREATE, as required by the table creation tool
    pub fn is_create(&self) -> bool {
        self.contains_write && self.has_operation("CREATE")
    }

    /// True if the only finding is the CTE sentinel
    pub fn is_cte_only(&self) -> bool {
        self.has_cte_write && self.write_operations.iter().all(|op| op == CTE_WRITE)
    }
}

/// Database-level metadata carried into the schema structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseInfo {
    /// Database kind, e.g. "STANDARD" or "IMPORTED DATABASE"
    pub kind: String,
    pub owner: String,
    pub comment: String,
}

impl Default for DatabaseInfo {
    fn default() -> Self {
        Self {
            kind: "IMPORTED DATABASE".to_string(),
            owner: String::new(),
            comment: String::new(),
        }
    }
}

/// Column entry of a table description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnInfo {
    pub name: String,

    /// Data type (e.g., "NUMBER", "VARCHAR", "TIMESTAMP_NTZ")
    #[serde(rename = "type")]
    pub data_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Constraint entry of a table description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConstraintInfo {
    pub name: String,

    /// Constraint type (e.g., "PRIMARY KEY", "UNIQUE", "FOREIGN KEY")
    #[serde(rename = "type")]
    pub constraint_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enforced: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_deferrable: Option<String>,
}

/// Table entry of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableInfo {
    /// Table type (e.g., "BASE TABLE", "VIEW")
    #[serde(rename = "type")]
    pub table_type: String,

    pub owner: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub columns: Vec<ColumnInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<ConstraintInfo>>,
}
