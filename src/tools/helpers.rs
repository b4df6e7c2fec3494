//! Helper functions for warehouse tools

use rmcp::model::{Content, ResourceContents};
use serde_json::{Map, Value, json};

use crate::error::GatewayError;
use crate::types::Row;

/// Result of a tool call before it is wrapped for the protocol
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub contents: Vec<Content>,
    /// Resource URIs whose content changed during the call
    pub updated_resources: Vec<String>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            contents: vec![Content::text(text.into())],
            updated_resources: Vec::new(),
        }
    }

    /// Summary text plus the rows embedded as `data://{data_id}`
    ///
    /// `context` entries (database, schema, table) are merged into the payload.
    pub fn with_data(
        summary: impl Into<String>,
        data_id: &str,
        rows: Vec<Row>,
        context: &[(&str, &str)],
    ) -> Result<Self, GatewayError> {
        let mut payload = Map::new();
        payload.insert("type".to_string(), json!("data"));
        payload.insert("data_id".to_string(), json!(data_id));
        for (key, value) in context {
            payload.insert(key.to_string(), json!(value));
        }
        payload.insert(
            "data".to_string(),
            Value::Array(rows.into_iter().map(Value::Object).collect()),
        );

        let text = serde_json::to_string(&Value::Object(payload))?;
        let mut resource = ResourceContents::text(text, format!("data://{}", data_id));
        if let ResourceContents::TextResourceContents { mime_type, .. } = &mut resource {
            *mime_type = Some("application/json".to_string());
        }

        Ok(Self {
            contents: vec![Content::text(summary.into()), Content::resource(resource)],
            updated_resources: Vec::new(),
        })
    }

    /// Mark `uri` as changed by this call
    pub fn notify(mut self, uri: impl Into<String>) -> Self {
        self.updated_resources.push(uri.into());
        self
    }
}

/// Trimmed value of a required string argument
pub fn require_argument(
    value: &str,
    error: impl FnOnce() -> GatewayError,
) -> Result<&str, GatewayError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(error());
    }
    Ok(trimmed)
}

/// String value of `column`, or `"?"` when absent
pub fn column_text<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column).and_then(|v| v.as_str()).unwrap_or("?")
}

/// Bullet list of at most `limit` items, noting how many were left out
pub fn bullet_list<'a>(items: impl ExactSizeIterator<Item = &'a str>, limit: usize) -> String {
    let total = items.len();
    let mut lines: Vec<String> = items.take(limit).map(|item| format!("  • {}", item)).collect();
    if total > limit {
        lines.push(format!("  … and {} more", total - limit));
    }
    lines.join("\n")
}
