//! ReadQuery tool - guarded SELECT execution
//!
//! Every query goes through the write detector first; anything it flags is
//! rejected before reaching the warehouse.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::connection::WarehouseClient;
use crate::error::GatewayError;
use crate::tools::Tool;
use crate::tools::helpers::{ToolOutput, require_argument};
use crate::write_detector::SqlWriteDetector;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReadQueryArgs {
    /// SELECT SQL query to execute
    pub query: String,
}

#[derive(Clone)]
pub struct ReadQueryTool {
    client: Arc<dyn WarehouseClient>,
    detector: SqlWriteDetector,
}

impl ReadQueryTool {
    pub fn new(client: Arc<dyn WarehouseClient>, detector: SqlWriteDetector) -> Self {
        Self { client, detector }
    }
}

#[async_trait]
impl Tool for ReadQueryTool {
    type Args = ReadQueryArgs;

    fn name() -> &'static str {
        "read_query"
    }

    fn description() -> &'static str {
        "Execute a SELECT query."
    }

    fn required_arguments() -> &'static [&'static str] {
        &["query"]
    }

    async fn execute(&self, args: Self::Args) -> Result<ToolOutput, GatewayError> {
        let query = require_argument(&args.query, || GatewayError::missing_argument("query"))?;

        let analysis = self.detector.analyze_query(query);
        if analysis.contains_write {
            log::warn!(
                "Rejected read_query containing writes: {}",
                analysis.operations_display()
            );
            return Err(GatewayError::ReadOnlyViolation(
                "Calls to read_query should not contain write operations".to_string(),
            ));
        }

        let (rows, data_id) = self.client.execute_query(query).await?;

        let display = format!(
            "🔍 Query returned {} row{} (data_id = {})",
            rows.len(),
            if rows.len() == 1 { "" } else { "s" },
            data_id
        );

        ToolOutput::with_data(display, &data_id, rows, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::ScriptedWarehouse;
    use crate::tools::test_support::{payload_of, text_of};
    use serde_json::json;

    fn tool(client: Arc<ScriptedWarehouse>) -> ReadQueryTool {
        ReadQueryTool::new(client, SqlWriteDetector::new())
    }

    fn args(query: &str) -> ReadQueryArgs {
        ReadQueryArgs {
            query: query.into(),
        }
    }

    #[tokio::test]
    async fn test_select_is_executed() {
        let client = Arc::new(ScriptedWarehouse::new().with_rows(
            "FROM users",
            vec![json!({"id": 1, "name": "John"}), json!({"id": 2, "name": "Jane"})],
        ));
        let output = tool(client.clone())
            .execute(args("SELECT * FROM users"))
            .await
            .unwrap();

        assert!(text_of(&output).contains("2 rows"));
        assert_eq!(payload_of(&output)["data"][1]["name"], "Jane");
        assert_eq!(client.executed(), vec!["SELECT * FROM users"]);
    }

    #[tokio::test]
    async fn test_writes_are_rejected_before_execution() {
        let client = Arc::new(ScriptedWarehouse::new());
        for query in [
            "INSERT INTO users VALUES (1, 'John')",
            "SELECT 1; DROP TABLE users",
            "WITH x AS (DELETE FROM t RETURNING *) SELECT * FROM x",
        ] {
            let err = tool(client.clone()).execute(args(query)).await.unwrap_err();
            assert!(
                err.to_string()
                    .contains("Calls to read_query should not contain write operations"),
                "{} was not rejected",
                query
            );
        }
        assert!(client.executed().is_empty());
    }

    #[tokio::test]
    async fn test_keywords_in_literals_are_allowed() {
        let client = Arc::new(ScriptedWarehouse::new());
        let result = tool(client)
            .execute(args("SELECT 'DROP TABLE users' AS note -- DELETE"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_query() {
        let err = tool(Arc::new(ScriptedWarehouse::new()))
            .execute(ReadQueryArgs::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing query argument");
    }
}
