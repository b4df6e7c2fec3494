//! WriteQuery tool - INSERT, UPDATE and DELETE execution

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::connection::WarehouseClient;
use crate::error::GatewayError;
use crate::sql_parser::extract_first_keyword;
use crate::tools::Tool;
use crate::tools::helpers::{ToolOutput, require_argument};
use crate::write_detector::SqlWriteDetector;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WriteQueryArgs {
    /// SQL query to execute
    pub query: String,
}

#[derive(Clone)]
pub struct WriteQueryTool {
    client: Arc<dyn WarehouseClient>,
    detector: SqlWriteDetector,
    allow_write: bool,
}

impl WriteQueryTool {
    pub fn new(
        client: Arc<dyn WarehouseClient>,
        detector: SqlWriteDetector,
        allow_write: bool,
    ) -> Self {
        Self {
            client,
            detector,
            allow_write,
        }
    }
}

#[async_trait]
impl Tool for WriteQueryTool {
    type Args = WriteQueryArgs;

    fn name() -> &'static str {
        "write_query"
    }

    fn description() -> &'static str {
        "Execute an INSERT, UPDATE, or DELETE query on the warehouse"
    }

    fn required_arguments() -> &'static [&'static str] {
        &["query"]
    }

    fn read_only() -> bool {
        false
    }

    async fn execute(&self, args: Self::Args) -> Result<ToolOutput, GatewayError> {
        if !self.allow_write {
            return Err(GatewayError::WriteRejected(
                "Write operations are not allowed for this data connection".to_string(),
            ));
        }

        let query = require_argument(&args.query, || GatewayError::missing_argument("query"))?;

        if extract_first_keyword(query, self.detector.dialect()).as_deref() == Some("SELECT") {
            return Err(GatewayError::WriteRejected(
                "SELECT queries are not allowed for write_query".to_string(),
            ));
        }

        log::info!("Executing write query");
        let (rows, data_id) = self.client.execute_write(query).await?;

        let mut text = format!("Query executed successfully. data_id = {}", data_id);
        if !rows.is_empty() {
            text.push('\n');
            text.push_str(&serde_json::to_string(&rows)?);
        }

        Ok(ToolOutput::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::ScriptedWarehouse;
    use crate::tools::test_support::text_of;
    use serde_json::json;

    fn tool(client: Arc<ScriptedWarehouse>, allow_write: bool) -> WriteQueryTool {
        WriteQueryTool::new(client, SqlWriteDetector::new(), allow_write)
    }

    fn args(query: &str) -> WriteQueryArgs {
        WriteQueryArgs {
            query: query.into(),
        }
    }

    #[tokio::test]
    async fn test_executes_write() {
        let client = Arc::new(
            ScriptedWarehouse::new()
                .with_rows("INSERT INTO users", vec![json!({"number of rows inserted": 1})]),
        );
        let tool = tool(client.clone(), true);

        let output = tool
            .execute(args("INSERT INTO users VALUES (1, 'John')"))
            .await
            .unwrap();

        let text = text_of(&output);
        assert!(text.starts_with("Query executed successfully. data_id = test-data-id"));
        assert!(text.contains("number of rows inserted"));
        assert_eq!(client.writes(), vec!["INSERT INTO users VALUES (1, 'John')"]);
    }

    #[tokio::test]
    async fn test_rejected_when_writes_disabled() {
        let client = Arc::new(ScriptedWarehouse::new());
        let tool = tool(client.clone(), false);

        let err = tool
            .execute(args("INSERT INTO users VALUES (1, 'John')"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Write operations are not allowed"));
        assert!(client.executed().is_empty());
    }

    #[tokio::test]
    async fn test_select_rejected() {
        let tool = tool(Arc::new(ScriptedWarehouse::new()), true);
        for query in ["SELECT * FROM users", "  -- note\n select 1"] {
            let err = tool.execute(args(query)).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                "SELECT queries are not allowed for write_query"
            );
        }
    }

    #[tokio::test]
    async fn test_missing_query() {
        let tool = tool(Arc::new(ScriptedWarehouse::new()), true);
        let err = tool.execute(WriteQueryArgs::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing query argument");
    }
}
