//! ListTables tool

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::connection::WarehouseClient;
use crate::error::GatewayError;
use crate::exclusion::{ExcludePatterns, ObjectKind};
use crate::schema::list_tables_query;
use crate::tools::Tool;
use crate::tools::helpers::{ToolOutput, bullet_list, column_text, require_argument};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ListTablesArgs {
    /// Database name
    pub database: String,
    /// Schema name
    pub schema: String,
}

#[derive(Clone)]
pub struct ListTablesTool {
    client: Arc<dyn WarehouseClient>,
    exclusions: Arc<ExcludePatterns>,
}

impl ListTablesTool {
    pub fn new(client: Arc<dyn WarehouseClient>, exclusions: Arc<ExcludePatterns>) -> Self {
        Self { client, exclusions }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    type Args = ListTablesArgs;

    fn name() -> &'static str {
        "list_tables"
    }

    fn description() -> &'static str {
        "List all tables in a specific database and schema"
    }

    fn required_arguments() -> &'static [&'static str] {
        &["database", "schema"]
    }

    async fn execute(&self, args: Self::Args) -> Result<ToolOutput, GatewayError> {
        let missing = || {
            GatewayError::InvalidArguments(
                "Missing required 'database' and 'schema' parameters".to_string(),
            )
        };
        let database = require_argument(&args.database, missing)?;
        let schema = require_argument(&args.schema, missing)?;

        let sql = list_tables_query(database, schema)?;
        let (rows, data_id) = self.client.execute_query(&sql).await?;
        let rows = self.exclusions.filter_rows(ObjectKind::Table, rows);

        let display = format!(
            "📋 Tables in {}.{}: {}\n{}",
            database,
            schema,
            rows.len(),
            bullet_list(rows.iter().map(|r| column_text(r, "TABLE_NAME")), 50)
        );

        ToolOutput::with_data(
            display,
            &data_id,
            rows,
            &[("database", database), ("schema", schema)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::ScriptedWarehouse;
    use crate::tools::test_support::{payload_of, text_of};
    use serde_json::json;

    fn table(name: &str) -> serde_json::Value {
        json!({"TABLE_NAME": name, "TABLE_CATALOG": "DB", "TABLE_SCHEMA": "PUBLIC", "COMMENT": ""})
    }

    fn warehouse() -> Arc<ScriptedWarehouse> {
        Arc::new(ScriptedWarehouse::new().with_rows(
            "INFORMATION_SCHEMA.TABLES",
            vec![
                table("USERS"),
                table("ORDERS"),
                table("TEMP_TABLE"),
                table("STAGING_DATA"),
            ],
        ))
    }

    fn args(database: &str, schema: &str) -> ListTablesArgs {
        ListTablesArgs {
            database: database.into(),
            schema: schema.into(),
        }
    }

    #[tokio::test]
    async fn test_lists_tables_with_context() {
        let tool = ListTablesTool::new(warehouse(), Arc::default());
        let output = tool.execute(args("TEST_DB", "PUBLIC")).await.unwrap();

        let payload = payload_of(&output);
        assert_eq!(payload["database"], "TEST_DB");
        assert_eq!(payload["schema"], "PUBLIC");
        assert!(text_of(&output).contains("Tables in TEST_DB.PUBLIC: 4"));
    }

    #[tokio::test]
    async fn test_table_exclusions() {
        let exclusions = ExcludePatterns {
            tables: vec!["temp".into(), "staging".into()],
            ..Default::default()
        };
        let tool = ListTablesTool::new(warehouse(), Arc::new(exclusions));
        let output = tool.execute(args("TEST_DB", "PUBLIC")).await.unwrap();

        let names: Vec<String> = payload_of(&output)["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["TABLE_NAME"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["USERS", "ORDERS"]);
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let tool = ListTablesTool::new(warehouse(), Arc::default());
        for bad in [args("", ""), args("TEST_DB", "")] {
            let err = tool.execute(bad).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                "Missing required 'database' and 'schema' parameters"
            );
        }
    }
}
