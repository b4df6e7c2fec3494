//! DescribeTable tool

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::connection::WarehouseClient;
use crate::error::GatewayError;
use crate::schema::describe_table_query;
use crate::tools::Tool;
use crate::tools::helpers::{ToolOutput, column_text, require_argument};
use crate::validate::parse_qualified_table;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DescribeTableArgs {
    /// Fully qualified table name in the format 'database.schema.table'
    pub table_name: String,
}

#[derive(Clone)]
pub struct DescribeTableTool {
    client: Arc<dyn WarehouseClient>,
}

impl DescribeTableTool {
    pub fn new(client: Arc<dyn WarehouseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for DescribeTableTool {
    type Args = DescribeTableArgs;

    fn name() -> &'static str {
        "describe_table"
    }

    fn description() -> &'static str {
        "Get the schema information for a specific table"
    }

    fn required_arguments() -> &'static [&'static str] {
        &["table_name"]
    }

    async fn execute(&self, args: Self::Args) -> Result<ToolOutput, GatewayError> {
        let table_name = require_argument(&args.table_name, || {
            GatewayError::missing_argument("table_name")
        })?;
        let table = parse_qualified_table(table_name)?;

        let (rows, data_id) = self
            .client
            .execute_query(&describe_table_query(&table))
            .await?;

        let display = format!(
            "📋 Table Schema: {}\n\nColumns: {}\n{}",
            table_name,
            rows.len(),
            rows.iter()
                .map(|r| {
                    let not_null = if column_text(r, "IS_NULLABLE") == "NO" {
                        ", NOT NULL"
                    } else {
                        ""
                    };
                    format!(
                        "  • {} ({}{})",
                        column_text(r, "COLUMN_NAME"),
                        column_text(r, "DATA_TYPE"),
                        not_null
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        );

        ToolOutput::with_data(
            display,
            &data_id,
            rows,
            &[
                ("database", table.database.as_str()),
                ("schema", table.schema.as_str()),
                ("table", table.table.as_str()),
            ],
        )
    }
}
