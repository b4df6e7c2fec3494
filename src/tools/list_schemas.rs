//! ListSchemas tool

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::connection::WarehouseClient;
use crate::error::GatewayError;
use crate::exclusion::{ExcludePatterns, ObjectKind};
use crate::schema::list_schemas_query;
use crate::tools::Tool;
use crate::tools::helpers::{ToolOutput, bullet_list, column_text, require_argument};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ListSchemasArgs {
    /// Database name to list schemas from
    pub database: String,
}

#[derive(Clone)]
pub struct ListSchemasTool {
    client: Arc<dyn WarehouseClient>,
    exclusions: Arc<ExcludePatterns>,
}

impl ListSchemasTool {
    pub fn new(client: Arc<dyn WarehouseClient>, exclusions: Arc<ExcludePatterns>) -> Self {
        Self { client, exclusions }
    }
}

#[async_trait]
impl Tool for ListSchemasTool {
    type Args = ListSchemasArgs;

    fn name() -> &'static str {
        "list_schemas"
    }

    fn description() -> &'static str {
        "List all schemas in a database"
    }

    fn required_arguments() -> &'static [&'static str] {
        &["database"]
    }

    async fn execute(&self, args: Self::Args) -> Result<ToolOutput, GatewayError> {
        let database = require_argument(&args.database, || {
            GatewayError::InvalidArguments("Missing required 'database' parameter".to_string())
        })?;

        let sql = list_schemas_query(database)?;
        let (rows, data_id) = self.client.execute_query(&sql).await?;
        let rows = self.exclusions.filter_rows(ObjectKind::Schema, rows);

        let display = format!(
            "📂 Schemas in {}: {}\n{}",
            database,
            rows.len(),
            bullet_list(rows.iter().map(|r| column_text(r, "SCHEMA_NAME")), 50)
        );

        ToolOutput::with_data(display, &data_id, rows, &[("database", database)])
    }
}
