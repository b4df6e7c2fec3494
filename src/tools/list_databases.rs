//! ListDatabases tool

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::connection::WarehouseClient;
use crate::error::GatewayError;
use crate::exclusion::{ExcludePatterns, ObjectKind};
use crate::schema::list_databases_query;
use crate::tools::helpers::{ToolOutput, bullet_list, column_text};
use crate::tools::Tool;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListDatabasesArgs {}

#[derive(Clone)]
pub struct ListDatabasesTool {
    client: Arc<dyn WarehouseClient>,
    exclusions: Arc<ExcludePatterns>,
}

impl ListDatabasesTool {
    pub fn new(client: Arc<dyn WarehouseClient>, exclusions: Arc<ExcludePatterns>) -> Self {
        Self { client, exclusions }
    }
}

#[async_trait]
impl Tool for ListDatabasesTool {
    type Args = ListDatabasesArgs;

    fn name() -> &'static str {
        "list_databases"
    }

    fn description() -> &'static str {
        "List all available databases in the warehouse"
    }

    async fn execute(&self, _args: Self::Args) -> Result<ToolOutput, GatewayError> {
        let (rows, data_id) = self.client.execute_query(list_databases_query()).await?;
        let rows = self.exclusions.filter_rows(ObjectKind::Database, rows);

        let display = format!(
            "🗄 Databases: {}\n{}",
            rows.len(),
            bullet_list(rows.iter().map(|r| column_text(r, "DATABASE_NAME")), 50)
        );

        ToolOutput::with_data(display, &data_id, rows, &[])
    }
}
