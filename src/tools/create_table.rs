//! CreateTable tool

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
pub struct CreateTableArgs {
    /// CREATE TABLE SQL statement
    pub query: String,
}

#[derive(Clone)]
pub struct CreateTableTool {
    client: Arc<dyn WarehouseClient>,
    detector: SqlWriteDetector,
    allow_write: bool,
}

impl CreateTableTool {
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
impl Tool for CreateTableTool {
    type Args = CreateTableArgs;

    fn name() -> &'static str {
        "create_table"
    }

    fn description() -> &'static str {
        "Create a new table in the warehouse"
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

        if !self.detector.analyze_query(query).is_create() {
            return Err(GatewayError::WriteRejected(
                "Only CREATE TABLE statements are allowed".to_string(),
            ));
        }

        let (_, data_id) = self.client.execute_write(query).await?;
        log::info!("Table created (data_id = {})", data_id);

        Ok(ToolOutput::text(format!(
            "Table created successfully. data_id = {}",
            data_id
        )))
    }
}
