//! Warehouse tools exposed over MCP
//!
//! Each tool is a plain struct implementing [`Tool`] with a typed argument
//! struct. [`DynTool`] erases the argument type so the server can hold every
//! tool in one [`ToolRegistry`].

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{JsonObject, ToolAnnotations};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ServerConfig;
use crate::connection::WarehouseClient;
use crate::error::GatewayError;
use crate::insights::InsightsMemo;
use crate::write_detector::SqlWriteDetector;

pub mod helpers;
pub use helpers::ToolOutput;

pub mod list_databases;
pub use list_databases::ListDatabasesTool;

pub mod list_schemas;
pub use list_schemas::ListSchemasTool;

pub mod list_tables;
pub use list_tables::ListTablesTool;

pub mod describe_table;
pub use describe_table::DescribeTableTool;

pub mod read_query;
pub use read_query::ReadQueryTool;

pub mod append_insight;
pub use append_insight::AppendInsightTool;

pub mod write_query;
pub use write_query::WriteQueryTool;

pub mod create_table;
pub use create_table::CreateTableTool;

// =============================================================================
// Tool Trait
// =============================================================================

/// A remote-callable operation with typed arguments
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Args: DeserializeOwned + JsonSchema + Send;

    fn name() -> &'static str;

    fn description() -> &'static str;

    /// Arguments that must be present and non-empty
    fn required_arguments() -> &'static [&'static str] {
        &[]
    }

    /// Read-only tools are always offered; others need `--allow-write`
    fn read_only() -> bool {
        true
    }

    async fn execute(&self, args: Self::Args) -> Result<ToolOutput, GatewayError>;
}

/// Object-safe view of a [`Tool`]
#[async_trait]
pub trait DynTool: Send + Sync {
    fn name(&self) -> &'static str;

    fn read_only(&self) -> bool;

    /// Protocol description: name, description, input schema, annotations
    fn definition(&self) -> rmcp::model::Tool;

    async fn call(&self, arguments: Option<JsonObject>) -> Result<ToolOutput, GatewayError>;
}

#[async_trait]
impl<T: Tool> DynTool for T {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn read_only(&self) -> bool {
        T::read_only()
    }

    fn definition(&self) -> rmcp::model::Tool {
        let mut schema = match serde_json::to_value(schemars::schema_for!(T::Args)) {
            Ok(Value::Object(map)) => map,
            _ => JsonObject::new(),
        };
        if !T::required_arguments().is_empty() {
            schema.insert("required".to_string(), serde_json::json!(T::required_arguments()));
        }

        let mut annotations = ToolAnnotations::new();
        annotations.read_only_hint = Some(T::read_only());
        annotations.destructive_hint = Some(!T::read_only());
        annotations.open_world_hint = Some(false);

        let mut tool = rmcp::model::Tool::new(T::name(), T::description(), Arc::new(schema));
        tool.annotations = Some(annotations);
        tool
    }

    async fn call(&self, arguments: Option<JsonObject>) -> Result<ToolOutput, GatewayError> {
        let arguments = Value::Object(arguments.unwrap_or_default());
        let args: T::Args = serde_json::from_value(arguments).map_err(|e| {
            GatewayError::InvalidArguments(format!("Invalid arguments for {}: {}", T::name(), e))
        })?;
        self.execute(args).await
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Tools offered by this server, in registration order
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn DynTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool>(&mut self, tool: T) {
        self.tools.push(Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynTool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<rmcp::model::Tool> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Keep only the tools `config` allows
    fn retain_allowed(&mut self, config: &ServerConfig) {
        self.tools.retain(|tool| {
            if !tool.read_only() && !config.allow_write {
                log::debug!("Withholding write tool {}", tool.name());
                return false;
            }
            if config.is_tool_excluded(tool.name()) {
                log::info!("Tool {} excluded by configuration", tool.name());
                return false;
            }
            true
        });
    }
}

/// Everything a tool may need at runtime
#[derive(Clone)]
pub struct ToolDeps {
    pub client: Arc<dyn WarehouseClient>,
    pub memo: Arc<InsightsMemo>,
    pub detector: SqlWriteDetector,
}

/// Register every tool, then drop the ones `config` withholds
pub fn build_registry(config: &ServerConfig, deps: &ToolDeps) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let exclusions = Arc::new(config.exclude_patterns.clone());

    registry.register(ListDatabasesTool::new(deps.client.clone(), exclusions.clone()));
    registry.register(ListSchemasTool::new(deps.client.clone(), exclusions.clone()));
    registry.register(ListTablesTool::new(deps.client.clone(), exclusions));
    registry.register(DescribeTableTool::new(deps.client.clone()));
    registry.register(ReadQueryTool::new(deps.client.clone(), deps.detector));
    registry.register(AppendInsightTool::new(deps.memo.clone()));
    registry.register(WriteQueryTool::new(
        deps.client.clone(),
        deps.detector,
        config.allow_write,
    ));
    registry.register(CreateTableTool::new(
        deps.client.clone(),
        deps.detector,
        config.allow_write,
    ));

    registry.retain_allowed(config);
    log::info!("✓ Registered tools: {}", registry.names().join(", "));
    registry
}
