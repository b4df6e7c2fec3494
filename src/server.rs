//! MCP server: tool dispatch, resources and update notifications

use std::collections::BTreeMap;
use std::sync::Arc;

use rmcp::model::{
    AnnotateAble, CallToolRequestParam, CallToolResult, Content, Implementation,
    ListResourcesResult, ListToolsResult, PaginatedRequestParam, RawResource,
    ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
    ResourceUpdatedNotificationParam, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt};

use secrecy::ExposeSecret;

use crate::config::{ConnectionSettings, ServerConfig};
use crate::connection::{SqlxWarehouse, WarehouseClient};
use crate::error::GatewayError;
use crate::insights::{InsightsMemo, MEMO_URI};
use crate::schema::prefetch_tables;
use crate::sql_parser::SqlDialect;
use crate::tools::{ToolDeps, ToolRegistry, build_registry};
use crate::types::TableInfo;
use crate::write_detector::SqlWriteDetector;

const TABLE_URI_PREFIX: &str = "context://table/";

/// Protocol handler over the tool registry and the session's resources
#[derive(Clone)]
pub struct GatewayServer {
    registry: ToolRegistry,
    memo: Arc<InsightsMemo>,
    tables: Arc<BTreeMap<String, TableInfo>>,
}

impl GatewayServer {
    pub fn new(
        registry: ToolRegistry,
        memo: Arc<InsightsMemo>,
        tables: BTreeMap<String, TableInfo>,
    ) -> Self {
        Self {
            registry,
            memo,
            tables: Arc::new(tables),
        }
    }

    /// Run a tool, folding any failure into an error result
    ///
    /// Returns the result with the URIs of resources the call changed.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<rmcp::model::JsonObject>,
    ) -> (CallToolResult, Vec<String>) {
        let outcome = match self.registry.get(name) {
            Some(tool) => tool.call(arguments).await,
            None => Err(GatewayError::UnknownTool(name.to_string())),
        };

        match outcome {
            Ok(output) => (
                CallToolResult::success(output.contents),
                output.updated_resources,
            ),
            Err(e) => {
                log::warn!("Tool {} failed: {}", name, e);
                (
                    CallToolResult::error(vec![Content::text(format!("Error: {}", e))]),
                    Vec::new(),
                )
            }
        }
    }

    pub fn resources(&self) -> Vec<Resource> {
        let mut memo = RawResource::new(MEMO_URI, "Data Insights Memo");
        memo.description = Some("A living document of discovered data insights".to_string());
        memo.mime_type = Some("text/plain".to_string());

        let mut resources = vec![memo.no_annotation()];
        for name in self.tables.keys() {
            let mut table = RawResource::new(format!("{}{}", TABLE_URI_PREFIX, name), name.clone());
            table.description = Some(format!("Description of the {} table", name));
            table.mime_type = Some("application/json".to_string());
            resources.push(table.no_annotation());
        }
        resources
    }

    /// Text content of the resource at `uri`
    pub fn read(&self, uri: &str) -> Result<String, GatewayError> {
        if uri == MEMO_URI {
            return Ok(self.memo.get_memo());
        }

        if let Some(table) = uri
            .strip_prefix(TABLE_URI_PREFIX)
            .and_then(|name| self.tables.get(name))
        {
            return Ok(serde_json::to_string_pretty(table)?);
        }

        Err(GatewayError::UnknownResource(uri.to_string()))
    }
}

impl ServerHandler for GatewayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Explore warehouse metadata, run read-only queries and record insights \
                 in the memo://insights resource."
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.registry.definitions()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let (result, updated) = self.dispatch(&request.name, request.arguments).await;

        for uri in updated {
            let param = ResourceUpdatedNotificationParam { uri: uri.clone() };
            if let Err(e) = context.peer.notify_resource_updated(param).await {
                log::warn!("Failed to send resource update for {}: {}", uri, e);
            }
        }

        Ok(result)
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(self.resources()))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self.read(&request.uri)?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}

/// Table descriptions for context resources; empty when prefetch fails
pub async fn load_table_context(
    client: &dyn WarehouseClient,
    config: &ServerConfig,
) -> BTreeMap<String, TableInfo> {
    let (Some(database), Some(schema)) = (&config.connection.database, &config.connection.schema)
    else {
        return BTreeMap::new();
    };

    match prefetch_tables(client, database, schema).await {
        Ok(tables) => tables,
        Err(e) => {
            log::error!("Error prefetching table descriptions: {}", e);
            BTreeMap::new()
        }
    }
}

/// Write detector tokenizing in the dialect of the DSN's driver
pub fn detector_for(settings: &ConnectionSettings) -> anyhow::Result<SqlWriteDetector> {
    let info = crate::dsn::parse_dsn(settings.dsn.expose_secret())?;
    let dialect = SqlDialect::from_scheme(&info.protocol);
    log::info!("Classifying SQL with the {:?} dialect", dialect);
    Ok(SqlWriteDetector::with_dialect(dialect))
}

/// Serve the gateway over stdio until the client disconnects
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let detector = detector_for(&config.connection)?;
    let warehouse = Arc::new(SqlxWarehouse::new(
        config.connection.clone(),
        config.retry,
    ));
    // Connect while the protocol handshake runs; the first query waits on it
    let _init = warehouse.start_init();

    let memo = Arc::new(InsightsMemo::new());
    let deps = ToolDeps {
        client: warehouse.clone(),
        memo: memo.clone(),
        detector,
    };
    let registry = build_registry(&config, &deps);

    let tables = if config.prefetch {
        load_table_context(warehouse.as_ref(), &config).await
    } else {
        BTreeMap::new()
    };

    let server = GatewayServer::new(registry, memo, tables);

    log::info!("✓ Warehouse gateway ready on stdio");
    let service = server.serve(rmcp::transport::stdio()).await?;
    let reason = service.waiting().await?;
    log::info!("Server stopped: {:?}", reason);

    warehouse.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::ScriptedWarehouse;
    use crate::tools::test_support::{deps, server_config};
    use serde_json::json;

    fn server(warehouse: ScriptedWarehouse, tables: BTreeMap<String, TableInfo>) -> GatewayServer {
        let deps = deps(warehouse);
        let registry = build_registry(&server_config(&[]), &deps);
        GatewayServer::new(registry, deps.memo, tables)
    }

    fn result_text(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn users_table() -> TableInfo {
        TableInfo {
            table_type: "BASE TABLE".into(),
            owner: "SYSADMIN".into(),
            comment: Some("User data".into()),
            columns: Vec::new(),
            constraints: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_success_and_unknown_tool() {
        let warehouse = ScriptedWarehouse::new()
            .with_rows("DATABASES", vec![json!({"DATABASE_NAME": "TEST_DB"})]);
        let server = server(warehouse, BTreeMap::new());

        let (result, updated) = server.dispatch("list_databases", None).await;
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.content.len(), 2);
        assert!(updated.is_empty());

        let (result, _) = server.dispatch("unknown_tool", None).await;
        assert_eq!(result.is_error, Some(true));
        assert_eq!(result_text(&result), "Error: Unknown tool: unknown_tool");
    }

    #[tokio::test]
    async fn test_tool_errors_become_error_results() {
        let server = server(ScriptedWarehouse::new(), BTreeMap::new());

        let mut args = rmcp::model::JsonObject::new();
        args.insert("query".into(), json!("DELETE FROM users"));
        let (result, _) = server.dispatch("read_query", Some(args)).await;

        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).starts_with("Error: "));
        assert!(result_text(&result).contains("should not contain write operations"));
    }

    #[tokio::test]
    async fn test_write_tool_unavailable_without_allow_write() {
        let server = server(ScriptedWarehouse::new(), BTreeMap::new());
        let (result, _) = server.dispatch("write_query", None).await;
        assert_eq!(result_text(&result), "Error: Unknown tool: write_query");
    }

    #[tokio::test]
    async fn test_append_insight_updates_memo_resource() {
        let server = server(ScriptedWarehouse::new(), BTreeMap::new());
        assert_eq!(
            server.read(MEMO_URI).unwrap(),
            "No data insights have been discovered yet."
        );

        let mut args = rmcp::model::JsonObject::new();
        args.insert("insight".into(), json!("Churn doubled in Q3"));
        let (_, updated) = server.dispatch("append_insight", Some(args)).await;

        assert_eq!(updated, vec![MEMO_URI.to_string()]);
        assert!(server.read(MEMO_URI).unwrap().contains("- Churn doubled in Q3"));
    }

    #[test]
    fn test_resources_and_unknown_uri() {
        let mut tables = BTreeMap::new();
        tables.insert("USERS".to_string(), users_table());
        let server = server(ScriptedWarehouse::new(), tables);

        let resources = server.resources();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].uri, MEMO_URI);
        assert_eq!(resources[0].name, "Data Insights Memo");
        assert_eq!(resources[0].mime_type.as_deref(), Some("text/plain"));
        assert_eq!(resources[1].uri, "context://table/USERS");

        let table: serde_json::Value =
            serde_json::from_str(&server.read("context://table/USERS").unwrap()).unwrap();
        assert_eq!(table["type"], "BASE TABLE");
        assert_eq!(table["comment"], "User data");

        let err = server.read("unknown://resource").unwrap_err();
        assert_eq!(err.to_string(), "Unknown resource: unknown://resource");
        assert!(server.read("context://table/MISSING").is_err());
    }

    #[test]
    fn test_detector_dialect_follows_dsn() {
        for (dsn, dialect) in [
            ("postgres://u:p@host/db", SqlDialect::PostgreSql),
            ("mysql://u:p@host/db", SqlDialect::MySql),
            ("sqlite::memory:", SqlDialect::Sqlite),
        ] {
            let detector = detector_for(&ConnectionSettings::new(dsn)).unwrap();
            assert_eq!(detector.dialect(), dialect, "for {}", dsn);
        }

        // A backslash literal does not hide the DROP from a PostgreSQL detector
        let detector = detector_for(&ConnectionSettings::new("postgres://u:p@host/db")).unwrap();
        assert!(detector
            .analyze_query("SELECT '\\' AS a; DROP TABLE t; -- '")
            .contains_write);
    }

    #[tokio::test]
    async fn test_prefetch_failure_yields_no_tables() {
        let warehouse = ScriptedWarehouse::new().with_error("INFORMATION_SCHEMA", "connection failed");
        let config = server_config(&["--prefetch", "--database", "TEST_DB", "--schema", "PUBLIC"]);

        let tables = load_table_context(&warehouse, &config).await;
        assert!(tables.is_empty());
    }

    #[tokio::test]
    async fn test_prefetch_loads_configured_schema() {
        let warehouse = ScriptedWarehouse::new()
            .with_rows(
                "INFORMATION_SCHEMA.TABLES",
                vec![json!({"TABLE_SCHEMA": "PUBLIC", "TABLE_NAME": "USERS",
                            "TABLE_TYPE": "BASE TABLE", "TABLE_OWNER": "SYSADMIN",
                            "TABLE_COMMENT": "User data"})],
            )
            .with_rows(
                "INFORMATION_SCHEMA.COLUMNS",
                vec![json!({"TABLE_SCHEMA": "PUBLIC", "TABLE_NAME": "USERS",
                            "COLUMN_NAME": "ID", "DATA_TYPE": "NUMBER",
                            "COLUMN_COMMENT": "Primary key"})],
            );
        let config = server_config(&["--prefetch", "--database", "TEST_DB", "--schema", "PUBLIC"]);

        let tables = load_table_context(&warehouse, &config).await;
        let users = &tables["USERS"];
        assert_eq!(users.comment.as_deref(), Some("User data"));
        assert_eq!(users.columns[0].name, "ID");
        assert_eq!(users.columns[0].comment.as_deref(), Some("Primary key"));
    }
}
