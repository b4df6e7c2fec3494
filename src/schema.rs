//! INFORMATION_SCHEMA introspection queries and schema aggregation
//!
//! The query builders only produce SQL text. Names are validated before
//! interpolation because the database part of
//! `<db>.INFORMATION_SCHEMA.<view>` cannot be bound as a parameter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::WarehouseClient;
use crate::error::GatewayError;
use crate::types::{ColumnInfo, ConstraintInfo, DatabaseInfo, Row, TableInfo};
use crate::validate::{QualifiedTable, identifier_literal, validate_identifier};

/// SQL listing every database visible to the session
pub fn list_databases_query() -> &'static str {
    "SELECT DATABASE_NAME FROM INFORMATION_SCHEMA.DATABASES"
}

/// SQL listing the schemas of `database`
pub fn list_schemas_query(database: &str) -> Result<String, GatewayError> {
    validate_identifier(database)?;
    Ok(format!(
        "SELECT SCHEMA_NAME FROM {}.INFORMATION_SCHEMA.SCHEMATA",
        database
    ))
}

/// SQL listing the tables of `database.schema`
pub fn list_tables_query(database: &str, schema: &str) -> Result<String, GatewayError> {
    validate_identifier(database)?;
    validate_identifier(schema)?;
    Ok(format!(
        "SELECT TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME, COMMENT \
         FROM {}.INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_SCHEMA = {}",
        database,
        identifier_literal(schema)
    ))
}

/// SQL describing the columns of a table
pub fn describe_table_query(table: &QualifiedTable) -> String {
    format!(
        "SELECT COLUMN_NAME, COLUMN_DEFAULT, IS_NULLABLE, DATA_TYPE, COMMENT \
         FROM {}.INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} \
         ORDER BY ORDINAL_POSITION",
        table.database,
        identifier_literal(&table.schema),
        identifier_literal(&table.table)
    )
}

/// SQL for every user table of `database`
pub fn tables_query(database: &str) -> String {
    format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE, TABLE_OWNER, COMMENT AS TABLE_COMMENT \
         FROM {}.INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_SCHEMA != 'INFORMATION_SCHEMA'",
        database
    )
}

/// SQL for every user column of `database`, in table order
pub fn columns_query(database: &str) -> String {
    format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME, COLUMN_NAME, DATA_TYPE, \
         COMMENT AS COLUMN_COMMENT, ORDINAL_POSITION \
         FROM {}.INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA != 'INFORMATION_SCHEMA' \
         ORDER BY TABLE_SCHEMA, TABLE_NAME, ORDINAL_POSITION",
        database
    )
}

/// SQL for every table constraint of `database`
pub fn constraints_query(database: &str) -> String {
    format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME, CONSTRAINT_NAME, CONSTRAINT_TYPE, \
         ENFORCED AS IS_ENFORCED, INITIALLY_DEFERRED AS IS_DEFERRABLE, \
         COMMENT AS CONSTRAINT_COMMENT \
         FROM {}.INFORMATION_SCHEMA.TABLE_CONSTRAINTS \
         WHERE TABLE_SCHEMA != 'INFORMATION_SCHEMA' \
         ORDER BY TABLE_SCHEMA, TABLE_NAME, CONSTRAINT_NAME",
        database
    )
}

/// Tables of one schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub tables: BTreeMap<String, TableInfo>,
}

/// Aggregated structure of a database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseStructure {
    pub metadata: DatabaseInfo,
    pub schemas: BTreeMap<String, SchemaInfo>,
}

impl DatabaseStructure {
    pub fn new(metadata: DatabaseInfo) -> Self {
        Self {
            metadata,
            schemas: BTreeMap::new(),
        }
    }

    /// Look up a schema by name
    ///
    /// Quoted names match exactly; bare names ignore case.
    pub fn schema(&self, name: &str) -> Option<&SchemaInfo> {
        if let Some(inner) = name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) {
            return self.schemas.get(inner);
        }
        self.schemas
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, schema)| schema)
    }

    fn table_mut(&mut self, schema: &str, table: &str) -> Option<&mut TableInfo> {
        self.schemas.get_mut(schema)?.tables.get_mut(table)
    }

    /// Add table rows (TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE, TABLE_OWNER, TABLE_COMMENT)
    pub fn process_tables(&mut self, rows: &[Row]) {
        for row in rows {
            let (Some(schema), Some(table)) =
                (text(row, "TABLE_SCHEMA"), text(row, "TABLE_NAME"))
            else {
                log::warn!("Skipping table row without schema or name");
                continue;
            };

            let info = TableInfo {
                table_type: text(row, "TABLE_TYPE").unwrap_or_default(),
                owner: text(row, "TABLE_OWNER").unwrap_or_default(),
                comment: text(row, "TABLE_COMMENT"),
                columns: Vec::new(),
                constraints: None,
            };

            self.schemas
                .entry(schema)
                .or_default()
                .tables
                .insert(table, info);
        }
    }

    /// Attach column rows to their tables
    pub fn process_columns(&mut self, rows: &[Row]) {
        for row in rows {
            let (Some(schema), Some(table), Some(name)) = (
                text(row, "TABLE_SCHEMA"),
                text(row, "TABLE_NAME"),
                text(row, "COLUMN_NAME"),
            ) else {
                log::warn!("Skipping column row without schema, table or name");
                continue;
            };

            let column = ColumnInfo {
                name,
                data_type: text(row, "DATA_TYPE").unwrap_or_default(),
                comment: text(row, "COLUMN_COMMENT"),
            };

            match self.table_mut(&schema, &table) {
                Some(info) => info.columns.push(column),
                None => log::warn!(
                    "Column {} refers to unknown table {}.{}",
                    column.name,
                    schema,
                    table
                ),
            }
        }
    }

    /// Attach constraint rows to their tables
    pub fn process_constraints(&mut self, rows: &[Row]) {
        for row in rows {
            let (Some(schema), Some(table), Some(name)) = (
                text(row, "TABLE_SCHEMA"),
                text(row, "TABLE_NAME"),
                text(row, "CONSTRAINT_NAME"),
            ) else {
                log::warn!("Skipping constraint row without schema, table or name");
                continue;
            };

            let constraint = ConstraintInfo {
                name,
                constraint_type: text(row, "CONSTRAINT_TYPE").unwrap_or_default(),
                comment: text(row, "CONSTRAINT_COMMENT"),
                is_enforced: scalar(row, "IS_ENFORCED"),
                is_deferrable: scalar(row, "IS_DEFERRABLE"),
            };

            match self.table_mut(&schema, &table) {
                Some(info) => info.constraints.get_or_insert_with(Vec::new).push(constraint),
                None => log::warn!(
                    "Constraint {} refers to unknown table {}.{}",
                    constraint.name,
                    schema,
                    table
                ),
            }
        }
    }
}

/// Non-empty string field
fn text(row: &Row, key: &str) -> Option<String> {
    match row.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Any non-null scalar, rendered as text
fn scalar(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Build the structure of `database` from its INFORMATION_SCHEMA
pub async fn process_database_structure(
    client: &dyn WarehouseClient,
    database: &str,
    metadata: DatabaseInfo,
) -> Result<DatabaseStructure, GatewayError> {
    validate_identifier(database)?;
    log::info!("Processing database structure: {}", database);

    let mut structure = DatabaseStructure::new(metadata);

    let (tables, _) = client.execute_query(&tables_query(database)).await?;
    log::info!("Retrieved {} tables from {}", tables.len(), database);
    structure.process_tables(&tables);

    let (columns, _) = client.execute_query(&columns_query(database)).await?;
    log::info!("Retrieved {} columns from {}", columns.len(), database);
    structure.process_columns(&columns);

    let (constraints, _) = client.execute_query(&constraints_query(database)).await?;
    log::info!("Retrieved {} constraints from {}", constraints.len(), database);
    structure.process_constraints(&constraints);

    Ok(structure)
}

/// Descriptions of every table in `database.schema`
pub async fn prefetch_tables(
    client: &dyn WarehouseClient,
    database: &str,
    schema: &str,
) -> Result<BTreeMap<String, TableInfo>, GatewayError> {
    validate_identifier(schema)?;
    let structure = process_database_structure(client, database, DatabaseInfo::default()).await?;

    match structure.schema(schema) {
        Some(info) => {
            log::info!(
                "✓ Prefetched {} table descriptions from {}.{}",
                info.tables.len(),
                database,
                schema
            );
            Ok(info.tables.clone())
        }
        None => {
            log::warn!("Schema {}.{} has no tables to prefetch", database, schema);
            Ok(BTreeMap::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::ScriptedWarehouse;
    use serde_json::json;

    fn rows(values: Vec<Value>) -> Vec<Row> {
        values
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect()
    }

    fn sample_warehouse() -> ScriptedWarehouse {
        ScriptedWarehouse::new()
            .with_rows(
                "INFORMATION_SCHEMA.TABLES",
                vec![
                    json!({"TABLE_SCHEMA": "PUBLIC", "TABLE_NAME": "USERS", "TABLE_TYPE": "BASE TABLE",
                           "TABLE_OWNER": "SYSADMIN", "TABLE_COMMENT": "Registered users"}),
                    json!({"TABLE_SCHEMA": "PUBLIC", "TABLE_NAME": "ORDERS", "TABLE_TYPE": "BASE TABLE",
                           "TABLE_OWNER": "SYSADMIN", "TABLE_COMMENT": null}),
                    json!({"TABLE_SCHEMA": "STAGING", "TABLE_NAME": "RAW", "TABLE_TYPE": "VIEW",
                           "TABLE_OWNER": "LOADER", "TABLE_COMMENT": ""}),
                ],
            )
            .with_rows(
                "INFORMATION_SCHEMA.COLUMNS",
                vec![
                    json!({"TABLE_SCHEMA": "PUBLIC", "TABLE_NAME": "USERS", "COLUMN_NAME": "ID",
                           "DATA_TYPE": "NUMBER", "COLUMN_COMMENT": null, "ORDINAL_POSITION": 1}),
                    json!({"TABLE_SCHEMA": "PUBLIC", "TABLE_NAME": "USERS", "COLUMN_NAME": "EMAIL",
                           "DATA_TYPE": "TEXT", "COLUMN_COMMENT": "Login", "ORDINAL_POSITION": 2}),
                    json!({"TABLE_SCHEMA": "PUBLIC", "TABLE_NAME": "GHOST", "COLUMN_NAME": "X",
                           "DATA_TYPE": "TEXT", "COLUMN_COMMENT": null, "ORDINAL_POSITION": 1}),
                ],
            )
            .with_rows(
                "INFORMATION_SCHEMA.TABLE_CONSTRAINTS",
                vec![json!({"TABLE_SCHEMA": "PUBLIC", "TABLE_NAME": "USERS",
                            "CONSTRAINT_NAME": "PK_USERS", "CONSTRAINT_TYPE": "PRIMARY KEY",
                            "IS_ENFORCED": "NO", "IS_DEFERRABLE": null, "CONSTRAINT_COMMENT": null})],
            )
    }

    #[test]
    fn test_query_builders_validate_names() {
        assert!(list_schemas_query("SALES").is_ok());
        assert!(list_schemas_query("SALES; DROP DATABASE X").is_err());
        assert!(list_tables_query("SALES", "x' OR '1'='1").is_err());

        let sql = list_tables_query("SALES", "public").unwrap();
        assert!(sql.contains("FROM SALES.INFORMATION_SCHEMA.TABLES"));
        assert!(sql.contains("TABLE_SCHEMA = 'PUBLIC'"));
    }

    #[test]
    fn test_metadata_queries_skip_information_schema() {
        for sql in [tables_query("DB"), columns_query("DB"), constraints_query("DB")] {
            assert!(sql.contains("FROM DB.INFORMATION_SCHEMA."));
            assert!(sql.contains("TABLE_SCHEMA != 'INFORMATION_SCHEMA'"));
        }
    }

    #[tokio::test]
    async fn test_process_database_structure() {
        let warehouse = sample_warehouse();
        let structure = process_database_structure(&warehouse, "SALES", DatabaseInfo::default())
            .await
            .unwrap();

        assert_eq!(structure.metadata.kind, "IMPORTED DATABASE");
        assert_eq!(structure.schemas.len(), 2);

        let users = &structure.schemas["PUBLIC"].tables["USERS"];
        assert_eq!(users.table_type, "BASE TABLE");
        assert_eq!(users.comment.as_deref(), Some("Registered users"));
        assert_eq!(users.columns.len(), 2);
        assert_eq!(users.columns[1].comment.as_deref(), Some("Login"));

        let constraints = users.constraints.as_ref().unwrap();
        assert_eq!(constraints[0].constraint_type, "PRIMARY KEY");
        assert_eq!(constraints[0].is_enforced.as_deref(), Some("NO"));
        assert_eq!(constraints[0].is_deferrable, None);

        let orders = &structure.schemas["PUBLIC"].tables["ORDERS"];
        assert!(orders.comment.is_none());
        assert!(orders.constraints.is_none());

        // Empty comments are dropped, and the unknown GHOST table is skipped
        assert!(structure.schemas["STAGING"].tables["RAW"].comment.is_none());
        assert!(!structure.schemas["PUBLIC"].tables.contains_key("GHOST"));
    }

    #[tokio::test]
    async fn test_structure_serialization_omits_missing_fields() {
        let warehouse = sample_warehouse();
        let structure = process_database_structure(&warehouse, "SALES", DatabaseInfo::default())
            .await
            .unwrap();

        let value = serde_json::to_value(&structure).unwrap();
        let orders = &value["schemas"]["PUBLIC"]["tables"]["ORDERS"];
        assert_eq!(orders["type"], "BASE TABLE");
        assert!(orders.get("comment").is_none());
        assert!(orders.get("constraints").is_none());
        assert_eq!(value["metadata"]["owner"], "");
    }

    #[tokio::test]
    async fn test_prefetch_tables_matches_schema_case_insensitively() {
        let warehouse = sample_warehouse();
        let tables = prefetch_tables(&warehouse, "SALES", "public").await.unwrap();
        assert_eq!(
            tables.keys().collect::<Vec<_>>(),
            vec!["ORDERS", "USERS"]
        );

        let none = prefetch_tables(&warehouse, "SALES", "\"public\"").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_prefetch_propagates_query_errors() {
        let warehouse = ScriptedWarehouse::new().with_error("INFORMATION_SCHEMA", "boom");
        let err = prefetch_tables(&warehouse, "SALES", "PUBLIC").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_rows_missing_keys_are_skipped() {
        let mut structure = DatabaseStructure::default();
        structure.process_tables(&rows(vec![json!({"TABLE_NAME": "NO_SCHEMA"})]));
        assert!(structure.schemas.is_empty());
    }
}
