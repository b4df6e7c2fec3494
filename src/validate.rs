//! Identifier validation for names interpolated into metadata SQL
//!
//! INFORMATION_SCHEMA lookups address a database by name in the FROM clause,
//! which cannot be bound as a parameter. Names coming from tool arguments are
//! checked here before being spliced into SQL text.

use lazy_regex::{Lazy, Regex, lazy_regex};

use crate::error::GatewayError;

static BARE_IDENTIFIER: Lazy<Regex> = lazy_regex!(r"^[A-Za-z_][A-Za-z0-9_$]*$");
static QUOTED_IDENTIFIER: Lazy<Regex> = lazy_regex!(r#"^"(?:[^"]|"")+"$"#);

/// Maximum identifier length accepted by the warehouse
const MAX_IDENTIFIER_LEN: usize = 255;

/// Validate a database, schema or table name
///
/// ## Validation Rules
///
/// - **Length**: 1-255 characters
/// - **Bare form**: `[A-Za-z_][A-Za-z0-9_$]*`
/// - **Quoted form**: wrapped in double quotes, embedded quotes doubled
///
/// ## Example
///
/// ```rust
/// use warehouse_gateway::validate::validate_identifier;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
///
/// // Valid identifiers
/// validate_identifier("ANALYTICS")?;
/// validate_identifier("raw_events$v2")?;
/// validate_identifier("\"Mixed Case\"")?;
///
/// // Injection attempts
/// # assert!(validate_identifier("db; DROP TABLE users").is_err());
/// # assert!(validate_identifier("db--").is_err());
/// # assert!(validate_identifier("\"open").is_err());
///
/// // Rule violations
/// # assert!(validate_identifier("").is_err());
/// # assert!(validate_identifier("1db").is_err());
/// # Ok(())
/// # }
/// ```
pub fn validate_identifier(name: &str) -> Result<(), GatewayError> {
    if name.is_empty() {
        return Err(GatewayError::InvalidArguments(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(GatewayError::InvalidArguments(format!(
            "Identifier too long: {} characters (max {})",
            name.len(),
            MAX_IDENTIFIER_LEN
        )));
    }

    if BARE_IDENTIFIER.is_match(name) || QUOTED_IDENTIFIER.is_match(name) {
        return Ok(());
    }

    Err(GatewayError::InvalidArguments(format!(
        "Invalid identifier: '{}'",
        name
    )))
}

/// A `database.schema.table` name split into its validated parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedTable {
    pub database: String,
    pub schema: String,
    pub table: String,
}

/// Split and validate a fully qualified table name
///
/// Quoted parts may not contain dots.
pub fn parse_qualified_table(table_name: &str) -> Result<QualifiedTable, GatewayError> {
    let parts: Vec<&str> = table_name.split('.').collect();
    let [database, schema, table] = parts.as_slice() else {
        return Err(GatewayError::InvalidArguments(
            "Table name must be fully qualified as 'database.schema.table'".to_string(),
        ));
    };

    for part in [database, schema, table] {
        validate_identifier(part)?;
    }

    Ok(QualifiedTable {
        database: database.to_string(),
        schema: schema.to_string(),
        table: table.to_string(),
    })
}

/// Quote a value as a single-quoted SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Literal to compare against INFORMATION_SCHEMA name columns
///
/// Quoted identifiers keep their case; bare ones are stored uppercase.
pub fn identifier_literal(name: &str) -> String {
    match name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) {
        Some(inner) => quote_literal(&inner.replace("\"\"", "\"")),
        None => quote_literal(&name.to_ascii_uppercase()),
    }
}
