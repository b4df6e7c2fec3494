//! Conversion of driver rows into JSON rows
//!
//! Converts sqlx AnyRow instances to `Row` maps keyed by column name.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Number, Value};
use sqlx::any::AnyRow;
use sqlx::{Column, Row as _, TypeInfo};

use crate::error::GatewayError;
use crate::types::Row;

/// Extract an optional column value, naming the column and type on failure
fn extract<'r, T>(
    row: &'r AnyRow,
    ordinal: usize,
    name: &str,
    kind: &str,
) -> Result<Option<T>, GatewayError>
where
    T: sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
{
    row.try_get::<Option<T>, _>(ordinal).map_err(|e| {
        GatewayError::QueryError(format!(
            "Failed to extract column '{}' as {}: {}",
            name, kind, e
        ))
    })
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// Convert a sqlx row to a JSON row
///
/// Binary columns are rendered as base64 strings. Date/time, decimal and
/// JSON columns are passed through as text the way the driver reports them.
///
/// # Errors
/// Returns error if a column has an unsupported type or cannot be decoded
pub fn row_to_json(row: &AnyRow) -> Result<Row, GatewayError> {
    let mut out = Row::new();

    for column in row.columns() {
        let ordinal = column.ordinal();
        let name = column.name().to_string();
        let type_name = column.type_info().name().to_ascii_uppercase();

        let value = match type_name.as_str() {
            "NULL" => Value::Null,
            "TEXT" | "VARCHAR" | "CHAR" | "STRING" | "BPCHAR" | "NAME" | "CITEXT" => {
                extract::<String>(row, ordinal, &name, "TEXT")?
                    .map(Value::String)
                    .unwrap_or(Value::Null)
            }
            "INTEGER" | "INT" | "INT2" | "INT4" | "INT8" | "BIGINT" | "SMALLINT"
            | "MEDIUMINT" => extract::<i64>(row, ordinal, &name, "INTEGER")?
                .map(Value::from)
                .unwrap_or(Value::Null),
            "BOOLEAN" | "BOOL" => extract::<bool>(row, ordinal, &name, "BOOLEAN")?
                .map(Value::Bool)
                .unwrap_or(Value::Null),
            "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" => {
                extract::<f64>(row, ordinal, &name, "FLOAT")?
                    .map(float_value)
                    .unwrap_or(Value::Null)
            }
            // Decimals: f64 first, text to keep precision otherwise
            "NUMERIC" | "DECIMAL" | "NUMBER" => match row.try_get::<Option<f64>, _>(ordinal) {
                Ok(v) => v.map(float_value).unwrap_or(Value::Null),
                Err(_) => extract::<String>(row, ordinal, &name, "DECIMAL")?
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            },
            "JSON" | "JSONB" | "VARIANT" | "OBJECT" | "ARRAY" => {
                match extract::<String>(row, ordinal, &name, "JSON")? {
                    Some(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
                    None => Value::Null,
                }
            }
            "BYTEA" | "BLOB" | "BINARY" | "VARBINARY" => {
                extract::<Vec<u8>>(row, ordinal, &name, "BINARY")?
                    .map(|bytes| Value::String(BASE64.encode(bytes)))
                    .unwrap_or(Value::Null)
            }
            "TIMESTAMP" | "TIMESTAMPTZ" | "TIMESTAMP_NTZ" | "TIMESTAMP_LTZ" | "TIMESTAMP_TZ"
            | "DATETIME" | "DATE" | "TIME" | "INTERVAL" | "UUID" => {
                extract::<String>(row, ordinal, &name, &type_name)?
                    .map(Value::String)
                    .unwrap_or(Value::Null)
            }
            _ => {
                return Err(GatewayError::QueryError(format!(
                    "Unsupported column type '{}' for column '{}'. \
                     Consider casting this column in your query: CAST({} AS VARCHAR)",
                    type_name, name, name
                )));
            }
        };

        out.insert(name, value);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn sqlite_rows(sql: &str) -> Vec<AnyRow> {
        sqlx::any::install_default_drivers();
        let pool = sqlx::AnyPool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(sql).fetch_all(&pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_converts_scalar_columns() {
        let rows = sqlite_rows("SELECT 7 AS n, 'abc' AS s, 1.5 AS f, NULL AS missing").await;
        let row = row_to_json(&rows[0]).unwrap();

        assert_eq!(row["n"], Value::from(7));
        assert_eq!(row["s"], Value::from("abc"));
        assert_eq!(row["f"], Value::from(1.5));
        assert_eq!(row["missing"], Value::Null);
    }

    #[tokio::test]
    async fn test_binary_is_base64() {
        let rows = sqlite_rows("SELECT X'DEADBEEF' AS b").await;
        let row = row_to_json(&rows[0]).unwrap();
        assert_eq!(row["b"], Value::from("3q2+7w=="));
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert_eq!(float_value(f64::NAN), Value::Null);
        assert_eq!(float_value(2.0), Value::from(2.0));
    }
}
