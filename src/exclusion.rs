//! Exclusion-pattern filtering for metadata listings

use serde::{Deserialize, Serialize};

use crate::types::Row;

/// Substring patterns hiding databases, schemas and tables from listings
///
/// Matching is case-insensitive: `"temp"` hides `TEMP_DB` and `my_temp`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludePatterns {
    pub databases: Vec<String>,
    pub schemas: Vec<String>,
    pub tables: Vec<String>,
}

/// Which listing a pattern set applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Database,
    Schema,
    Table,
}

impl ObjectKind {
    /// INFORMATION_SCHEMA column holding the object name
    pub fn name_column(self) -> &'static str {
        match self {
            Self::Database => "DATABASE_NAME",
            Self::Schema => "SCHEMA_NAME",
            Self::Table => "TABLE_NAME",
        }
    }
}

impl ExcludePatterns {
    pub fn patterns(&self, kind: ObjectKind) -> &[String] {
        match kind {
            ObjectKind::Database => &self.databases,
            ObjectKind::Schema => &self.schemas,
            ObjectKind::Table => &self.tables,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty() && self.schemas.is_empty() && self.tables.is_empty()
    }

    /// Whether `name` matches any pattern of `kind`
    pub fn is_excluded(&self, kind: ObjectKind, name: &str) -> bool {
        let name = name.to_lowercase();
        self.patterns(kind)
            .iter()
            .any(|pattern| name.contains(&pattern.to_lowercase()))
    }

    /// Drop rows whose name column matches a pattern
    ///
    /// Rows without a string name column are kept.
    pub fn filter_rows(&self, kind: ObjectKind, rows: Vec<Row>) -> Vec<Row> {
        if self.patterns(kind).is_empty() {
            return rows;
        }

        let column = kind.name_column();
        let before = rows.len();
        let kept: Vec<Row> = rows
            .into_iter()
            .filter(|row| match row.get(column).and_then(|v| v.as_str()) {
                Some(name) => !self.is_excluded(kind, name),
                None => true,
            })
            .collect();

        if kept.len() != before {
            log::debug!(
                "Excluded {} of {} rows by {} patterns",
                before - kept.len(),
                before,
                column
            );
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(column: &str, names: &[&str]) -> Vec<Row> {
        names
            .iter()
            .map(|name| {
                let mut row = Row::new();
                row.insert(column.to_string(), json!(name));
                row
            })
            .collect()
    }

    fn names(column: &str, rows: &[Row]) -> Vec<String> {
        rows.iter()
            .filter_map(|r| r.get(column).and_then(|v| v.as_str()).map(str::to_string))
            .collect()
    }

    #[test]
    fn test_database_filtering_is_case_insensitive() {
        let patterns = ExcludePatterns {
            databases: vec!["temp".into(), "staging".into()],
            ..Default::default()
        };

        let input = rows(
            "DATABASE_NAME",
            &["PROD_DB", "TEST_DB", "TEMP_DATABASE", "STAGING_DB"],
        );
        let kept = patterns.filter_rows(ObjectKind::Database, input);
        assert_eq!(names("DATABASE_NAME", &kept), vec!["PROD_DB", "TEST_DB"]);
    }

    #[test]
    fn test_patterns_only_apply_to_their_kind() {
        let patterns = ExcludePatterns {
            schemas: vec!["information".into()],
            ..Default::default()
        };

        let input = rows("TABLE_NAME", &["INFORMATION_LOG"]);
        assert_eq!(patterns.filter_rows(ObjectKind::Table, input).len(), 1);

        let input = rows("SCHEMA_NAME", &["PUBLIC", "INFORMATION_SCHEMA"]);
        let kept = patterns.filter_rows(ObjectKind::Schema, input);
        assert_eq!(names("SCHEMA_NAME", &kept), vec!["PUBLIC"]);
    }

    #[test]
    fn test_rows_without_name_are_kept() {
        let patterns = ExcludePatterns {
            tables: vec!["x".into()],
            ..Default::default()
        };
        let kept = patterns.filter_rows(ObjectKind::Table, vec![Row::new()]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let patterns: ExcludePatterns = serde_json::from_str(r#"{"tables": ["tmp"]}"#).unwrap();
        assert!(patterns.databases.is_empty());
        assert_eq!(patterns.tables, vec!["tmp"]);
        assert!(!patterns.is_empty());
    }
}
