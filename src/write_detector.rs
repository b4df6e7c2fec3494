//! Write-intent classification for SQL text
//!
//! Decides whether a batch of SQL statements mutates data, schema, or
//! privileges. Detection is keyword based over the statement tree produced by
//! [`crate::sql_parser`]:
//!
//! - the top level of every statement is scanned for write keywords
//! - the top level of every CTE body (`WITH name AS ( ... )`) is scanned too,
//!   which catches data-modifying CTEs such as `UPDATE ... RETURNING *`
//!
//! Neither scan descends further. A write nested inside a subquery of a CTE
//! body, inside a derived table, or inside a `WITH` nested in a CTE body is
//! outside the detection depth.
//!
//! The detector tokenizes in the dialect of the warehouse that will run the
//! SQL, so literal boundaries agree with the server's.

use std::collections::BTreeSet;

use crate::keywords::KeywordTable;
use crate::sql_parser::{ParsedStatement, SqlDialect, SqlNode, parse_statements, top_level_words};
use crate::types::WriteAnalysis;

/// Operation reported when a write was found inside a CTE body
pub const CTE_WRITE: &str = "CTE_WRITE";

/// Stateless classifier; cheap to copy and safe to share across tasks
#[derive(Debug, Clone, Copy)]
pub struct SqlWriteDetector {
    keywords: &'static KeywordTable,
    dialect: SqlDialect,
}

impl Default for SqlWriteDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlWriteDetector {
    pub fn new() -> Self {
        Self::with_dialect(SqlDialect::default())
    }

    pub fn with_dialect(dialect: SqlDialect) -> Self {
        Self {
            keywords: KeywordTable::standard(),
            dialect,
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Classify a batch of SQL statements
    ///
    /// # Examples
    /// ```
    /// # use warehouse_gateway::write_detector::SqlWriteDetector;
    /// let detector = SqlWriteDetector::new();
    ///
    /// let read = detector.analyze_query("SELECT * FROM users");
    /// assert!(!read.contains_write);
    ///
    /// let batch = detector.analyze_query("insert into t values (1); DROP TABLE t");
    /// assert!(batch.contains_write);
    /// assert!(batch.write_operations.contains("INSERT"));
    /// assert!(batch.write_operations.contains("DROP"));
    ///
    /// let cte = detector.analyze_query("WITH d AS (DELETE FROM t RETURNING *) SELECT * FROM d");
    /// assert!(cte.has_cte_write);
    /// assert!(cte.write_operations.contains("CTE_WRITE"));
    /// ```
    pub fn analyze_query(&self, sql: &str) -> WriteAnalysis {
        let mut analysis = WriteAnalysis::default();

        for statement in parse_statements(sql, self.dialect) {
            analysis
                .write_operations
                .extend(self.find_write_operations(&statement));
            if self.analyze_cte(&statement) {
                analysis.has_cte_write = true;
            }
        }

        if analysis.has_cte_write {
            analysis.write_operations.insert(CTE_WRITE.to_string());
        }
        analysis.contains_write = !analysis.write_operations.is_empty() || analysis.has_cte_write;

        log::trace!(
            "Classified SQL: contains_write={} operations=[{}]",
            analysis.contains_write,
            analysis.operations_display()
        );

        analysis
    }

    /// Write keywords at the statement's top level, uppercased
    ///
    /// Multi-word operations are matched by their leading verb, so
    /// `CREATE TABLE` and `CREATE VIEW` both report `CREATE`.
    pub fn find_write_operations(&self, statement: &ParsedStatement) -> BTreeSet<String> {
        self.scan_level(statement.nodes())
    }

    /// True if the statement's top level carries a WITH keyword
    pub fn has_cte(&self, statement: &ParsedStatement) -> bool {
        statement.words().any(|word| word.eq_ignore_ascii_case("WITH"))
    }

    /// True if some CTE body has a write keyword at its own top level
    pub fn analyze_cte(&self, statement: &ParsedStatement) -> bool {
        if !self.has_cte(statement) {
            return false;
        }

        statement.ctes().iter().any(|cte| {
            let writes = self.scan_level(cte.body);
            if !writes.is_empty() {
                log::debug!(
                    "CTE '{}' contains write operations: {:?}",
                    cte.name,
                    writes
                );
            }
            !writes.is_empty()
        })
    }

    fn scan_level(&self, nodes: &[SqlNode]) -> BTreeSet<String> {
        top_level_words(nodes)
            .filter_map(|word| self.keywords.write_keyword(word))
            .map(str::to_string)
            .collect()
    }
}
