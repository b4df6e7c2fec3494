//! Write keyword tables used by the SQL write detector
//!
//! Three disjoint categories (data manipulation, data definition, data control)
//! and their union. The table is built once and shared by every detector.

use std::collections::HashSet;
use std::sync::LazyLock;

static STANDARD_TABLE: LazyLock<KeywordTable> = LazyLock::new(KeywordTable::new);

/// Class of SQL statement a write keyword belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeywordCategory {
    /// Row-level writes: INSERT, UPDATE, DELETE, MERGE, UPSERT
    DmlWrite,
    /// Schema changes: CREATE, ALTER, DROP, TRUNCATE
    Ddl,
    /// Privilege changes: GRANT, REVOKE
    Dcl,
}

impl KeywordCategory {
    /// Every category, in declaration order
    pub const ALL: [KeywordCategory; 3] = [Self::DmlWrite, Self::Ddl, Self::Dcl];

    /// Keywords belonging to this category, uppercase
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::DmlWrite => &["INSERT", "UPDATE", "DELETE", "MERGE", "UPSERT"],
            Self::Ddl => &["CREATE", "ALTER", "DROP", "TRUNCATE"],
            Self::Dcl => &["GRANT", "REVOKE"],
        }
    }
}

/// Immutable keyword → category lookup
///
/// Lookups are case-insensitive: candidates are uppercased before comparison.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    dml_write: HashSet<&'static str>,
    ddl: HashSet<&'static str>,
    dcl: HashSet<&'static str>,
    write: HashSet<&'static str>,
}

impl KeywordTable {
    fn new() -> Self {
        let collect = |category: KeywordCategory| -> HashSet<&'static str> {
            category.keywords().iter().copied().collect()
        };

        let dml_write = collect(KeywordCategory::DmlWrite);
        let ddl = collect(KeywordCategory::Ddl);
        let dcl = collect(KeywordCategory::Dcl);
        let write = dml_write
            .iter()
            .chain(ddl.iter())
            .chain(dcl.iter())
            .copied()
            .collect();

        Self {
            dml_write,
            ddl,
            dcl,
            write,
        }
    }

    /// Process-wide table, built on first use
    pub fn standard() -> &'static KeywordTable {
        &STANDARD_TABLE
    }

    pub fn dml_write_keywords(&self) -> &HashSet<&'static str> {
        &self.dml_write
    }

    pub fn ddl_keywords(&self) -> &HashSet<&'static str> {
        &self.ddl
    }

    pub fn dcl_keywords(&self) -> &HashSet<&'static str> {
        &self.dcl
    }

    /// Union of all three categories
    pub fn write_keywords(&self) -> &HashSet<&'static str> {
        &self.write
    }

    /// Canonical uppercase form of `word` if it is a write keyword
    ///
    /// ```
    /// # use warehouse_gateway::keywords::KeywordTable;
    /// let table = KeywordTable::standard();
    /// assert_eq!(table.write_keyword("insert"), Some("INSERT"));
    /// assert_eq!(table.write_keyword("select"), None);
    /// ```
    pub fn write_keyword(&self, word: &str) -> Option<&'static str> {
        let upper = word.to_ascii_uppercase();
        self.write.get(upper.as_str()).copied()
    }

    /// Category of `word`, if it is a write keyword
    pub fn category(&self, word: &str) -> Option<KeywordCategory> {
        let upper = word.to_ascii_uppercase();
        KeywordCategory::ALL.into_iter().find(|category| {
            let set = match category {
                KeywordCategory::DmlWrite => &self.dml_write,
                KeywordCategory::Ddl => &self.ddl,
                KeywordCategory::Dcl => &self.dcl,
            };
            set.contains(upper.as_str())
        })
    }
}
