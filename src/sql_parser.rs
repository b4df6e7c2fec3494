//! SQL tokenization into a shallow statement tree
//!
//! Uses the sqlparser tokenizer in the dialect of the connected warehouse and
//! folds its token stream into statements made of words, parenthesized groups,
//! and other tokens. Whitespace and comments are dropped. Nothing here
//! validates SQL: input the tokenizer rejects degrades to a flat word stream
//! instead of an error.

use lazy_regex::{Lazy, Regex, lazy_regex};
use sqlparser::dialect::{
    Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect, SnowflakeDialect,
};
use sqlparser::tokenizer::{Token, Tokenizer};

static BARE_WORD: Lazy<Regex> = lazy_regex!(r"[A-Za-z_][A-Za-z0-9_$]*");

/// SQL dialect used to tokenize statements
///
/// Must match the server that executes the SQL: dialects disagree on string
/// escapes (`'\'` is a complete literal in PostgreSQL and SQLite but an open
/// one in MySQL and Snowflake), and a mismatch shifts literal boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SqlDialect {
    #[default]
    Snowflake,
    PostgreSql,
    MySql,
    Sqlite,
    Generic,
}

impl SqlDialect {
    /// Dialect for a DSN scheme; unknown schemes get the generic dialect
    ///
    /// # Examples
    /// ```
    /// # use warehouse_gateway::sql_parser::SqlDialect;
    /// assert_eq!(SqlDialect::from_scheme("postgresql"), SqlDialect::PostgreSql);
    /// assert_eq!(SqlDialect::from_scheme("SQLITE"), SqlDialect::Sqlite);
    /// ```
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "snowflake" => Self::Snowflake,
            "postgres" | "postgresql" => Self::PostgreSql,
            "mysql" | "mariadb" => Self::MySql,
            "sqlite" => Self::Sqlite,
            _ => Self::Generic,
        }
    }

    fn tokenizer_dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::Snowflake => Box::new(SnowflakeDialect {}),
            Self::PostgreSql => Box::new(PostgreSqlDialect {}),
            Self::MySql => Box::new(MySqlDialect {}),
            Self::Sqlite => Box::new(SQLiteDialect {}),
            Self::Generic => Box::new(GenericDialect {}),
        }
    }
}

/// One node of a parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlNode {
    /// Unquoted word: a keyword or a bare identifier, as written
    Word(String),
    /// Parenthesized group with its own top level
    Group(Vec<SqlNode>),
    /// Any other significant token (literal, quoted identifier, operator, comma)
    Other(Token),
}

impl SqlNode {
    /// True if this is an unquoted word equal to `keyword`, ignoring case
    pub fn is_word(&self, keyword: &str) -> bool {
        matches!(self, Self::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    /// Name carried by this node when it can act as an identifier
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Word(word) => Some(word),
            Self::Other(Token::Word(word)) => Some(&word.value),
            _ => None,
        }
    }
}

/// A single statement: the nodes at its top nesting level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStatement {
    nodes: Vec<SqlNode>,
}

/// One `name AS ( body )` entry of a WITH clause
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CteDefinition<'a> {
    pub name: &'a str,
    /// Top level of the parenthesized body
    pub body: &'a [SqlNode],
}

impl ParsedStatement {
    pub fn new(nodes: Vec<SqlNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[SqlNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Unquoted words at the statement's top level
    pub fn words(&self) -> impl Iterator<Item = &str> {
        top_level_words(&self.nodes)
    }

    /// CTE definitions introduced by the first top-level WITH
    ///
    /// Recognises `WITH [RECURSIVE] name [(cols)] AS [NOT] [MATERIALIZED] ( body ), ...`
    /// and stops at the first node that does not fit that shape.
    pub fn ctes(&self) -> Vec<CteDefinition<'_>> {
        let mut ctes = Vec::new();
        let Some(with_at) = self.nodes.iter().position(|n| n.is_word("WITH")) else {
            return ctes;
        };

        let mut rest = &self.nodes[with_at + 1..];
        if rest.first().is_some_and(|n| n.is_word("RECURSIVE")) {
            rest = &rest[1..];
        }

        while let Some((name_node, tail)) = rest.split_first() {
            let Some(name) = name_node.identifier() else {
                break;
            };
            rest = tail;

            // Optional column list
            if matches!(rest.first(), Some(SqlNode::Group(_))) {
                rest = &rest[1..];
            }

            if !rest.first().is_some_and(|n| n.is_word("AS")) {
                break;
            }
            rest = &rest[1..];

            while rest
                .first()
                .is_some_and(|n| n.is_word("NOT") || n.is_word("MATERIALIZED"))
            {
                rest = &rest[1..];
            }

            let Some((SqlNode::Group(body), tail)) = rest.split_first() else {
                break;
            };
            ctes.push(CteDefinition {
                name,
                body: body.as_slice(),
            });
            rest = tail;

            if matches!(rest.first(), Some(SqlNode::Other(Token::Comma))) {
                rest = &rest[1..];
            } else {
                break;
            }
        }

        ctes
    }
}

/// Unquoted words of `nodes` without descending into groups
pub fn top_level_words(nodes: &[SqlNode]) -> impl Iterator<Item = &str> {
    nodes.iter().filter_map(|node| match node {
        SqlNode::Word(word) => Some(word.as_str()),
        _ => None,
    })
}

/// Folds tokens into statements, tracking open parentheses
#[derive(Default)]
struct TreeBuilder {
    root: Vec<SqlNode>,
    open: Vec<Vec<SqlNode>>,
    statements: Vec<ParsedStatement>,
}

impl TreeBuilder {
    fn current(&mut self) -> &mut Vec<SqlNode> {
        match self.open.last_mut() {
            Some(group) => group,
            None => &mut self.root,
        }
    }

    fn push(&mut self, token: Token) {
        match token {
            Token::Whitespace(_) | Token::EOF => {}
            Token::SemiColon => self.finish_statement(),
            Token::LParen => self.open.push(Vec::new()),
            Token::RParen => match self.open.pop() {
                Some(group) => self.current().push(SqlNode::Group(group)),
                None => self.root.push(SqlNode::Other(Token::RParen)),
            },
            Token::Word(word) if word.quote_style.is_none() => {
                self.current().push(SqlNode::Word(word.value))
            }
            other => self.current().push(SqlNode::Other(other)),
        }
    }

    /// Close any groups left open and emit the statement if it has content
    fn finish_statement(&mut self) {
        while let Some(group) = self.open.pop() {
            self.current().push(SqlNode::Group(group));
        }
        let nodes = std::mem::take(&mut self.root);
        if !nodes.is_empty() {
            self.statements.push(ParsedStatement::new(nodes));
        }
    }

    fn finish(mut self) -> Vec<ParsedStatement> {
        self.finish_statement();
        self.statements
    }
}

/// Parse SQL text into statements
///
/// Semicolons at any depth end a statement. Comment-only or blank input yields
/// no statements.
///
/// # Examples
/// ```
/// # use warehouse_gateway::sql_parser::{SqlDialect, parse_statements};
/// let stmts = parse_statements("SELECT 1; INSERT INTO t VALUES ('a;b'); -- done", SqlDialect::Snowflake);
/// assert_eq!(stmts.len(), 2);
/// assert!(parse_statements("/* nothing */", SqlDialect::PostgreSql).is_empty());
/// ```
pub fn parse_statements(sql: &str, dialect: SqlDialect) -> Vec<ParsedStatement> {
    let dialect = dialect.tokenizer_dialect();
    match Tokenizer::new(&*dialect, sql).tokenize() {
        Ok(tokens) => {
            let mut builder = TreeBuilder::default();
            for token in tokens {
                builder.push(token);
            }
            builder.finish()
        }
        Err(e) => {
            log::debug!("SQL tokenizer rejected input, scanning words instead: {}", e);
            parse_unstructured(sql)
        }
    }
}

/// Flat fallback: split on `;` and keep every bare word
///
/// Comments and literals are not recognised here, so words inside them count
/// too. This over-reports rather than letting a `'--'` or `'/*'` literal hide
/// the statements after it.
fn parse_unstructured(sql: &str) -> Vec<ParsedStatement> {
    sql.split(';')
        .map(|chunk| {
            BARE_WORD
                .find_iter(chunk)
                .map(|m| SqlNode::Word(m.as_str().to_string()))
                .collect::<Vec<_>>()
        })
        .filter(|nodes| !nodes.is_empty())
        .map(ParsedStatement::new)
        .collect()
}

/// First word of the first statement, uppercased
///
/// # Examples
/// ```
/// # use warehouse_gateway::sql_parser::{SqlDialect, extract_first_keyword};
/// let dialect = SqlDialect::default();
/// assert_eq!(extract_first_keyword("  select * from users", dialect).as_deref(), Some("SELECT"));
/// assert_eq!(extract_first_keyword("-- comment\nINSERT INTO logs", dialect).as_deref(), Some("INSERT"));
/// assert_eq!(extract_first_keyword("-- only a comment", dialect), None);
/// ```
pub fn extract_first_keyword(sql: &str, dialect: SqlDialect) -> Option<String> {
    parse_statements(sql, dialect)
        .first()
        .and_then(|statement| statement.nodes().first())
        .and_then(|node| match node {
            SqlNode::Word(word) => Some(word.to_ascii_uppercase()),
            _ => None,
        })
}
