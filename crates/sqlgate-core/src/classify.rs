//! Lightweight statement classification
//!
//! The classifier does not understand SQL. It asks a [`NativeDialectParser`]
//! where the next statement ends and what kind of statement it is, and keeps
//! going over the remainder until the input is exhausted.

use std::fmt;
use std::ops::Range;

use serde::Serialize;
use sqlparser::dialect::{Dialect, GenericDialect};
use sqlparser::parser::Parser;

/// Coarse statement category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatementKind {
    /// Schema mutation (CREATE, DROP, ...)
    Ddl,
    /// Data mutation (INSERT, UPDATE, ...)
    Dml,
    /// Read-only query
    Dql,
    /// The parser could not determine what this is
    Unparseable,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatementKind::Ddl => "DDL",
            StatementKind::Dml => "DML",
            StatementKind::Dql => "DQL",
            StatementKind::Unparseable => "Unparseable",
        })
    }
}

/// One statement found in the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementClassification {
    pub kind: StatementKind,
    /// Statement class reported by the parser, e.g. `Query` or `DROP TABLE`
    pub class_name: String,
    /// Byte range of the statement in the classified input
    pub span: Range<usize>,
}

/// Result of parsing the statement at the start of some text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed { class_name: String, consumed: usize },
    Failed { consumed: usize, message: String },
}

impl ParseOutcome {
    /// Bytes of input the parser claims to have consumed
    pub fn consumed(&self) -> usize {
        match self {
            ParseOutcome::Parsed { consumed, .. } | ParseOutcome::Failed { consumed, .. } => {
                *consumed
            }
        }
    }
}

/// Adapter over a backend's own SQL parser
pub trait NativeDialectParser: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Parse the statement at the start of `text`
    ///
    /// `text` never starts with whitespace or comments.
    fn parse_one(&self, text: &str) -> ParseOutcome;
}

/// [`NativeDialectParser`] backed by `sqlparser`
///
/// Statement boundaries come from a quote- and comment-aware scan for `;`,
/// each unit is then parsed with the given `sqlparser` dialect.
pub struct SqlParserAdapter<D> {
    name: &'static str,
    dialect: D,
}

impl<D: Dialect> SqlParserAdapter<D> {
    pub fn new(name: &'static str, dialect: D) -> Self {
        Self { name, dialect }
    }
}

impl<D: Dialect + Send + Sync> NativeDialectParser for SqlParserAdapter<D> {
    fn name(&self) -> &str {
        self.name
    }

    fn parse_one(&self, text: &str) -> ParseOutcome {
        let consumed = statement_end(text);
        let unit = text[..consumed].trim_end_matches(';');

        match Parser::parse_sql(&self.dialect, unit) {
            Ok(statements) => match statements.first() {
                Some(statement) => ParseOutcome::Parsed {
                    class_name: class_name(statement),
                    consumed,
                },
                None => ParseOutcome::Failed {
                    consumed,
                    message: "no statement found".to_string(),
                },
            },
            Err(e) => ParseOutcome::Failed {
                consumed,
                message: e.to_string(),
            },
        }
    }
}

fn class_name(statement: &sqlparser::ast::Statement) -> String {
    if matches!(statement, sqlparser::ast::Statement::Query(_)) {
        return "Query".to_string();
    }

    let rendered = statement.to_string();
    let mut words = rendered
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_uppercase());
    let Some(head) = words.next() else {
        return "Unknown".to_string();
    };
    match head.as_str() {
        "CREATE" | "ALTER" | "DROP" => match words.next() {
            Some(object) => format!("{} {}", head, object),
            None => head,
        },
        _ => head,
    }
}

// RUNSCRIPT executes a script file that may hold any statement
const DDL_HEADS: &[&str] = &[
    "CREATE", "ALTER", "DROP", "TRUNCATE", "RENAME", "COMMENT", "GRANT", "REVOKE", "RUNSCRIPT",
];
const DQL_HEADS: &[&str] = &["QUERY", "SELECT", "WITH", "VALUES", "SHOW", "EXPLAIN"];

/// Category of a parser-reported statement class
pub fn kind_of_class(class_name: &str) -> StatementKind {
    let head = class_name
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if DDL_HEADS.contains(&head.as_str()) {
        StatementKind::Ddl
    } else if DQL_HEADS.contains(&head.as_str()) {
        StatementKind::Dql
    } else {
        StatementKind::Dml
    }
}

/// Class from the leading keywords of `text` when they start a schema mutation
fn schema_keyword_class(text: &str) -> Option<String> {
    let mut words = text
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_uppercase());
    let head = words.next()?;
    if !DDL_HEADS.contains(&head.as_str()) {
        return None;
    }
    match (head.as_str(), words.next()) {
        ("CREATE" | "ALTER" | "DROP", Some(object)) => Some(format!("{} {}", head, object)),
        _ => Some(head),
    }
}

/// Splits and classifies statements with a single parser
pub struct StatementClassifier<'p> {
    parser: &'p dyn NativeDialectParser,
}

impl<'p> StatementClassifier<'p> {
    pub fn new(parser: &'p dyn NativeDialectParser) -> Self {
        Self { parser }
    }

    pub fn classify(&self, sql: &str) -> Vec<StatementClassification> {
        classify_with(self.parser, sql)
    }

    /// Whether any statement in the sequence mutates the schema
    pub fn has_ddl(classifications: &[StatementClassification]) -> bool {
        classifications
            .iter()
            .any(|c| c.kind == StatementKind::Ddl)
    }
}

/// Classify with the generic ANSI parser
pub fn classify(sql: &str) -> Vec<StatementClassification> {
    classify_with(&SqlParserAdapter::new("ansi", GenericDialect {}), sql)
}

/// Classify every statement in `sql`
///
/// Each iteration consumes at least one byte. A parser that reports no
/// progress (or an offset outside the remaining text) ends classification
/// with a single `Unparseable` entry covering the rest of the input.
pub fn classify_with(parser: &dyn NativeDialectParser, sql: &str) -> Vec<StatementClassification> {
    let mut classifications = Vec::new();
    let mut offset = 0;

    loop {
        offset += skip_trivia(&sql[offset..]);
        if offset >= sql.len() {
            break;
        }

        let rest = &sql[offset..];
        let outcome = parser.parse_one(rest);
        let consumed = outcome.consumed();

        if consumed == 0 || consumed > rest.len() || !rest.is_char_boundary(consumed) {
            tracing::debug!(
                parser = parser.name(),
                offset,
                consumed,
                "parser made no usable progress, rest of input is unparseable"
            );
            classifications.push(StatementClassification {
                kind: StatementKind::Unparseable,
                class_name: "Unparseable".to_string(),
                span: offset..sql.len(),
            });
            break;
        }

        let classification = match outcome {
            ParseOutcome::Parsed { class_name, .. } => StatementClassification {
                kind: kind_of_class(&class_name),
                class_name,
                span: offset..offset + consumed,
            },
            ParseOutcome::Failed { message, .. } => match schema_keyword_class(&rest[..consumed]) {
                // Dialect-specific DDL the parser does not know is still DDL
                Some(class_name) => {
                    tracing::debug!(parser = parser.name(), offset, class = %class_name, error = %message, "classified by leading keyword");
                    StatementClassification {
                        kind: StatementKind::Ddl,
                        class_name,
                        span: offset..offset + consumed,
                    }
                }
                None => {
                    tracing::debug!(parser = parser.name(), offset, error = %message, "unparseable statement");
                    StatementClassification {
                        kind: StatementKind::Unparseable,
                        class_name: "Unparseable".to_string(),
                        span: offset..offset + consumed,
                    }
                }
            },
        };
        classifications.push(classification);
        offset += consumed;
    }

    classifications
}

/// Length of the leading whitespace, comments and empty statements
pub fn skip_trivia(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b if b.is_ascii_whitespace() || b == b';' => i += 1,
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = line_comment_end(bytes, i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = block_comment_end(bytes, i);
            }
            _ => break,
        }
    }
    i
}

/// Offset just past the first top-level `;`, or the text length
///
/// Semicolons inside string literals, quoted identifiers, comments and
/// dollar-quoted bodies do not end a statement.
pub fn statement_end(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => return i + 1,
            quote @ (b'\'' | b'"' | b'`') => i = quoted_end(bytes, i, quote),
            b'[' => i = quoted_end(bytes, i, b']'),
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = line_comment_end(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = block_comment_end(bytes, i),
            b'$' => i = dollar_quoted_end(bytes, i),
            _ => i += 1,
        }
    }
    bytes.len()
}

// Doubled quotes re-enter the quoted run on the next iteration.
fn quoted_end(bytes: &[u8], start: usize, close: u8) -> usize {
    bytes[start + 1..]
        .iter()
        .position(|b| *b == close)
        .map(|p| start + 1 + p + 1)
        .unwrap_or(bytes.len())
}

fn line_comment_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|p| start + p + 1)
        .unwrap_or(bytes.len())
}

fn block_comment_end(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map(|p| start + 2 + p + 2)
        .unwrap_or(bytes.len())
}

fn dollar_quoted_end(bytes: &[u8], start: usize) -> usize {
    let tag_len = bytes[start + 1..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    let tag_end = start + 1 + tag_len;
    if bytes.get(tag_end) != Some(&b'$') {
        // $1 style placeholder
        return start + 1;
    }
    let tag = &bytes[start..=tag_end];
    let body = tag_end + 1;
    bytes[body..]
        .windows(tag.len())
        .position(|w| w == tag)
        .map(|p| body + p + tag.len())
        .unwrap_or(bytes.len())
}
