//! PostgreSQL dialect
//!
//! PostgreSQL understands the ANSI root's `DATE_TRUNC` and interval syntax
//! natively; only placeholders, regex matching and a few result types differ.

use std::sync::Arc;

use sqlgate_core::{
    AbstractExpression, Capability, ConnectionErrorKind, DateField, DialectOps, DriverDescriptor,
    DriverRegistry, ErrorPattern, ROOT_DRIVER_ID, Result, SemanticType, SessionOptions,
    SqlParserAdapter, Translator, ansi_descriptor, quote_string_literal,
};
use sqlparser::dialect::PostgreSqlDialect;

pub const POSTGRES_DRIVER_ID: &str = "postgres";

pub fn postgres_descriptor() -> Result<DriverDescriptor> {
    Ok(DriverDescriptor::new(POSTGRES_DRIVER_ID)
        .display_name("PostgreSQL")
        .parent(ROOT_DRIVER_ID)
        .capability(Capability::Regex, true)
        .capability(Capability::PercentileAggregations, true)
        .capability(Capability::Actions, true)
        // Names as reported in the wire protocol
        .native_type("int2", SemanticType::Integer)
        .native_type("int4", SemanticType::Integer)
        .native_type("int8", SemanticType::BigInteger)
        .native_type("float4", SemanticType::Float)
        .native_type("float8", SemanticType::Float)
        .native_type("bpchar", SemanticType::Text)
        .native_type("name", SemanticType::Text)
        .native_type("citext", SemanticType::Text)
        .native_type("jsonb", SemanticType::Other)
        .native_type("bytea", SemanticType::Other)
        .cast_type(SemanticType::Text, "TEXT")
        .cast_type(SemanticType::Uuid, "UUID")
        .cast_type(SemanticType::DateTimeWithZone, "TIMESTAMPTZ")
        .ops(DialectOps {
            extract: Some(extract),
            day_of_week: Some(day_of_week),
            placeholder: Some(placeholder),
            regex_match: Some(regex_match),
            session_setup: Some(session_setup),
            ..DialectOps::default()
        })
        .parser(Arc::new(SqlParserAdapter::new("postgres", PostgreSqlDialect {})))
        .error_pattern(ErrorPattern::new(
            "password authentication failed for user",
            ConnectionErrorKind::UsernameOrPasswordIncorrect,
        )?)
        .error_pattern(ErrorPattern::new(
            r#"database "[^"]*" does not exist"#,
            ConnectionErrorKind::DbFileNotFound,
        )?))
}

// EXTRACT returns numeric since PostgreSQL 14
/// The root and PostgreSQL drivers alone, for resolving wire type names
pub(crate) fn type_registry() -> Result<DriverRegistry> {
    let mut registry = DriverRegistry::new(ansi_descriptor())?;
    registry.register(postgres_descriptor()?)?;
    Ok(registry)
}

fn extract(t: &mut Translator<'_>, field: DateField, expr: &AbstractExpression) -> Result<String> {
    Ok(format!(
        "CAST(EXTRACT({} FROM {}) AS INTEGER)",
        field.keyword(),
        t.translate(expr)?
    ))
}

fn day_of_week(t: &mut Translator<'_>, expr: &AbstractExpression) -> Result<String> {
    Ok(format!(
        "CAST(EXTRACT(ISODOW FROM {}) AS INTEGER)",
        t.translate(expr)?
    ))
}

fn placeholder(index: usize) -> String {
    format!("${}", index)
}

fn regex_match(left: &str, right: &str) -> String {
    format!("({} ~ {})", left, right)
}

fn session_setup(options: &SessionOptions) -> Vec<String> {
    let mut statements = Vec::new();
    if options.read_only {
        statements.push("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY".to_string());
    }
    if let Some(zone) = &options.time_zone {
        statements.push(format!("SET TIME ZONE {}", quote_string_literal(zone)));
    }
    statements
}
