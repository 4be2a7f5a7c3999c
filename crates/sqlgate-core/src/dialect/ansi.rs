//! Generic ANSI SQL, the root of every driver chain

use std::sync::Arc;

use sqlparser::dialect::GenericDialect;

use crate::{
    AbstractExpression, Capability, DateField, DialectOps, DriverDescriptor, GateError, IntervalUnit,
    Result, SemanticType, SessionOptions, SqlParserAdapter, Translator, TruncateUnit,
};

/// Id of the root driver
pub const ROOT_DRIVER_ID: &str = "sql";

/// Descriptor of the root driver; fills every dialect slot
pub fn ansi_descriptor() -> DriverDescriptor {
    DriverDescriptor::new(ROOT_DRIVER_ID)
        .display_name("ANSI SQL")
        .capability(Capability::FullJoin, true)
        .cast_type(SemanticType::Integer, "INTEGER")
        .cast_type(SemanticType::BigInteger, "BIGINT")
        .cast_type(SemanticType::Float, "DOUBLE PRECISION")
        .cast_type(SemanticType::Decimal, "DECIMAL")
        .cast_type(SemanticType::Boolean, "BOOLEAN")
        .cast_type(SemanticType::Text, "VARCHAR")
        .cast_type(SemanticType::Date, "DATE")
        .cast_type(SemanticType::Time, "TIME")
        .cast_type(SemanticType::DateTime, "TIMESTAMP")
        .cast_type(SemanticType::DateTimeWithZone, "TIMESTAMP WITH TIME ZONE")
        .ops(DialectOps {
            truncate: Some(truncate),
            extract: Some(extract),
            interval_add: Some(interval_add),
            day_of_week: Some(day_of_week),
            cast: Some(cast),
            placeholder: Some(placeholder),
            quote_identifier: Some(quote_identifier),
            regex_match: Some(regex_match),
            session_setup: Some(session_setup),
        })
        .parser(Arc::new(SqlParserAdapter::new("ansi", GenericDialect {})))
}

fn truncate(t: &mut Translator<'_>, unit: TruncateUnit, expr: &AbstractExpression) -> Result<String> {
    let unit = match unit {
        TruncateUnit::Minute => "minute",
        TruncateUnit::Hour => "hour",
        TruncateUnit::Day => "day",
        TruncateUnit::Week => "week",
        TruncateUnit::Month => "month",
        TruncateUnit::Quarter => "quarter",
        TruncateUnit::Year => "year",
        other => {
            return Err(GateError::Translation(format!(
                "{:?} is an extraction, not a truncation unit",
                other
            )));
        }
    };
    Ok(format!("DATE_TRUNC('{}', {})", unit, t.translate(expr)?))
}

fn extract(t: &mut Translator<'_>, field: DateField, expr: &AbstractExpression) -> Result<String> {
    Ok(format!("EXTRACT({} FROM {})", field.keyword(), t.translate(expr)?))
}

// DOW numbers Sunday as 0
fn day_of_week(t: &mut Translator<'_>, expr: &AbstractExpression) -> Result<String> {
    Ok(format!(
        "(MOD(CAST(EXTRACT(DOW FROM {}) AS INTEGER) + 6, 7) + 1)",
        t.translate(expr)?
    ))
}

fn interval_add(
    t: &mut Translator<'_>,
    unit: IntervalUnit,
    amount: &AbstractExpression,
    expr: &AbstractExpression,
) -> Result<String> {
    let expr = t.translate(expr)?;
    let amount = t.translate(amount)?;
    let interval = match unit {
        IntervalUnit::Millisecond => "INTERVAL '0.001' SECOND".to_string(),
        other => format!("INTERVAL '1' {}", other.keyword()),
    };
    Ok(format!("({} + ({}) * {})", expr, amount, interval))
}

fn cast(t: &mut Translator<'_>, native: &str, expr: &AbstractExpression) -> Result<String> {
    Ok(format!("CAST({} AS {})", t.translate(expr)?, native))
}

fn placeholder(_index: usize) -> String {
    "?".to_string()
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn regex_match(left: &str, right: &str) -> String {
    format!("REGEXP_LIKE({}, {})", left, right)
}

// Unknown backends get no session statements
fn session_setup(_options: &SessionOptions) -> Vec<String> {
    Vec::new()
}
