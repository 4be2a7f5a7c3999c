//! H2 dialect
//!
//! H2 has no `DATE_TRUNC` for every unit, so truncation formats the value
//! with a pattern that drops the finer fields and parses it back.

use std::sync::Arc;

use sqlgate_core::{
    AbstractExpression, Capability, ConnectionErrorKind, DateField, DialectOps, DriverDescriptor,
    ErrorPattern, GateError, IntervalUnit, ROOT_DRIVER_ID, Result, SafeOption, SemanticType,
    SessionOptions, SqlParserAdapter, Translator, TruncateUnit, quote_string_literal,
};
use sqlparser::dialect::GenericDialect;

pub const H2_DRIVER_ID: &str = "h2";

/// Administrative account every new H2 database is created with
pub const H2_ADMIN_USER: &str = "sa";

/// Build the H2 descriptor
pub fn h2_descriptor() -> Result<DriverDescriptor> {
    Ok(DriverDescriptor::new(H2_DRIVER_ID)
        .display_name("H2")
        .parent(ROOT_DRIVER_ID)
        .capability(Capability::FullJoin, false)
        .capability(Capability::Regex, true)
        .capability(Capability::PercentileAggregations, true)
        .capability(Capability::Actions, true)
        .capability(Capability::IntegralIntervals, true)
        .native_type("CHARACTER VARYING", SemanticType::Text)
        .native_type("CHARACTER LARGE OBJECT", SemanticType::Text)
        .native_type("VARCHAR_IGNORECASE", SemanticType::Text)
        .native_type("ENUM", SemanticType::Text)
        .native_type("TINYINT", SemanticType::Integer)
        .native_type("DECFLOAT", SemanticType::Decimal)
        .native_type("BINARY VARYING", SemanticType::Other)
        .native_type("JAVA_OBJECT", SemanticType::Other)
        .native_type("GEOMETRY", SemanticType::Other)
        .cast_type(SemanticType::Uuid, "UUID")
        .cast_type(SemanticType::Text, "CHARACTER VARYING")
        .default_admin_user(H2_ADMIN_USER)
        .safe_option(SafeOption::force("ACCESS_MODE_DATA", "r"))
        .safe_option(SafeOption::force("IFEXISTS", "TRUE"))
        .safe_option(SafeOption::strip("INIT"))
        .ops(DialectOps {
            truncate: Some(truncate),
            extract: Some(extract),
            interval_add: Some(interval_add),
            day_of_week: Some(day_of_week),
            session_setup: Some(session_setup),
            ..DialectOps::default()
        })
        .parser(Arc::new(SqlParserAdapter::new("h2", GenericDialect {})))
        .error_pattern(ErrorPattern::new(
            "(?i)implicitly relative to the current working directory",
            ConnectionErrorKind::ImplicitlyRelativeDbFilePath,
        )?)
        .error_pattern(ErrorPattern::new(
            r#"Database "[^"]*" not found"#,
            ConnectionErrorKind::DbFileNotFound,
        )?)
        .error_pattern(ErrorPattern::new(
            "Wrong user name or password",
            ConnectionErrorKind::UsernameOrPasswordIncorrect,
        )?))
}

fn truncate(t: &mut Translator<'_>, unit: TruncateUnit, expr: &AbstractExpression) -> Result<String> {
    let pattern = match unit {
        TruncateUnit::Minute => "yyyyMMddHHmm",
        TruncateUnit::Hour => "yyyyMMddHH",
        TruncateUnit::Day => "yyyyMMdd",
        TruncateUnit::Month => "yyyyMM",
        TruncateUnit::Quarter => {
            let year = t.translate(expr)?;
            let quarter = t.translate(expr)?;
            return Ok(format!(
                "PARSEDATETIME(CONCAT(YEAR({}), LPAD(CAST(QUARTER({}) * 3 - 2 AS VARCHAR), 2, '0')), 'yyyyMM')",
                year, quarter
            ));
        }
        TruncateUnit::Year => {
            // A bare year reparses as a DATE
            return Ok(format!(
                "CAST({} AS TIMESTAMP)",
                format_reparse(t, "yyyy", expr)?
            ));
        }
        other => {
            return Err(GateError::Translation(format!(
                "H2 cannot truncate to {:?}",
                other
            )));
        }
    };
    format_reparse(t, pattern, expr)
}

fn format_reparse(t: &mut Translator<'_>, pattern: &str, expr: &AbstractExpression) -> Result<String> {
    Ok(format!(
        "PARSEDATETIME(FORMATDATETIME({}, '{}'), '{}')",
        t.translate(expr)?,
        pattern,
        pattern
    ))
}

fn extract(t: &mut Translator<'_>, field: DateField, expr: &AbstractExpression) -> Result<String> {
    let function = match field {
        DateField::Minute => "MINUTE",
        DateField::Hour => "HOUR",
        DateField::Day => "DAY_OF_MONTH",
        DateField::Month => "MONTH",
        DateField::Quarter => "QUARTER",
        DateField::Year => "YEAR",
    };
    Ok(format!("{}({})", function, t.translate(expr)?))
}

fn day_of_week(t: &mut Translator<'_>, expr: &AbstractExpression) -> Result<String> {
    Ok(format!("ISO_DAY_OF_WEEK({})", t.translate(expr)?))
}

fn interval_add(
    t: &mut Translator<'_>,
    unit: IntervalUnit,
    amount: &AbstractExpression,
    expr: &AbstractExpression,
) -> Result<String> {
    let amount = t.translate(amount)?;
    let expr = t.translate(expr)?;
    Ok(format!("DATEADD('{}', {}, {})", unit.keyword(), amount, expr))
}

fn session_setup(options: &SessionOptions) -> Vec<String> {
    options
        .time_zone
        .iter()
        .map(|zone| format!("SET TIME ZONE {}", quote_string_literal(zone)))
        .collect()
}
