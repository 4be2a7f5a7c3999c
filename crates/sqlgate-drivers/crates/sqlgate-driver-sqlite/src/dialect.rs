//! SQLite dialect
//!
//! SQLite has no native timestamp type. Timestamps are ISO-8601 text and all
//! temporal operations go through `strftime` and the date modifiers of
//! `datetime`.

use std::sync::Arc;

use sqlgate_core::{
    AbstractExpression, ConnectionErrorKind, DateField, DialectOps, DriverDescriptor,
    DriverRegistry, ErrorPattern, GateError, IntervalUnit, ROOT_DRIVER_ID, Result, SemanticType,
    SessionOptions, SqlParserAdapter, Translator, TruncateUnit, ansi_descriptor,
};
use sqlparser::dialect::SQLiteDialect;

pub const SQLITE_DRIVER_ID: &str = "sqlite";

/// Build the SQLite descriptor
pub fn sqlite_descriptor() -> Result<DriverDescriptor> {
    Ok(DriverDescriptor::new(SQLITE_DRIVER_ID)
        .display_name("SQLite")
        .parent(ROOT_DRIVER_ID)
        .native_type("INT", SemanticType::Integer)
        .native_type("INTEGER", SemanticType::BigInteger)
        .native_type("REAL", SemanticType::Float)
        .native_type("NUMERIC", SemanticType::Decimal)
        .native_type("TEXT", SemanticType::Text)
        .native_type("DATETIME", SemanticType::DateTime)
        .native_type("DYNAMIC", SemanticType::Other)
        .cast_type(SemanticType::Integer, "INTEGER")
        .cast_type(SemanticType::BigInteger, "INTEGER")
        .cast_type(SemanticType::Float, "REAL")
        .cast_type(SemanticType::Decimal, "NUMERIC")
        .cast_type(SemanticType::Boolean, "INTEGER")
        .cast_type(SemanticType::Text, "TEXT")
        .cast_type(SemanticType::Date, "DATE")
        .cast_type(SemanticType::Time, "TIME")
        .cast_type(SemanticType::DateTime, "DATETIME")
        .cast_type(SemanticType::DateTimeWithZone, "DATETIME")
        .ops(DialectOps {
            truncate: Some(truncate),
            extract: Some(extract),
            interval_add: Some(interval_add),
            day_of_week: Some(day_of_week),
            cast: Some(cast),
            session_setup: Some(session_setup),
            ..DialectOps::default()
        })
        .parser(Arc::new(SqlParserAdapter::new("sqlite", SQLiteDialect {})))
        .error_pattern(ErrorPattern::new(
            "unable to open database file",
            ConnectionErrorKind::DbFileNotFound,
        )?)
        .error_pattern(ErrorPattern::new(
            "Parent directory does not exist",
            ConnectionErrorKind::DbFileNotFound,
        )?))
}

/// The root and SQLite drivers alone, for resolving declared column types
pub(crate) fn type_registry() -> Result<DriverRegistry> {
    let mut registry = DriverRegistry::new(ansi_descriptor())?;
    registry.register(sqlite_descriptor()?)?;
    Ok(registry)
}

fn truncate(t: &mut Translator<'_>, unit: TruncateUnit, expr: &AbstractExpression) -> Result<String> {
    let format = match unit {
        TruncateUnit::Minute => "%Y-%m-%d %H:%M:00",
        TruncateUnit::Hour => "%Y-%m-%d %H:00:00",
        TruncateUnit::Day => "%Y-%m-%d 00:00:00",
        TruncateUnit::Month => "%Y-%m-01 00:00:00",
        TruncateUnit::Quarter => {
            let year = t.translate(expr)?;
            let month = t.translate(expr)?;
            return Ok(format!(
                "printf('%s-%02d-01 00:00:00', strftime('%Y', {}), (CAST(strftime('%m', {}) AS INTEGER) + 2) / 3 * 3 - 2)",
                year, month
            ));
        }
        TruncateUnit::Year => "%Y-01-01 00:00:00",
        other => {
            return Err(GateError::Translation(format!(
                "SQLite cannot truncate to {:?}",
                other
            )));
        }
    };
    Ok(format!("strftime('{}', {})", format, t.translate(expr)?))
}

fn extract(t: &mut Translator<'_>, field: DateField, expr: &AbstractExpression) -> Result<String> {
    let format = match field {
        DateField::Minute => "%M",
        DateField::Hour => "%H",
        DateField::Day => "%d",
        DateField::Month => "%m",
        DateField::Year => "%Y",
        DateField::Quarter => {
            return Ok(format!(
                "((CAST(strftime('%m', {}) AS INTEGER) + 2) / 3)",
                t.translate(expr)?
            ));
        }
    };
    Ok(format!(
        "CAST(strftime('{}', {}) AS INTEGER)",
        format,
        t.translate(expr)?
    ))
}

// %w numbers Sunday as 0
fn day_of_week(t: &mut Translator<'_>, expr: &AbstractExpression) -> Result<String> {
    Ok(format!(
        "((CAST(strftime('%w', {}) AS INTEGER) + 6) % 7 + 1)",
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
    let modifier = match unit {
        IntervalUnit::Millisecond => format!("(({}) / 1000.0) || ' seconds'", amount),
        IntervalUnit::Second => format!("({}) || ' seconds'", amount),
        IntervalUnit::Minute => format!("({}) || ' minutes'", amount),
        IntervalUnit::Hour => format!("({}) || ' hours'", amount),
        IntervalUnit::Day => format!("({}) || ' days'", amount),
        IntervalUnit::Month => format!("({}) || ' months'", amount),
        IntervalUnit::Year => format!("({}) || ' years'", amount),
        IntervalUnit::Week => format!("(({}) * 7) || ' days'", amount),
        IntervalUnit::Quarter => format!("(({}) * 3) || ' months'", amount),
    };
    match unit {
        // Keep fractional seconds
        IntervalUnit::Millisecond | IntervalUnit::Second => Ok(format!(
            "strftime('%Y-%m-%d %H:%M:%f', {}, {})",
            expr, modifier
        )),
        _ => Ok(format!("datetime({}, {})", expr, modifier)),
    }
}

fn cast(t: &mut Translator<'_>, native: &str, expr: &AbstractExpression) -> Result<String> {
    let expr = t.translate(expr)?;
    match native {
        "DATE" => Ok(format!("date({})", expr)),
        "TIME" => Ok(format!("time({})", expr)),
        "DATETIME" => Ok(format!("datetime({})", expr)),
        other => Ok(format!("CAST({} AS {})", expr, other)),
    }
}

fn session_setup(options: &SessionOptions) -> Vec<String> {
    if options.read_only {
        vec!["PRAGMA query_only = ON".to_string()]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlgate_core::{
        Capability, DriverRegistry, TranslateOptions, Value, ansi_descriptor,
    };

    fn registry() -> DriverRegistry {
        let mut registry = DriverRegistry::new(ansi_descriptor()).unwrap();
        registry.register(sqlite_descriptor().unwrap()).unwrap();
        registry
    }

    fn compile(registry: &DriverRegistry, expr: &AbstractExpression) -> (String, Vec<Value>) {
        let driver = registry.resolve(SQLITE_DRIVER_ID).unwrap();
        let statement = Translator::new(driver, TranslateOptions::default())
            .compile(expr)
            .unwrap();
        (statement.dialect_sql, statement.parameters)
    }

    #[test]
    fn test_truncate_slot_rejects_extraction_units() {
        let registry = registry();
        let sqlite = registry.resolve(SQLITE_DRIVER_ID).unwrap();
        let truncate = sqlite.op(|ops| ops.truncate).unwrap();
        let mut translator = Translator::new(sqlite, TranslateOptions::default());
        for unit in [TruncateUnit::HourOfDay, TruncateUnit::DayOfWeek, TruncateUnit::Week] {
            let err = truncate(&mut translator, unit, &AbstractExpression::column("ts")).unwrap_err();
            assert!(matches!(err, GateError::Translation(_)), "{unit:?}");
        }
    }

    #[test]
    fn test_inherits_placeholder_and_quoting_from_root() {
        let registry = registry();
        let (sql, params) = compile(
            &registry,
            &AbstractExpression::truncate(
                TruncateUnit::Month,
                AbstractExpression::qualified_column("orders", "created_at"),
            ),
        );
        assert_eq!(sql, "strftime('%Y-%m-01 00:00:00', \"orders\".\"created_at\")");
        assert!(params.is_empty());

        let driver = registry.resolve(SQLITE_DRIVER_ID).unwrap();
        assert!(driver.capability(Capability::FullJoin));
        assert!(!driver.capability(Capability::Regex));
        assert!(!driver.capability(Capability::IntegralIntervals));
    }

    #[test]
    fn test_quarter_truncation_binds_each_occurrence() {
        let registry = registry();
        let (sql, params) = compile(
            &registry,
            &AbstractExpression::truncate(
                TruncateUnit::Quarter,
                AbstractExpression::literal("2024-05-15 13:45:00"),
            ),
        );
        assert_eq!(
            sql,
            "printf('%s-%02d-01 00:00:00', strftime('%Y', ?), (CAST(strftime('%m', ?) AS INTEGER) + 2) / 3 * 3 - 2)"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_interval_units() {
        let registry = registry();
        let column = AbstractExpression::column("ts");
        let (sql, _) = compile(
            &registry,
            &AbstractExpression::interval_add(IntervalUnit::Quarter, AbstractExpression::literal(2i64), column.clone()),
        );
        assert_eq!(sql, "datetime(\"ts\", (6) || ' months')");

        let (sql, _) = compile(
            &registry,
            &AbstractExpression::interval_add(IntervalUnit::Millisecond, AbstractExpression::literal(250i64), column),
        );
        assert_eq!(
            sql,
            "strftime('%Y-%m-%d %H:%M:%f', \"ts\", ((250) / 1000.0) || ' seconds')"
        );
    }

    #[test]
    fn test_casts_use_date_functions() {
        let registry = registry();
        let (sql, _) = compile(
            &registry,
            &AbstractExpression::cast(SemanticType::Date, AbstractExpression::column("ts")),
        );
        assert_eq!(sql, "date(\"ts\")");

        let (sql, _) = compile(
            &registry,
            &AbstractExpression::cast(SemanticType::Decimal, AbstractExpression::column("v")),
        );
        assert_eq!(sql, "CAST(\"v\" AS NUMERIC)");
    }

    #[test]
    fn test_type_map_overrides_and_falls_back() {
        let registry = registry();
        let driver = registry.resolve(SQLITE_DRIVER_ID).unwrap();
        assert_eq!(driver.semantic_type("integer"), SemanticType::BigInteger);
        assert_eq!(driver.semantic_type("DATETIME"), SemanticType::DateTime);
        assert_eq!(driver.semantic_type("VARCHAR(20)"), SemanticType::Text);
    }

    #[test]
    fn test_read_only_session() {
        let registry = registry();
        let driver = registry.resolve(SQLITE_DRIVER_ID).unwrap();
        assert_eq!(
            driver.session_setup(&SessionOptions::default()),
            vec!["PRAGMA query_only = ON".to_string()]
        );
        let writable = SessionOptions {
            read_only: false,
            time_zone: Some("UTC".to_string()),
        };
        assert!(driver.session_setup(&writable).is_empty());
    }
}
