use super::*;
use crate::{DialectOps, DriverDescriptor, DriverRegistry, SemanticType};
use pretty_assertions::assert_eq;

fn dollar_placeholder(index: usize) -> String {
    format!("${}", index)
}

fn registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new(ansi_descriptor()).unwrap();
    registry
        .register(
            DriverDescriptor::new("integral")
                .parent(ROOT_DRIVER_ID)
                .capability(Capability::IntegralIntervals, true),
        )
        .unwrap();
    registry
        .register(
            DriverDescriptor::new("numbered")
                .parent(ROOT_DRIVER_ID)
                .capability(Capability::Regex, true)
                .ops(DialectOps {
                    placeholder: Some(dollar_placeholder),
                    ..DialectOps::default()
                }),
        )
        .unwrap();
    registry
}

fn translate(registry: &DriverRegistry, driver: &str, expr: &AbstractExpression) -> Result<String> {
    let mut translator = Translator::new(registry.resolve(driver)?, TranslateOptions::default());
    translator.translate(expr)
}

fn ts() -> AbstractExpression {
    AbstractExpression::column("ts")
}

#[test]
fn test_native_truncation_on_root() {
    let registry = registry();
    let sql = translate(
        &registry,
        "sql",
        &AbstractExpression::truncate(TruncateUnit::Month, AbstractExpression::qualified_column("o", "ts")),
    )
    .unwrap();
    assert_eq!(sql, r#"DATE_TRUNC('month', "o"."ts")"#);
}

#[test]
fn test_root_truncate_slot_rejects_extraction_units() {
    let registry = registry();
    let root = registry.resolve("sql").unwrap();
    let truncate = root.op(|ops| ops.truncate).unwrap();
    let mut translator = Translator::new(root, TranslateOptions::default());
    let err = truncate(&mut translator, TruncateUnit::MonthOfYear, &ts()).unwrap_err();
    assert!(matches!(err, GateError::Translation(_)));
}

#[test]
fn test_extraction_units_use_field_extraction() {
    let registry = registry();
    let sql = translate(
        &registry,
        "sql",
        &AbstractExpression::truncate(TruncateUnit::QuarterOfYear, ts()),
    )
    .unwrap();
    assert_eq!(sql, r#"EXTRACT(QUARTER FROM "ts")"#);
}

#[test]
fn test_week_truncation_is_rewritten() {
    let registry = registry();
    let sql = translate(&registry, "sql", &AbstractExpression::truncate(TruncateUnit::Week, ts()))
        .unwrap();
    assert_eq!(
        sql,
        concat!(
            r#"(DATE_TRUNC('day', "ts") + ((1 - (MOD(CAST(EXTRACT(DOW FROM "ts") AS INTEGER) + 6, 7) + 1)))"#,
            " * INTERVAL '1' DAY)"
        )
    );
}

#[test]
fn test_day_of_week_respects_week_start() {
    let registry = registry();
    let expr = AbstractExpression::truncate(TruncateUnit::DayOfWeek, ts());

    let monday = translate(&registry, "sql", &expr).unwrap();
    assert_eq!(monday, r#"(MOD(CAST(EXTRACT(DOW FROM "ts") AS INTEGER) + 6, 7) + 1)"#);

    let mut translator = Translator::new(
        registry.resolve("sql").unwrap(),
        TranslateOptions {
            week_start: Weekday::Sun,
        },
    );
    let sunday = translator.translate(&expr).unwrap();
    assert_eq!(sunday, format!("((({}) + 0) % 7 + 1)", monday));
}

#[test]
fn test_quarter_and_week_intervals_are_normalized() {
    let registry = registry();
    let quarter = translate(
        &registry,
        "sql",
        &AbstractExpression::interval_add(IntervalUnit::Quarter, AbstractExpression::literal(2i64), ts()),
    )
    .unwrap();
    assert_eq!(quarter, r#"("ts" + (6) * INTERVAL '1' MONTH)"#);

    let week = translate(
        &registry,
        "sql",
        &AbstractExpression::interval_add(IntervalUnit::Week, AbstractExpression::column("n"), ts()),
    )
    .unwrap();
    assert_eq!(week, r#"("ts" + (("n" * 7)) * INTERVAL '1' DAY)"#);
}

#[test]
fn test_scaled_interval_overflow_is_a_translation_error() {
    let registry = registry();
    for (unit, amount) in [
        (IntervalUnit::Quarter, i64::MAX / 2),
        (IntervalUnit::Week, i64::MIN / 3),
    ] {
        let err = Translator::new(registry.resolve("sql").unwrap(), TranslateOptions::default())
            .compile(&AbstractExpression::interval_add(
                unit,
                AbstractExpression::literal(amount),
                ts(),
            ))
            .unwrap_err();
        assert!(matches!(err, GateError::Translation(_)), "{unit}");
    }
}

#[test]
fn test_integral_intervals_cascade_fractional_amounts() {
    let registry = registry();
    let integral = registry.resolve("integral").unwrap();

    let (unit, amount) =
        normalize_interval(integral, IntervalUnit::Second, &AbstractExpression::literal(1.5)).unwrap();
    assert_eq!(unit, IntervalUnit::Millisecond);
    assert_eq!(amount, AbstractExpression::literal(1500i64));

    let (unit, amount) =
        normalize_interval(integral, IntervalUnit::Day, &AbstractExpression::literal(1.5)).unwrap();
    assert_eq!(unit, IntervalUnit::Hour);
    assert_eq!(amount, AbstractExpression::literal(36i64));

    let (unit, amount) =
        normalize_interval(integral, IntervalUnit::Year, &AbstractExpression::literal(0.5)).unwrap();
    assert_eq!(unit, IntervalUnit::Month);
    assert_eq!(amount, AbstractExpression::literal(6i64));

    let (unit, amount) =
        normalize_interval(integral, IntervalUnit::Hour, &AbstractExpression::literal(3.0)).unwrap();
    assert_eq!(unit, IntervalUnit::Hour);
    assert_eq!(amount, AbstractExpression::literal(3i64));
}

#[test]
fn test_fractional_month_is_rejected_on_integral_backends() {
    let registry = registry();
    let integral = registry.resolve("integral").unwrap();

    let err = normalize_interval(integral, IntervalUnit::Month, &AbstractExpression::literal(1.5))
        .unwrap_err();
    assert!(matches!(err, GateError::Translation(_)));

    let err = normalize_interval(
        integral,
        IntervalUnit::Millisecond,
        &AbstractExpression::literal(0.25),
    )
    .unwrap_err();
    assert!(matches!(err, GateError::Translation(_)));
}

#[test]
fn test_computed_seconds_become_milliseconds_on_integral_backends() {
    let registry = registry();
    let amount = AbstractExpression::column("secs");

    let (unit, scaled) =
        normalize_interval(registry.resolve("integral").unwrap(), IntervalUnit::Second, &amount)
            .unwrap();
    assert_eq!(unit, IntervalUnit::Millisecond);
    assert_eq!(
        scaled,
        AbstractExpression::binary(
            BinaryOperator::Multiply,
            amount.clone(),
            AbstractExpression::literal(1000i64)
        )
    );

    let (unit, untouched) =
        normalize_interval(registry.resolve("sql").unwrap(), IntervalUnit::Second, &amount).unwrap();
    assert_eq!(unit, IntervalUnit::Second);
    assert_eq!(untouched, amount);
}

#[test]
fn test_fractional_amounts_pass_through_elsewhere() {
    let registry = registry();
    let (unit, amount) = normalize_interval(
        registry.resolve("sql").unwrap(),
        IntervalUnit::Second,
        &AbstractExpression::literal(1.5),
    )
    .unwrap();
    assert_eq!(unit, IntervalUnit::Second);
    assert_eq!(amount, AbstractExpression::literal(1.5));
}

#[test]
fn test_literals_inline_numbers_and_bind_text() {
    let registry = registry();
    let translator = Translator::new(registry.resolve("sql").unwrap(), TranslateOptions::default());
    let expr = AbstractExpression::binary(
        BinaryOperator::And,
        AbstractExpression::binary(
            BinaryOperator::Eq,
            AbstractExpression::column("name"),
            AbstractExpression::literal("alice"),
        ),
        AbstractExpression::binary(
            BinaryOperator::Gt,
            AbstractExpression::column("score"),
            AbstractExpression::literal(2.5),
        ),
    );
    let compiled = translator.compile(&expr).unwrap();
    assert_eq!(compiled.dialect_sql, r#"(("name" = ?) AND ("score" > 2.5))"#);
    assert_eq!(compiled.parameters, vec![Value::String("alice".into())]);
}

#[test]
fn test_numbered_placeholders_follow_emission_order() {
    let registry = registry();
    let translator =
        Translator::new(registry.resolve("numbered").unwrap(), TranslateOptions::default());
    let expr = AbstractExpression::binary(
        BinaryOperator::Or,
        AbstractExpression::binary(
            BinaryOperator::Eq,
            AbstractExpression::column("a"),
            AbstractExpression::literal("x"),
        ),
        AbstractExpression::binary(
            BinaryOperator::Eq,
            AbstractExpression::column("b"),
            AbstractExpression::literal("y"),
        ),
    );
    let compiled = translator.compile(&expr).unwrap();
    assert_eq!(compiled.dialect_sql, r#"(("a" = $1) OR ("b" = $2))"#);
    assert_eq!(
        compiled.parameters,
        vec![Value::String("x".into()), Value::String("y".into())]
    );
}

#[test]
fn test_cast_uses_native_vocabulary() {
    let registry = registry();
    let sql = translate(
        &registry,
        "integral",
        &AbstractExpression::cast(SemanticType::Float, AbstractExpression::column("n")),
    )
    .unwrap();
    assert_eq!(sql, r#"CAST("n" AS DOUBLE PRECISION)"#);

    let err = translate(
        &registry,
        "sql",
        &AbstractExpression::cast(SemanticType::Uuid, AbstractExpression::column("id")),
    )
    .unwrap_err();
    assert!(matches!(err, GateError::Translation(_)));
}

#[test]
fn test_regex_requires_capability() {
    let registry = registry();
    let expr = AbstractExpression::binary(
        BinaryOperator::RegexMatch,
        AbstractExpression::column("name"),
        AbstractExpression::literal("^a"),
    );

    let err = translate(&registry, "sql", &expr).unwrap_err();
    assert!(matches!(err, GateError::NotSupported(_)));

    let sql = translate(&registry, "numbered", &expr).unwrap();
    assert_eq!(sql, r#"REGEXP_LIKE("name", $1)"#);
}

#[test]
fn test_function_names_must_be_identifiers() {
    let registry = registry();
    let ok = translate(
        &registry,
        "sql",
        &AbstractExpression::unary_fn("lower", AbstractExpression::column("name")),
    )
    .unwrap();
    assert_eq!(ok, r#"lower("name")"#);

    let err = translate(
        &registry,
        "sql",
        &AbstractExpression::unary_fn("lower(1); DROP TABLE t; --", AbstractExpression::column("name")),
    )
    .unwrap_err();
    assert!(matches!(err, GateError::Translation(_)));
}

#[test]
fn test_non_finite_numbers_are_rejected() {
    let registry = registry();
    let err = translate(&registry, "sql", &AbstractExpression::literal(f64::NAN)).unwrap_err();
    assert!(matches!(err, GateError::Translation(_)));
}

#[test]
fn test_quarter_start_for_every_month() {
    let starts: Vec<u32> = (1..=12).map(quarter_start_month).collect();
    assert_eq!(starts, vec![1, 1, 1, 4, 4, 4, 7, 7, 7, 10, 10, 10]);
    assert_eq!(quarter_start_key(2024, 5), "202404");
    assert_eq!(quarter_start_key(987, 12), "098710");
}

#[test]
fn test_identifier_quoting_escapes_quotes() {
    let registry = registry();
    let sql = translate(&registry, "sql", &AbstractExpression::column(r#"we"ird"#)).unwrap();
    assert_eq!(sql, r#""we""ird""#);
    assert_eq!(quote_string_literal("O'Brien"), "'O''Brien'");
}
