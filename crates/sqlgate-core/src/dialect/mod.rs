//! Abstract expression to dialect SQL translation
//!
//! Driver-independent rewrites (interval unit normalization, week truncation)
//! run first; the resulting tree is then emitted through the driver's
//! [`DialectOps`](crate::DialectOps) slots, resolved along the parent chain.
//!
//! Children are always translated in the order they appear in the emitted
//! SQL, so positional `?` parameters line up with [`CompiledStatement::parameters`].

mod ansi;

#[cfg(test)]
mod tests;

pub use ansi::{ROOT_DRIVER_ID, ansi_descriptor};

use chrono::Weekday;
use serde::Serialize;

use crate::{
    AbstractExpression, BinaryOperator, Capability, DriverHandle, GateError, IntervalUnit,
    Result, TruncateUnit, Value,
};

/// Per-translation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Day that numbers as 1 in day-of-week values and starts truncated weeks
    pub week_start: Weekday,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            week_start: Weekday::Mon,
        }
    }
}

/// Dialect SQL plus the values bound to its placeholders, in order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStatement {
    pub dialect_sql: String,
    pub parameters: Vec<Value>,
}

/// Translates expressions for one driver
///
/// Create one per compile call. A translator only accumulates the parameters
/// bound by the expressions it has translated.
pub struct Translator<'r> {
    driver: DriverHandle<'r>,
    options: TranslateOptions,
    parameters: Vec<Value>,
}

impl<'r> Translator<'r> {
    pub fn new(driver: DriverHandle<'r>, options: TranslateOptions) -> Self {
        Self {
            driver,
            options,
            parameters: Vec::new(),
        }
    }

    pub fn driver(&self) -> DriverHandle<'r> {
        self.driver
    }

    pub fn options(&self) -> &TranslateOptions {
        &self.options
    }

    /// Translate a single expression and bind its parameters into a statement
    pub fn compile(mut self, expr: &AbstractExpression) -> Result<CompiledStatement> {
        let sql = self.translate(expr)?;
        Ok(self.finish(sql))
    }

    /// Package SQL assembled from translated fragments with the bound parameters
    pub fn finish(self, dialect_sql: String) -> CompiledStatement {
        CompiledStatement {
            dialect_sql,
            parameters: self.parameters,
        }
    }

    /// Bind `value` as the next parameter and return its placeholder
    pub fn bind(&mut self, value: Value) -> Result<String> {
        let placeholder = self.slot(|ops| ops.placeholder, "placeholder")?;
        self.parameters.push(value);
        Ok(placeholder(self.parameters.len()))
    }

    pub fn quote_identifier(&self, identifier: &str) -> Result<String> {
        let quote = self.slot(|ops| ops.quote_identifier, "quote_identifier")?;
        Ok(quote(identifier))
    }

    pub fn translate(&mut self, expr: &AbstractExpression) -> Result<String> {
        match expr {
            AbstractExpression::Literal { value } => self.literal(value),
            AbstractExpression::ColumnRef { table, name } => {
                let column = self.quote_identifier(name)?;
                match table {
                    Some(table) => Ok(format!("{}.{}", self.quote_identifier(table)?, column)),
                    None => Ok(column),
                }
            }
            AbstractExpression::TemporalTruncate { unit, expr } => self.temporal(*unit, expr),
            AbstractExpression::IntervalAdd { unit, amount, expr } => {
                let (unit, amount) = normalize_interval(self.driver, *unit, amount)?;
                let interval_add = self.slot(|ops| ops.interval_add, "interval_add")?;
                interval_add(self, unit, &amount, expr)
            }
            AbstractExpression::Cast { target_type, expr } => {
                let native = self.driver.native_type(*target_type).ok_or_else(|| {
                    GateError::Translation(format!(
                        "{} has no native type for {}",
                        self.driver.display_name(),
                        target_type
                    ))
                })?;
                let cast = self.slot(|ops| ops.cast, "cast")?;
                cast(self, native, expr)
            }
            AbstractExpression::UnaryFn { name, arg } => {
                if !is_plain_identifier(name) {
                    return Err(GateError::Translation(format!(
                        "invalid function name '{}'",
                        name
                    )));
                }
                Ok(format!("{}({})", name, self.translate(arg)?))
            }
            AbstractExpression::BinaryOp { op, left, right } => self.binary(*op, left, right),
        }
    }

    fn literal(&mut self, value: &Value) -> Result<String> {
        match value {
            Value::Null => Ok("NULL".to_string()),
            Value::Bool(true) => Ok("TRUE".to_string()),
            Value::Bool(false) => Ok("FALSE".to_string()),
            Value::Int64(v) => Ok(v.to_string()),
            Value::Float64(v) if v.is_finite() => Ok(v.to_string()),
            Value::Float64(v) => Err(GateError::Translation(format!(
                "cannot emit non-finite number {}",
                v
            ))),
            Value::Decimal(v) if is_decimal_literal(v) => Ok(v.clone()),
            Value::Decimal(v) => Err(GateError::Translation(format!(
                "invalid decimal literal '{}'",
                v
            ))),
            other => self.bind(other.clone()),
        }
    }

    fn temporal(&mut self, unit: TruncateUnit, expr: &AbstractExpression) -> Result<String> {
        if unit == TruncateUnit::Week {
            let rewritten = week_truncation(expr);
            tracing::debug!(driver = %self.driver.id(), "rewriting week truncation");
            return self.translate(&rewritten);
        }

        if unit == TruncateUnit::DayOfWeek {
            let day_of_week = self.slot(|ops| ops.day_of_week, "day_of_week")?;
            let iso = day_of_week(self, expr)?;
            let start = self.options.week_start.number_from_monday();
            if start == 1 {
                return Ok(iso);
            }
            return Ok(format!("((({}) + {}) % 7 + 1)", iso, 7 - start));
        }

        if let Some(field) = unit.extraction_field() {
            let extract = self.slot(|ops| ops.extract, "extract")?;
            return extract(self, field, expr);
        }

        let truncate = self.slot(|ops| ops.truncate, "truncate")?;
        truncate(self, unit, expr)
    }

    fn binary(
        &mut self,
        op: BinaryOperator,
        left: &AbstractExpression,
        right: &AbstractExpression,
    ) -> Result<String> {
        if op == BinaryOperator::RegexMatch {
            if !self.driver.capability(Capability::Regex) {
                return Err(GateError::NotSupported(format!(
                    "{} does not support regular expressions",
                    self.driver.display_name()
                )));
            }
            let regex_match = self.slot(|ops| ops.regex_match, "regex_match")?;
            let left = self.translate(left)?;
            let right = self.translate(right)?;
            return Ok(regex_match(&left, &right));
        }

        let token = op
            .token()
            .ok_or_else(|| GateError::Translation(format!("no infix form for {:?}", op)))?;
        let left = self.translate(left)?;
        let right = self.translate(right)?;
        Ok(format!("({} {} {})", left, token, right))
    }

    fn slot<T>(
        &self,
        slot: impl Fn(&crate::DialectOps) -> Option<T>,
        name: &str,
    ) -> Result<T> {
        self.driver.op(slot).ok_or_else(|| {
            GateError::NotSupported(format!(
                "{} provides no '{}' operation",
                self.driver.display_name(),
                name
            ))
        })
    }
}

/// `truncate(week, x)` as `truncate(day, x) + (1 - day_of_week(x)) days`
fn week_truncation(expr: &AbstractExpression) -> AbstractExpression {
    AbstractExpression::interval_add(
        IntervalUnit::Day,
        AbstractExpression::binary(
            BinaryOperator::Minus,
            AbstractExpression::literal(1i64),
            AbstractExpression::truncate(TruncateUnit::DayOfWeek, expr.clone()),
        ),
        AbstractExpression::truncate(TruncateUnit::Day, expr.clone()),
    )
}

/// Rewrite an interval into a unit and amount the driver can emit
///
/// Quarters and weeks become months and days everywhere. Drivers with
/// integral intervals get whole-number literal amounts, cascading fractional
/// amounts down to finer units; a fractional month or millisecond amount
/// cannot be represented and fails.
pub fn normalize_interval(
    driver: DriverHandle<'_>,
    unit: IntervalUnit,
    amount: &AbstractExpression,
) -> Result<(IntervalUnit, AbstractExpression)> {
    let (unit, amount) = match unit {
        IntervalUnit::Quarter => (IntervalUnit::Month, scale_amount(amount, 3)?),
        IntervalUnit::Week => (IntervalUnit::Day, scale_amount(amount, 7)?),
        other => (other, amount.clone()),
    };

    if !driver.capability(Capability::IntegralIntervals) {
        return Ok((unit, amount));
    }

    let Some(mut value) = amount.as_number() else {
        if unit == IntervalUnit::Second {
            return Ok((IntervalUnit::Millisecond, scale_amount(&amount, 1000)?));
        }
        return Ok((unit, amount));
    };

    let mut unit = unit;
    loop {
        if let Some(whole) = as_whole_number(value) {
            return Ok((unit, AbstractExpression::literal(whole)));
        }
        match unit.finer() {
            Some((finer, factor)) => {
                value *= factor as f64;
                unit = finer;
            }
            None => {
                return Err(GateError::Translation(format!(
                    "{} only accepts whole {} amounts, got {}",
                    driver.display_name(),
                    unit.keyword().to_lowercase(),
                    value
                )));
            }
        }
    }
}

fn scale_amount(amount: &AbstractExpression, factor: i64) -> Result<AbstractExpression> {
    Ok(match amount {
        AbstractExpression::Literal {
            value: Value::Int64(v),
        } => {
            let scaled = v.checked_mul(factor).ok_or_else(|| {
                GateError::Translation(format!("interval amount {} is out of range", v))
            })?;
            AbstractExpression::literal(scaled)
        }
        AbstractExpression::Literal {
            value: Value::Float64(v),
        } => AbstractExpression::literal(v * factor as f64),
        other => AbstractExpression::binary(
            BinaryOperator::Multiply,
            other.clone(),
            AbstractExpression::literal(factor),
        ),
    })
}

fn as_whole_number(value: f64) -> Option<i64> {
    let rounded = value.round();
    ((value - rounded).abs() < 1e-9 && rounded.abs() < i64::MAX as f64).then_some(rounded as i64)
}

/// First month (1-based) of the quarter containing `month`
pub fn quarter_start_month(month: u32) -> u32 {
    ((month + 2) / 3) * 3 - 2
}

/// `yyyyMM` key of the first month of the quarter containing `month`
pub fn quarter_start_key(year: i32, month: u32) -> String {
    format!("{:04}{:02}", year, quarter_start_month(month))
}

/// Quote a string for inclusion in SQL text, doubling single quotes
pub fn quote_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_decimal_literal(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty()
        && digits.chars().filter(|c| *c == '.').count() <= 1
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().any(|c| c.is_ascii_digit())
}
