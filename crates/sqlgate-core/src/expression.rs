//! Backend-independent expression trees
//!
//! Expressions are produced by a query compilation stage and consumed by the
//! [`Translator`](crate::Translator). They are immutable: rewrites build new
//! trees instead of editing existing nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{SemanticType, Value};

/// Granularity for [`AbstractExpression::TemporalTruncate`]
///
/// The `*Of*` units and `Year`-style fields are extractions: they produce a
/// number instead of a truncated timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TruncateUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    MinuteOfHour,
    HourOfDay,
    DayOfWeek,
    DayOfMonth,
    MonthOfYear,
    QuarterOfYear,
}

impl TruncateUnit {
    /// The field to extract for extraction units, `None` for truncations
    pub fn extraction_field(&self) -> Option<DateField> {
        match self {
            TruncateUnit::MinuteOfHour => Some(DateField::Minute),
            TruncateUnit::HourOfDay => Some(DateField::Hour),
            TruncateUnit::DayOfMonth => Some(DateField::Day),
            TruncateUnit::MonthOfYear => Some(DateField::Month),
            TruncateUnit::QuarterOfYear => Some(DateField::Quarter),
            _ => None,
        }
    }
}

/// Date/time fields that can be extracted as numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateField {
    Minute,
    Hour,
    Day,
    Month,
    Quarter,
    Year,
}

impl DateField {
    /// ANSI `EXTRACT` field keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            DateField::Minute => "MINUTE",
            DateField::Hour => "HOUR",
            DateField::Day => "DAY",
            DateField::Month => "MONTH",
            DateField::Quarter => "QUARTER",
            DateField::Year => "YEAR",
        }
    }
}

/// Units accepted by [`AbstractExpression::IntervalAdd`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl IntervalUnit {
    /// The next finer unit and how many of it make up one of `self`
    ///
    /// Months have no fixed length in days, so `Month` has no finer unit.
    pub fn finer(&self) -> Option<(IntervalUnit, i64)> {
        match self {
            IntervalUnit::Year => Some((IntervalUnit::Month, 12)),
            IntervalUnit::Quarter => Some((IntervalUnit::Month, 3)),
            IntervalUnit::Week => Some((IntervalUnit::Day, 7)),
            IntervalUnit::Day => Some((IntervalUnit::Hour, 24)),
            IntervalUnit::Hour => Some((IntervalUnit::Minute, 60)),
            IntervalUnit::Minute => Some((IntervalUnit::Second, 60)),
            IntervalUnit::Second => Some((IntervalUnit::Millisecond, 1000)),
            IntervalUnit::Month | IntervalUnit::Millisecond => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            IntervalUnit::Millisecond => "MILLISECOND",
            IntervalUnit::Second => "SECOND",
            IntervalUnit::Minute => "MINUTE",
            IntervalUnit::Hour => "HOUR",
            IntervalUnit::Day => "DAY",
            IntervalUnit::Week => "WEEK",
            IntervalUnit::Month => "MONTH",
            IntervalUnit::Quarter => "QUARTER",
            IntervalUnit::Year => "YEAR",
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Concat,
    RegexMatch,
}

impl BinaryOperator {
    /// Infix token for operators that have one in ANSI SQL
    pub fn token(&self) -> Option<&'static str> {
        Some(match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Concat => "||",
            BinaryOperator::RegexMatch => return None,
        })
    }
}

/// An expression tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbstractExpression {
    Literal {
        value: Value,
    },
    ColumnRef {
        #[serde(default)]
        table: Option<String>,
        name: String,
    },
    TemporalTruncate {
        unit: TruncateUnit,
        expr: Box<AbstractExpression>,
    },
    IntervalAdd {
        unit: IntervalUnit,
        amount: Box<AbstractExpression>,
        expr: Box<AbstractExpression>,
    },
    Cast {
        target_type: SemanticType,
        expr: Box<AbstractExpression>,
    },
    UnaryFn {
        name: String,
        arg: Box<AbstractExpression>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<AbstractExpression>,
        right: Box<AbstractExpression>,
    },
}

impl AbstractExpression {
    pub fn literal(value: impl Into<Value>) -> Self {
        AbstractExpression::Literal {
            value: value.into(),
        }
    }

    pub fn column(name: impl Into<String>) -> Self {
        AbstractExpression::ColumnRef {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        AbstractExpression::ColumnRef {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    pub fn truncate(unit: TruncateUnit, expr: AbstractExpression) -> Self {
        AbstractExpression::TemporalTruncate {
            unit,
            expr: Box::new(expr),
        }
    }

    pub fn interval_add(
        unit: IntervalUnit,
        amount: AbstractExpression,
        expr: AbstractExpression,
    ) -> Self {
        AbstractExpression::IntervalAdd {
            unit,
            amount: Box::new(amount),
            expr: Box::new(expr),
        }
    }

    pub fn cast(target_type: SemanticType, expr: AbstractExpression) -> Self {
        AbstractExpression::Cast {
            target_type,
            expr: Box::new(expr),
        }
    }

    pub fn unary_fn(name: impl Into<String>, arg: AbstractExpression) -> Self {
        AbstractExpression::UnaryFn {
            name: name.into(),
            arg: Box::new(arg),
        }
    }

    pub fn binary(op: BinaryOperator, left: AbstractExpression, right: AbstractExpression) -> Self {
        AbstractExpression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Numeric value of a literal amount, `None` for anything computed
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AbstractExpression::Literal { value } => value.as_f64(),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<chrono::NaiveDateTime> for Value {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}
