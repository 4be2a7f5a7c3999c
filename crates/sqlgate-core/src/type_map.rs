//! Native type name to semantic type mapping
//!
//! Every backend reports column types with its own vocabulary. The mapper
//! folds them into a small set of semantic types the rest of sqlgate reasons
//! about. Unrecognized names never fail; they map to [`SemanticType::Other`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Backend-independent type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SemanticType {
    Integer,
    BigInteger,
    Float,
    Decimal,
    Boolean,
    Text,
    Date,
    Time,
    DateTime,
    DateTimeWithZone,
    Uuid,
    #[default]
    Other,
}

impl SemanticType {
    /// Whether values of this type carry a date component
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            SemanticType::Date | SemanticType::DateTime | SemanticType::DateTimeWithZone
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SemanticType::Integer
                | SemanticType::BigInteger
                | SemanticType::Float
                | SemanticType::Decimal
        )
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

static BASE_TYPE_MAP: LazyLock<HashMap<&'static str, SemanticType>> = LazyLock::new(|| {
    use SemanticType::*;
    HashMap::from([
        ("INTEGER", Integer),
        ("INT", Integer),
        ("INT4", Integer),
        ("SMALLINT", Integer),
        ("INT2", Integer),
        ("TINYINT", Integer),
        ("BIGINT", BigInteger),
        ("INT8", BigInteger),
        ("BOOLEAN", Boolean),
        ("BOOL", Boolean),
        ("BIT", Boolean),
        ("VARCHAR", Text),
        ("CHAR", Text),
        ("CHARACTER", Text),
        ("CHARACTER VARYING", Text),
        ("VARCHAR_IGNORECASE", Text),
        ("TEXT", Text),
        ("CLOB", Text),
        ("TIMESTAMP", DateTime),
        ("DATETIME", DateTime),
        ("TIMESTAMP WITHOUT TIME ZONE", DateTime),
        ("TIMESTAMP WITH TIME ZONE", DateTimeWithZone),
        ("TIMESTAMPTZ", DateTimeWithZone),
        ("DOUBLE PRECISION", Float),
        ("DOUBLE", Float),
        ("REAL", Float),
        ("FLOAT", Float),
        ("FLOAT4", Float),
        ("FLOAT8", Float),
        ("DECIMAL", Decimal),
        ("NUMERIC", Decimal),
        ("NUMBER", Decimal),
        ("DATE", Date),
        ("TIME", Time),
        ("TIME WITHOUT TIME ZONE", Time),
        ("UUID", Uuid),
        ("BLOB", Other),
        ("BINARY", Other),
        ("VARBINARY", Other),
        ("ARRAY", Other),
        ("GEOMETRY", Other),
        ("OTHER", Other),
        ("JAVA_OBJECT", Other),
    ])
});

/// Canonical lookup key for a native type name
///
/// Trims, upper-cases, collapses inner whitespace and drops parameter lists,
/// so `" varchar(255) "` and `"VARCHAR"` share a key.
pub fn normalize_type_name(native_type: &str) -> String {
    let mut without_params = String::with_capacity(native_type.len());
    let mut depth = 0usize;
    for ch in native_type.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => without_params.push(ch),
            _ => {}
        }
    }

    without_params
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn is_array_type(normalized: &str) -> bool {
    normalized.ends_with("[]") || normalized.ends_with(" ARRAY")
}

/// Map a native type name through the static table only
///
/// Driver-specific overrides are applied by `DriverHandle::semantic_type`,
/// which falls back to this function.
pub fn map_native_type(native_type: &str) -> SemanticType {
    lookup_base(&normalize_type_name(native_type)).unwrap_or_else(|| {
        tracing::debug!(native_type = %native_type, "type mapping gap, using Other");
        SemanticType::Other
    })
}

/// Static-table lookup on an already normalized name
pub(crate) fn lookup_base(normalized: &str) -> Option<SemanticType> {
    if is_array_type(normalized) {
        return Some(SemanticType::Other);
    }
    BASE_TYPE_MAP.get(normalized).copied()
}
