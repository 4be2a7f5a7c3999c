//! Driver descriptors and the database driver trait

use crate::{
    AbstractExpression, Capability, CapabilitySet, Connection, ConnectionDescriptor, DateField,
    ErrorPattern, GateError, IntervalUnit, NativeDialectParser, Result, SafeOption, SemanticType,
    Translator, TruncateUnit, normalize_type_name,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Emits a truncation to `unit` (never `Week` or an extraction unit)
pub type TruncateFn =
    fn(&mut Translator<'_>, TruncateUnit, &AbstractExpression) -> Result<String>;
/// Emits a numeric field extraction
pub type ExtractFn = fn(&mut Translator<'_>, DateField, &AbstractExpression) -> Result<String>;
/// Emits `expr + amount * unit`; `unit` is already normalized
pub type IntervalAddFn = fn(
    &mut Translator<'_>,
    IntervalUnit,
    &AbstractExpression,
    &AbstractExpression,
) -> Result<String>;
/// Emits the ISO day of week (Monday = 1 .. Sunday = 7)
pub type DayOfWeekFn = fn(&mut Translator<'_>, &AbstractExpression) -> Result<String>;
/// Emits a cast to a native type name
pub type CastFn = fn(&mut Translator<'_>, &str, &AbstractExpression) -> Result<String>;
/// Renders the placeholder for the 1-based parameter index
pub type PlaceholderFn = fn(usize) -> String;
pub type QuoteIdentifierFn = fn(&str) -> String;
/// Combines two already rendered operands into a regex match
pub type RegexMatchFn = fn(&str, &str) -> String;
/// Statements run on a fresh connection before the query
pub type SessionSetupFn = fn(&SessionOptions) -> Vec<String>;

/// Per-driver slots of the dialect dispatch table
///
/// An empty slot falls through to the parent driver. The root driver fills
/// every slot, so resolution through a registered chain always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialectOps {
    pub truncate: Option<TruncateFn>,
    pub extract: Option<ExtractFn>,
    pub interval_add: Option<IntervalAddFn>,
    pub day_of_week: Option<DayOfWeekFn>,
    pub cast: Option<CastFn>,
    pub placeholder: Option<PlaceholderFn>,
    pub quote_identifier: Option<QuoteIdentifierFn>,
    pub regex_match: Option<RegexMatchFn>,
    pub session_setup: Option<SessionSetupFn>,
}

impl DialectOps {
    /// Names of the slots left empty
    pub fn missing_slots(&self) -> Vec<&'static str> {
        let slots = [
            ("truncate", self.truncate.is_some()),
            ("extract", self.extract.is_some()),
            ("interval_add", self.interval_add.is_some()),
            ("day_of_week", self.day_of_week.is_some()),
            ("cast", self.cast.is_some()),
            ("placeholder", self.placeholder.is_some()),
            ("quote_identifier", self.quote_identifier.is_some()),
            ("regex_match", self.regex_match.is_some()),
            ("session_setup", self.session_setup.is_some()),
        ];
        slots
            .into_iter()
            .filter(|(_, filled)| !filled)
            .map(|(name, _)| name)
            .collect()
    }
}

/// Session-level settings applied before a query runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub read_only: bool,
    /// IANA time zone name for the session, `None` keeps the server default
    pub time_zone: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_only: true,
            time_zone: None,
        }
    }
}

/// Everything sqlgate knows about one backend
///
/// Descriptors are registered once at startup and never change afterwards.
/// Anything left unset is inherited from the parent descriptor.
#[derive(Clone)]
pub struct DriverDescriptor {
    pub id: String,
    pub display_name: String,
    pub parent: Option<String>,
    pub capabilities: CapabilitySet,
    /// Keys are normalized with [`normalize_type_name`]
    pub type_map: HashMap<String, SemanticType>,
    /// Native type names used when emitting casts
    pub cast_types: HashMap<SemanticType, String>,
    pub ops: DialectOps,
    pub default_admin_user: Option<String>,
    pub safe_options: Vec<SafeOption>,
    pub parser: Option<Arc<dyn NativeDialectParser>>,
    pub error_patterns: Vec<ErrorPattern>,
}

impl DriverDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            parent: None,
            capabilities: CapabilitySet::new(),
            type_map: HashMap::new(),
            cast_types: HashMap::new(),
            ops: DialectOps::default(),
            default_admin_user: None,
            safe_options: Vec::new(),
            parser: None,
            error_patterns: Vec::new(),
        }
    }

    // Builder methods
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn capability(mut self, capability: Capability, enabled: bool) -> Self {
        self.capabilities.set(capability, enabled);
        self
    }

    pub fn native_type(mut self, native: &str, semantic: SemanticType) -> Self {
        self.type_map.insert(normalize_type_name(native), semantic);
        self
    }

    pub fn cast_type(mut self, semantic: SemanticType, native: impl Into<String>) -> Self {
        self.cast_types.insert(semantic, native.into());
        self
    }

    pub fn ops(mut self, ops: DialectOps) -> Self {
        self.ops = ops;
        self
    }

    pub fn default_admin_user(mut self, user: impl Into<String>) -> Self {
        self.default_admin_user = Some(user.into());
        self
    }

    pub fn safe_option(mut self, option: SafeOption) -> Self {
        self.safe_options.push(option);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn NativeDialectParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn error_pattern(mut self, pattern: ErrorPattern) -> Self {
        self.error_patterns.push(pattern);
        self
    }
}

impl fmt::Debug for DriverDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverDescriptor")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("capabilities", &self.capabilities)
            .field("type_map", &self.type_map.len())
            .field("default_admin_user", &self.default_admin_user)
            .field("parser", &self.parser.as_ref().map(|p| p.name()))
            .finish_non_exhaustive()
    }
}

/// A backend implementation that can describe its dialect and open connections
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Unique identifier for this driver (e.g., "h2", "postgres", "sqlite")
    fn id(&self) -> &'static str;

    /// Human-readable name (e.g., "H2", "PostgreSQL")
    fn display_name(&self) -> &'static str {
        self.id()
    }

    /// The descriptor registered for this driver
    fn descriptor(&self) -> Result<DriverDescriptor>;

    /// Open a connection to the decoded (and already sanitized) target
    async fn connect(&self, target: &ConnectionDescriptor) -> Result<Arc<dyn Connection>> {
        let _ = target;
        Err(GateError::NotSupported(format!(
            "{} does not provide a built-in connection",
            self.display_name()
        )))
    }
}
