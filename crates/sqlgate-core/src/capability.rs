//! Per-driver feature flags

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::GateError;

/// Optional features a driver may support
///
/// Flags a driver does not set are inherited from its parent; a flag no
/// driver in the chain sets reads as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// FULL OUTER JOIN
    FullJoin,
    /// Regular expression matching
    Regex,
    /// percentile / median aggregations
    PercentileAggregations,
    /// Write actions against the database
    Actions,
    /// User-defined write actions
    CustomActions,
    /// Interval arithmetic only accepts whole-number amounts
    IntegralIntervals,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::FullJoin,
        Capability::Regex,
        Capability::PercentileAggregations,
        Capability::Actions,
        Capability::CustomActions,
        Capability::IntegralIntervals,
    ];

    /// Wire name of the flag
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::FullJoin => "full-join",
            Capability::Regex => "regex",
            Capability::PercentileAggregations => "percentile-aggregations",
            Capability::Actions => "actions",
            Capability::CustomActions => "actions/custom",
            Capability::IntegralIntervals => "integral-intervals",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| GateError::Configuration(format!("unknown capability flag '{}'", s)))
    }
}

/// Explicitly declared flags of a single driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    flags: HashMap<Capability, bool>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style flag declaration
    pub fn with(mut self, capability: Capability, enabled: bool) -> Self {
        self.flags.insert(capability, enabled);
        self
    }

    pub fn set(&mut self, capability: Capability, enabled: bool) {
        self.flags.insert(capability, enabled);
    }

    /// The explicit value for `capability`, `None` if this driver leaves it to its parent
    pub fn get(&self, capability: Capability) -> Option<bool> {
        self.flags.get(&capability).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
