//! Connection string codec
//!
//! Grammar: `target[;KEY=VALUE]*`. Keys are case-sensitive, values cannot
//! contain `;` and there is no escaping.

#[cfg(test)]
mod tests;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::{GateError, Result};

/// Option key carrying the connecting user
pub const USER_OPTION: &str = "USER";

/// A decoded connection string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Database location (file path, URL, ...)
    pub primary_target: String,
    /// Options in the order they appeared
    pub options: IndexMap<String, String>,
}

impl ConnectionDescriptor {
    pub fn new(primary_target: impl Into<String>) -> Self {
        Self {
            primary_target: primary_target.into(),
            options: IndexMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Decode `target[;KEY=VALUE]*`
    ///
    /// Empty segments are skipped. A later duplicate key replaces the value of
    /// an earlier one.
    pub fn decode(s: &str) -> Result<Self> {
        let mut segments = s.split(';');
        let primary_target = segments.next().unwrap_or_default();
        if primary_target.trim().is_empty() {
            return Err(GateError::MalformedConnectionString(
                "missing primary target".to_string(),
            ));
        }

        let mut options = IndexMap::new();
        for segment in segments.filter(|segment| !segment.is_empty()) {
            let Some((key, value)) = segment.split_once('=') else {
                return Err(GateError::MalformedConnectionString(format!(
                    "option '{}' has no '='",
                    segment
                )));
            };
            if key.is_empty() {
                return Err(GateError::MalformedConnectionString(format!(
                    "option '{}' has an empty key",
                    segment
                )));
            }
            options.insert(key.to_string(), value.to_string());
        }

        Ok(Self {
            primary_target: primary_target.to_string(),
            options,
        })
    }

    /// Encode back into `target[;KEY=VALUE]*`
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(|v| v.as_str())
    }

    /// The `USER` option, if present
    pub fn user(&self) -> Option<&str> {
        self.option(USER_OPTION)
    }

    /// A copy with every forced option applied
    ///
    /// Any option whose key matches a forced key case-insensitively is
    /// removed first, so callers cannot smuggle in `access_mode_data=rw`.
    /// Applying the same options twice yields the same descriptor.
    pub fn apply_safe_defaults(&self, safe_options: &[SafeOption]) -> Self {
        let mut sanitized = self.clone();
        for option in safe_options {
            sanitized
                .options
                .retain(|key, _| !key.eq_ignore_ascii_case(option.key()));
            if let SafeOption::Force { key, value } = option {
                sanitized
                    .options
                    .insert(key.to_string(), value.to_string());
            }
        }
        sanitized
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.primary_target)?;
        for (key, value) in &self.options {
            write!(f, ";{}={}", key, value)?;
        }
        Ok(())
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

/// A connection option the driver enforces regardless of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafeOption {
    /// Always set `key` to `value`
    Force {
        key: Cow<'static, str>,
        value: Cow<'static, str>,
    },
    /// Always remove `key`
    Strip { key: Cow<'static, str> },
}

impl SafeOption {
    pub const fn force(key: &'static str, value: &'static str) -> Self {
        SafeOption::Force {
            key: Cow::Borrowed(key),
            value: Cow::Borrowed(value),
        }
    }

    pub const fn strip(key: &'static str) -> Self {
        SafeOption::Strip {
            key: Cow::Borrowed(key),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            SafeOption::Force { key, .. } | SafeOption::Strip { key } => key,
        }
    }
}
