//! Human-readable connection errors
//!
//! Drivers register regular expressions that recognize common failure
//! messages of their backend. Patterns are searched along the parent chain,
//! nearest driver first.

use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::{DriverHandle, GateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionErrorKind {
    ImplicitlyRelativeDbFilePath,
    DbFileNotFound,
    UsernameOrPasswordIncorrect,
    /// No pattern matched; the message is passed through
    Other,
}

impl ConnectionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionErrorKind::ImplicitlyRelativeDbFilePath => "implicitly-relative-db-file-path",
            ConnectionErrorKind::DbFileNotFound => "db-file-not-found",
            ConnectionErrorKind::UsernameOrPasswordIncorrect => "username-or-password-incorrect",
            ConnectionErrorKind::Other => "other",
        }
    }

    fn friendly_message(&self) -> Option<&'static str> {
        match self {
            ConnectionErrorKind::ImplicitlyRelativeDbFilePath => {
                Some("The database file path must be absolute.")
            }
            ConnectionErrorKind::DbFileNotFound => Some("No database file was found at that path."),
            ConnectionErrorKind::UsernameOrPasswordIncorrect => {
                Some("The username or password is incorrect.")
            }
            ConnectionErrorKind::Other => None,
        }
    }
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend message pattern and the category it indicates
#[derive(Debug, Clone)]
pub struct ErrorPattern {
    regex: Regex,
    kind: ConnectionErrorKind,
}

impl ErrorPattern {
    pub fn new(pattern: &str, kind: ConnectionErrorKind) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            GateError::Configuration(format!("invalid error pattern '{}': {}", pattern, e))
        })?;
        Ok(Self { regex, kind })
    }

    pub fn kind(&self) -> ConnectionErrorKind {
        self.kind
    }

    pub fn matches(&self, message: &str) -> bool {
        self.regex.is_match(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HumanizedError {
    pub kind: ConnectionErrorKind,
    pub message: String,
}

/// Categorize a raw connection error message from `driver`'s backend
pub fn humanize_connection_error(driver: DriverHandle<'_>, message: &str) -> HumanizedError {
    let matched = driver
        .error_patterns()
        .find(|pattern| pattern.matches(message))
        .map(|pattern| pattern.kind());

    match matched.and_then(|kind| kind.friendly_message().map(|text| (kind, text))) {
        Some((kind, text)) => {
            tracing::debug!(driver = %driver.id(), kind = %kind, "humanized connection error");
            HumanizedError {
                kind,
                message: text.to_string(),
            }
        }
        None => HumanizedError {
            kind: ConnectionErrorKind::Other,
            message: message.to_string(),
        },
    }
}
