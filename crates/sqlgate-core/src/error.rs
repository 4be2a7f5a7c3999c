//! Error types for sqlgate

use thiserror::Error;

use crate::SecurityViolation;

/// Core error type for sqlgate operations
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed connection string: {0}")]
    MalformedConnectionString(String),

    #[error("Security violation: {0}")]
    Security(SecurityViolation),

    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    #[error("Driver already registered: {0}")]
    DuplicateDriver(String),

    #[error("Driver '{driver}' declares unknown parent '{parent}'")]
    UnknownParent { driver: String, parent: String },

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GateError {
    /// Configuration problems are surfaced immediately and never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GateError::Configuration(_)
                | GateError::MalformedConnectionString(_)
                | GateError::UnknownDriver(_)
                | GateError::DuplicateDriver(_)
                | GateError::UnknownParent { .. }
                | GateError::Toml(_)
        )
    }

    /// The violation carried by a security error, if any
    pub fn security_violation(&self) -> Option<&SecurityViolation> {
        match self {
            GateError::Security(violation) => Some(violation),
            _ => None,
        }
    }
}

impl From<SecurityViolation> for GateError {
    fn from(violation: SecurityViolation) -> Self {
        GateError::Security(violation)
    }
}

/// Result type alias for sqlgate operations
pub type Result<T> = std::result::Result<T, GateError>;
