//! SQLite driver implementation

use async_trait::async_trait;
use sqlgate_core::{
    Connection, ConnectionDescriptor, DatabaseDriver, DriverDescriptor, GateError, Result,
};
use std::sync::Arc;

use crate::{SQLITE_DRIVER_ID, SqliteConnection, sqlite_descriptor};

/// SQLite database driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn id(&self) -> &'static str {
        SQLITE_DRIVER_ID
    }

    fn display_name(&self) -> &'static str {
        "SQLite"
    }

    fn descriptor(&self) -> Result<DriverDescriptor> {
        sqlite_descriptor()
    }

    /// The primary target is the database path, `:memory:` or a `file:` URI
    #[tracing::instrument(skip(self, target), fields(path = %target.primary_target))]
    async fn connect(&self, target: &ConnectionDescriptor) -> Result<Arc<dyn Connection>> {
        let path = target.primary_target.as_str();
        if path.is_empty() {
            return Err(GateError::Configuration(
                "SQLite requires a database path, e.g. /path/to/database.db".into(),
            ));
        }

        let conn = SqliteConnection::open(path).map_err(|e| {
            tracing::error!(error = %e, "failed to connect to SQLite database");
            e
        })?;

        tracing::info!(path = %path, "SQLite connection created");
        Ok(Arc::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let driver = SqliteDriver::new();
        let conn = driver
            .connect(&ConnectionDescriptor::new(":memory:"))
            .await
            .unwrap();
        assert_eq!(conn.driver_name(), "sqlite");
        let result = conn.query("SELECT 1 AS one", &[]).await.unwrap();
        assert_eq!(result.row_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_requires_path() {
        let err = SqliteDriver::new()
            .connect(&ConnectionDescriptor::new(""))
            .await
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }
}
