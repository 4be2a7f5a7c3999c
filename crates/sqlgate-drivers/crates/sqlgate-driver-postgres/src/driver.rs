//! PostgreSQL driver implementation

use async_trait::async_trait;
use sqlgate_core::{
    Connection, ConnectionDescriptor, DatabaseDriver, DriverDescriptor, GateError, Result,
};
use std::sync::Arc;

use crate::{POSTGRES_DRIVER_ID, PostgresConnection, postgres_descriptor};

/// PostgreSQL database driver
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create a new PostgreSQL driver instance
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL driver initialized");
        Self
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a client configuration from a decoded connection string
///
/// The primary target is a `postgresql://` URL or a libpq key/value string;
/// `USER` and `PASSWORD` options override what the target carries.
pub(crate) fn client_config(target: &ConnectionDescriptor) -> Result<tokio_postgres::Config> {
    let mut config: tokio_postgres::Config = target.primary_target.parse().map_err(|e| {
        GateError::Configuration(format!("invalid PostgreSQL target: {}", e))
    })?;
    if let Some(user) = target.user() {
        config.user(user);
    }
    if let Some(password) = target.option("PASSWORD") {
        config.password(password);
    }
    if let Some(application) = target.option("APPLICATION_NAME") {
        config.application_name(application);
    }
    Ok(config)
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn id(&self) -> &'static str {
        POSTGRES_DRIVER_ID
    }

    fn display_name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn descriptor(&self) -> Result<DriverDescriptor> {
        postgres_descriptor()
    }

    #[tracing::instrument(skip(self, target))]
    async fn connect(&self, target: &ConnectionDescriptor) -> Result<Arc<dyn Connection>> {
        let config = client_config(target)?;
        let conn = PostgresConnection::connect(config).await.map_err(|e| {
            tracing::error!(error = %e, "failed to connect to PostgreSQL database");
            e
        })?;
        Ok(Arc::new(conn))
    }
}
