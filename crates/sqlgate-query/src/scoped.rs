//! Connections borrowed for the duration of one query

use std::sync::Arc;

use async_trait::async_trait;
use sqlgate_core::{Connection, ConnectionMetadata, DriverRegistry, GateError, Result};
use sqlgate_drivers::DriverCatalog;

/// Hands out connections and takes them back
///
/// Pooling, if any, lives behind this trait.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    async fn acquire(&self, metadata: &ConnectionMetadata) -> Result<Arc<dyn Connection>>;

    /// Called exactly once for every successful [`acquire`](Self::acquire)
    fn release(&self, connection: &Arc<dyn Connection>);
}

/// A connection that goes back to its source when dropped
pub struct ScopedConnection {
    connection: Arc<dyn Connection>,
    source: Arc<dyn ConnectionSource>,
}

impl ScopedConnection {
    pub async fn acquire(source: Arc<dyn ConnectionSource>, metadata: &ConnectionMetadata) -> Result<Self> {
        let connection = source.acquire(metadata).await?;
        tracing::debug!(
            connection_id = %metadata.connection_id,
            driver = %connection.driver_name(),
            "connection acquired"
        );
        Ok(Self { connection, source })
    }

    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        tracing::debug!(driver = %self.connection.driver_name(), "releasing connection");
        self.source.release(&self.connection);
    }
}

/// Opens a fresh connection per acquisition through the built-in drivers
///
/// The connection string is sanitized with the driver's safe options before
/// it is handed to the backend. Drivers declared only in configuration
/// connect through their nearest built-in ancestor.
pub struct DriverConnectionSource {
    catalog: DriverCatalog,
    registry: Arc<DriverRegistry>,
}

impl DriverConnectionSource {
    pub fn new(catalog: DriverCatalog, registry: Arc<DriverRegistry>) -> Self {
        Self { catalog, registry }
    }
}

#[async_trait]
impl ConnectionSource for DriverConnectionSource {
    #[tracing::instrument(skip_all, fields(driver = %metadata.driver_id))]
    async fn acquire(&self, metadata: &ConnectionMetadata) -> Result<Arc<dyn Connection>> {
        let (driver, target) = {
            let handle = self.registry.resolve(&metadata.driver_id)?;
            let target = metadata.descriptor.apply_safe_defaults(&handle.safe_options());
            let driver = handle
                .chain()
                .find(|descriptor| self.catalog.has(&descriptor.id))
                .and_then(|descriptor| self.catalog.get(&descriptor.id))
                .ok_or_else(|| {
                    GateError::NotSupported(format!(
                        "no connection support for driver '{}'",
                        metadata.driver_id
                    ))
                })?;
            (driver, target)
        };
        driver.connect(&target).await
    }

    fn release(&self, connection: &Arc<dyn Connection>) {
        let connection = Arc::clone(connection);
        // Closing is async; without a runtime the connection closes on drop
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = connection.close().await {
                    tracing::warn!(error = %e, "failed to close connection");
                }
            });
        }
    }
}
