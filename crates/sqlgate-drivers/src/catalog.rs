//! Built-in driver catalog and registry construction

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use sqlgate_core::{DatabaseDriver, DriverRegistry, GateConfig, Result, ansi_descriptor};

/// Process-wide registry of the built-in drivers
///
/// Built once on first use and read-only afterwards.
pub static DRIVER_REGISTRY: LazyLock<Arc<DriverRegistry>> = LazyLock::new(|| {
    Arc::new(builtin_registry().expect("built-in driver descriptors are valid"))
});

/// Drivers that can open connections, keyed by id
pub struct DriverCatalog {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
}

impl DriverCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a catalog with all built-in drivers registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut catalog = Self::new();

        #[cfg(feature = "sqlite")]
        catalog.register(Arc::new(crate::sqlite::SqliteDriver::new()));
        #[cfg(feature = "postgres")]
        catalog.register(Arc::new(crate::postgres::PostgresDriver::new()));
        #[cfg(feature = "h2")]
        catalog.register(Arc::new(crate::h2::H2Driver::new()));

        catalog
    }

    /// Register a new driver
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let id = driver.id().to_string();
        tracing::info!(driver = %id, "registering database driver");
        self.drivers.insert(id, driver);
    }

    /// Get a driver by id
    pub fn get(&self, id: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(id).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %id, "driver not found in catalog");
        }
        driver
    }

    /// List all registered driver ids, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.drivers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Check if a driver is registered
    pub fn has(&self, id: &str) -> bool {
        self.drivers.contains_key(id)
    }

    /// Build a descriptor registry rooted at ANSI SQL from the catalog
    pub fn registry(&self) -> Result<DriverRegistry> {
        let mut registry = DriverRegistry::new(ansi_descriptor())?;
        for id in self.list() {
            registry.register(self.drivers[id].descriptor()?)?;
        }
        Ok(registry)
    }
}

impl Default for DriverCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Registry of every built-in driver
pub fn builtin_registry() -> Result<DriverRegistry> {
    DriverCatalog::with_defaults().registry()
}

/// Built-in registry extended with the drivers declared in `config`
///
/// Declared drivers are registered in file order, so a declared parent must
/// appear before its children.
pub fn registry_from_config(config: &GateConfig) -> Result<DriverRegistry> {
    let mut registry = builtin_registry()?;
    for driver in &config.drivers {
        registry.register(driver.to_descriptor()?)?;
    }
    Ok(registry)
}
