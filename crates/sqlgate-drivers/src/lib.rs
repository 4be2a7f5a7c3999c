//! sqlgate drivers - built-in backends and the process-wide registry
//!
//! Each backend lives in its own crate behind a feature flag. This crate
//! collects them into a [`DriverCatalog`] (connectors by id) and a
//! [`DriverRegistry`] (descriptors with inheritance).

#[cfg(feature = "h2")]
pub use sqlgate_driver_h2 as h2;
#[cfg(feature = "postgres")]
pub use sqlgate_driver_postgres as postgres;
#[cfg(feature = "sqlite")]
pub use sqlgate_driver_sqlite as sqlite;

mod catalog;

pub use catalog::{DRIVER_REGISTRY, DriverCatalog, builtin_registry, registry_from_config};

/// Re-export commonly used types from sqlgate-core
pub use sqlgate_core::{
    Connection, DatabaseDriver, DriverHandle, DriverRegistry, GateError, QueryResult, Result, Row,
    Value,
};
