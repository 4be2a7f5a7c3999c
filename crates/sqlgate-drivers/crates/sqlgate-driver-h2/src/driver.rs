//! H2 driver implementation

use async_trait::async_trait;
use sqlgate_core::{DatabaseDriver, DriverDescriptor, Result};

use crate::{H2_DRIVER_ID, h2_descriptor};

/// H2 database driver
pub struct H2Driver;

impl H2Driver {
    pub fn new() -> Self {
        tracing::debug!("H2 driver initialized");
        Self
    }
}

impl Default for H2Driver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for H2Driver {
    fn id(&self) -> &'static str {
        H2_DRIVER_ID
    }

    fn display_name(&self) -> &'static str {
        "H2"
    }

    fn descriptor(&self) -> Result<DriverDescriptor> {
        h2_descriptor()
    }
}
