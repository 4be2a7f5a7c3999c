//! H2 dialect for sqlgate
//!
//! H2 runs inside a JVM, so this crate only describes the dialect. Connections
//! come from an external connection source.

mod dialect;
mod driver;

pub use dialect::{H2_ADMIN_USER, H2_DRIVER_ID, h2_descriptor};
pub use driver::H2Driver;
