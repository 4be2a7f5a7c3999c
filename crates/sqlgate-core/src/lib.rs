//! sqlgate core - driver abstraction and SQL dialect translation
//!
//! This crate provides the pieces every sqlgate backend builds on:
//!
//! - `DriverRegistry` - Driver descriptors with capability and dialect inheritance
//! - `Translator` - Abstract expression to dialect SQL translation
//! - `classify` - Statement splitting and classification
//! - `ConnectionDescriptor` - Connection string codec with forced safe options
//! - `SecurityGuard` - Pre-execution query authorization
//! - Common types like `Value`, `Row`, `QueryResult`, etc.

mod capability;
mod classify;
pub mod config;
mod connection;
mod connection_string;
mod dialect;
mod driver;
mod error;
mod expression;
mod humanize;
mod query;
mod registry;
pub mod security;
pub mod type_map;
mod types;

pub use capability::*;
pub use classify::*;
pub use config::{DriverConfig, GateConfig};
pub use connection::*;
pub use connection_string::*;
pub use dialect::*;
pub use driver::*;
pub use error::*;
pub use expression::*;
pub use humanize::*;
pub use query::*;
pub use registry::*;
pub use security::*;
pub use type_map::{SemanticType, map_native_type, normalize_type_name};
pub use types::*;
