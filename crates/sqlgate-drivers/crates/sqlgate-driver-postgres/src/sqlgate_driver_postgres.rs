//! PostgreSQL dialect and connection for sqlgate

mod connection;
mod dialect;
mod driver;

pub use connection::PostgresConnection;
pub use dialect::{POSTGRES_DRIVER_ID, postgres_descriptor};
pub use driver::PostgresDriver;
