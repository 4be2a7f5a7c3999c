//! SQLite dialect and connection for sqlgate

mod connection;
mod dialect;
mod driver;

pub use connection::SqliteConnection;
pub use dialect::{SQLITE_DRIVER_ID, sqlite_descriptor};
pub use driver::SqliteDriver;
