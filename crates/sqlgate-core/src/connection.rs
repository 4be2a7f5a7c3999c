//! Connection trait implemented by backends that can execute SQL

use crate::{QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;

/// A live database connection
///
/// sqlgate never pools these itself. A connection is handed out by a
/// connection source, used for one query, and handed back.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver id (e.g., "sqlite", "h2")
    fn driver_name(&self) -> &str;

    /// Execute a statement that does not return rows (session setup, DML)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
