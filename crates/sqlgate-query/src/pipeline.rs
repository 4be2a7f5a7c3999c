//! Statement execution once a connection is in hand

use async_trait::async_trait;
use sqlgate_core::{CompiledStatement, Connection, QueryResult, Result};

/// Runs a compiled statement on a borrowed connection
///
/// Implementations must not keep the connection past the call.
#[async_trait]
pub trait ExecutionPipeline: Send + Sync {
    async fn run(&self, connection: &dyn Connection, statement: &CompiledStatement) -> Result<QueryResult>;
}

/// Sends the statement as-is and returns every row
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectPipeline;

#[async_trait]
impl ExecutionPipeline for DirectPipeline {
    #[tracing::instrument(skip_all, fields(driver = %connection.driver_name(), params = statement.parameters.len()))]
    async fn run(&self, connection: &dyn Connection, statement: &CompiledStatement) -> Result<QueryResult> {
        let result = connection
            .query(&statement.dialect_sql, &statement.parameters)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "query execution failed");
                e
            })?;
        tracing::info!(
            rows = result.rows.len(),
            execution_time_ms = result.execution_time_ms,
            "query executed successfully"
        );
        Ok(result)
    }
}
