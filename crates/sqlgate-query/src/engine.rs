//! Guarded query execution

use std::sync::Arc;

use sqlgate_core::{
    ConnectionMetadata, DriverRegistry, GateConfig, GateError, Query, QueryResult, Result,
    SecurityGuard, SessionOptions, TranslateOptions,
};

use crate::{ConnectionSource, DirectPipeline, ExecutionPipeline, ScopedConnection};

/// Authorizes, compiles and runs queries against registered drivers
pub struct ExecutionAdapter {
    guard: SecurityGuard,
    source: Arc<dyn ConnectionSource>,
    pipeline: Arc<dyn ExecutionPipeline>,
    translate_options: TranslateOptions,
    session_options: SessionOptions,
}

impl ExecutionAdapter {
    pub fn new(guard: SecurityGuard, source: Arc<dyn ConnectionSource>) -> Self {
        Self {
            guard,
            source,
            pipeline: Arc::new(DirectPipeline),
            translate_options: TranslateOptions::default(),
            session_options: SessionOptions::default(),
        }
    }

    /// Build an adapter with the policies and options of `config`
    pub fn from_config(
        config: &GateConfig,
        registry: Arc<DriverRegistry>,
        source: Arc<dyn ConnectionSource>,
    ) -> Result<Self> {
        Ok(
            Self::new(SecurityGuard::new(registry, config.policy_set()), source)
                .with_translate_options(config.translate_options()?)
                .with_session_options(config.session_options()),
        )
    }

    pub fn with_pipeline(mut self, pipeline: Arc<dyn ExecutionPipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_translate_options(mut self, options: TranslateOptions) -> Self {
        self.translate_options = options;
        self
    }

    pub fn with_session_options(mut self, options: SessionOptions) -> Self {
        self.session_options = options;
        self
    }

    /// Run `query` on the connection described by `metadata`
    ///
    /// Nothing is acquired unless the guard allows the query. The connection
    /// goes back to its source on every exit path.
    #[tracing::instrument(skip(self, query, metadata), fields(connection_id = %metadata.connection_id))]
    pub async fn execute(
        &self,
        driver_id: &str,
        query: &Query,
        metadata: &ConnectionMetadata,
    ) -> Result<QueryResult> {
        if metadata.driver_id != driver_id {
            return Err(GateError::Configuration(format!(
                "connection metadata belongs to driver '{}', not '{}'",
                metadata.driver_id, driver_id
            )));
        }

        let (statement, session_statements) = {
            let driver = self.guard.registry().resolve(driver_id)?;
            self.guard.authorize(query, metadata)?.into_result()?;
            let statement = query.compile(driver, &self.translate_options)?;
            (statement, driver.session_setup(&self.session_options))
        };
        tracing::debug!(sql = %statement.dialect_sql, "compiled statement");

        let scoped = ScopedConnection::acquire(Arc::clone(&self.source), metadata).await?;
        for sql in &session_statements {
            scoped.connection().execute(sql, &[]).await?;
        }
        self.pipeline.run(scoped.connection(), &statement).await
    }
}
