//! Query execution for sqlgate
//!
//! The [`ExecutionAdapter`] is the only path from a [`Query`](sqlgate_core::Query)
//! to a backend: it authorizes, compiles, borrows a connection for the
//! duration of one call and hands the statement to an [`ExecutionPipeline`].

mod engine;
mod pipeline;
mod scoped;

pub use engine::ExecutionAdapter;
pub use pipeline::{DirectPipeline, ExecutionPipeline};
pub use scoped::{ConnectionSource, DriverConnectionSource, ScopedConnection};
