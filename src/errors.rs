//! Error types for the resource pool

use thiserror::Error;

/// Errors raised by the pool itself.
///
/// Factory failures are never wrapped in this type: [`Pool::acquire`](crate::Pool::acquire)
/// hands back the factory's own error unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Idle queue is empty - nothing to pop")]
    EmptyQueue,

    #[error("No Tokio runtime available to schedule idle eviction")]
    NoRuntime,

    #[error("Metrics export failed: {0}")]
    MetricsExport(String),
}

pub type PoolResult<T> = Result<T, PoolError>;
