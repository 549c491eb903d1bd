// Error types for the execution and persistence boundaries

use thiserror::Error;

/// Errors surfaced by the persistence collaborator.
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// Underlying store query failed
    #[error("datastore query failed: {0}")]
    Query(String),

    /// Referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

impl DatastoreError {
    /// Create a query error
    pub fn query(msg: impl Into<String>) -> Self {
        DatastoreError::Query(msg.into())
    }
}

/// Errors surfaced by the execution collaborator.
///
/// These never stop the runner loop: the task was already acknowledged to
/// the queue by the time execution runs, so failures are logged and the
/// loop continues.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The backend could not reserve memory for the task
    #[error("not enough memory to run task")]
    OutOfMemory,

    /// Function driver failure
    #[error("driver error: {0}")]
    Driver(String),

    /// Task exceeded its execution timeout
    #[error("task timed out")]
    Timeout,

    /// Persistence failure while recording task state
    #[error("datastore error: {0}")]
    Datastore(#[from] DatastoreError),
}

impl ExecutorError {
    /// Create a driver error
    pub fn driver(msg: impl Into<String>) -> Self {
        ExecutorError::Driver(msg.into())
    }
}
