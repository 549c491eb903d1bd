// Collaborator boundaries consumed by the runner loop
// Decision: execution backends vary (container drivers, in-process stubs) -
// the runner only sees this trait

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ExecutionConfig;
use crate::error::{DatastoreError, ExecutorError};
use crate::task::{Task, TaskStatus};

/// Outcome of one tracked task execution.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: TaskStatus,
    pub error: Option<String>,
}

impl RunResult {
    pub fn success() -> Self {
        Self {
            status: TaskStatus::Success,
            error: None,
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Error,
            error: Some(msg.into()),
        }
    }
}

/// Execution backend invoked once per admitted task.
///
/// Implementations own memory reservation and release for the task's
/// lifetime, and record state transitions through the supplied datastore
/// handle. The runner never inspects the result beyond logging it.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn run_tracked_task(
        &self,
        task: Task,
        cfg: ExecutionConfig,
        ds: Arc<dyn Datastore>,
    ) -> Result<RunResult, ExecutorError>;
}

/// Persistence handle passed through to the execution backend.
///
/// The runner loop itself never calls this; it only threads the handle into
/// each dispatch.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Record a task state transition.
    async fn update_task_status(
        &self,
        task: &Task,
        status: TaskStatus,
        error: Option<&str>,
    ) -> Result<(), DatastoreError>;
}
