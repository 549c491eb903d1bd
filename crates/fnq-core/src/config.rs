// Execution configuration built per dispatched task

use std::collections::HashMap;
use std::time::Duration;

use crate::task::Task;

/// Default timeouts applied when a task carries none of its own.
///
/// These are injected into the runner at construction rather than read from
/// process globals, so embedding processes can tune them per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefaults {
    /// Execution timeout when the task does not specify one.
    pub timeout: Duration,
    /// Hot-container idle timeout when the task does not specify one.
    pub idle_timeout: Duration,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration handed to the execution backend for one dispatch.
///
/// Constructed once per fetched task immediately before dispatch and consumed
/// by the executor; never persisted or reused.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub task_id: String,
    pub image: String,
    pub app_name: String,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
    pub idle_timeout: Duration,
}

impl ExecutionConfig {
    /// Build the execution configuration for a task, applying the default
    /// timeout policy: positive wire values are honored, absent or
    /// non-positive values fall back to `defaults`.
    pub fn from_task(task: &Task, defaults: &TaskDefaults) -> Self {
        Self {
            task_id: task.id.clone(),
            image: task.image.clone(),
            app_name: task.app_name.clone(),
            env: task.env_vars.clone(),
            timeout: wire_seconds_or(task.timeout, defaults.timeout),
            idle_timeout: wire_seconds_or(task.idle_timeout, defaults.idle_timeout),
        }
    }
}

fn wire_seconds_or(wire: Option<i64>, default: Duration) -> Duration {
    match wire {
        Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
        _ => default,
    }
}
