// Task wire model (owned by the queue service, read-only here)

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One queued invocation request awaiting execution.
///
/// This is the JSON record the queue service hands out. Every field defaults
/// so that a minimal record decodes cleanly - the queue signals "nothing
/// pending" with a record whose `id` is the empty string (HTTP 200 in both
/// cases), so decoding must never fail on sparse bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Opaque unique identifier, stable for the task's lifetime.
    /// Empty means "no task available", never a real unit of work.
    #[serde(default)]
    pub id: String,

    /// Reference to the executable unit (function image) to run.
    #[serde(default)]
    pub image: String,

    /// Application the task belongs to.
    #[serde(default)]
    pub app_name: String,

    /// Environment passed to the function, insertion order irrelevant.
    #[serde(default)]
    pub env_vars: HashMap<String, String>,

    /// Invocation input, passed through to the function untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    /// Queue-owned ordering hint, opaque to the runner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    /// When the queue accepted the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Execution timeout in seconds. Absent or non-positive means
    /// "use the configured default".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,

    /// Hot-container idle timeout in seconds, same default rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<i64>,
}

impl Task {
    /// The queue's encoding for "no task pending".
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// Task lifecycle status as recorded by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Success,
    Error,
    Timeout,
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
            TaskStatus::Timeout => "timeout",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
