// Runner configuration

use std::time::Duration;

use fnq_core::TaskDefaults;

/// Configuration for the async runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Queue service address. Normalized at startup: scheme defaults to
    /// `http`, path defaults to `/tasks`.
    pub endpoint: String,

    /// Fixed wait applied when capacity is unavailable, the queue is empty,
    /// or a non-timeout fetch error occurred.
    pub poll_interval: Duration,

    /// Per-request budget for queue HTTP calls.
    pub request_timeout: Duration,

    /// Default timeouts applied to tasks that carry none.
    pub defaults: TaskDefaults,

    /// Identity attached to every log event this runner emits.
    pub runner_id: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/tasks".to_string(),
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            defaults: TaskDefaults::default(),
            runner_id: format!("async-{}", uuid::Uuid::now_v7()),
        }
    }
}

impl RunnerConfig {
    /// Create a configuration for the given queue endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// - `QUEUE_URL`: queue service address
    /// - `POLL_INTERVAL_MS`: wait between idle polls (default 1000)
    /// - `REQUEST_TIMEOUT_MS`: queue HTTP request budget (default 30000)
    /// - `TASK_TIMEOUT_SECS` / `TASK_IDLE_TIMEOUT_SECS`: task defaults
    /// - `RUNNER_ID`: log-correlation identity
    pub fn from_env() -> Self {
        let base = Self::default();

        let millis = |name: &str, default: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };
        let secs = |name: &str, default: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            endpoint: std::env::var("QUEUE_URL").unwrap_or(base.endpoint),
            poll_interval: millis("POLL_INTERVAL_MS", base.poll_interval),
            request_timeout: millis("REQUEST_TIMEOUT_MS", base.request_timeout),
            defaults: TaskDefaults {
                timeout: secs("TASK_TIMEOUT_SECS", base.defaults.timeout),
                idle_timeout: secs("TASK_IDLE_TIMEOUT_SECS", base.defaults.idle_timeout),
            },
            runner_id: std::env::var("RUNNER_ID").unwrap_or(base.runner_id),
        }
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the queue request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the default task timeouts
    pub fn with_defaults(mut self, defaults: TaskDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set the runner identity
    pub fn with_runner_id(mut self, id: impl Into<String>) -> Self {
        self.runner_id = id.into();
        self
    }
}
