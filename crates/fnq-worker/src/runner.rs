// Async runner loop
//
// One single-threaded cooperative loop drives admission, fetch, and
// acknowledge in sequence; each admitted task's execution runs as its own
// tracked tokio task. The gate is consulted before each fetch, not at the
// moment the execution backend reserves memory, so bursts can transiently
// over-admit: admission is best-effort backpressure, not a hard limit.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use fnq_core::{CapacityGate, Datastore, ExecutionConfig, Task, TaskExecutor};

use crate::config::RunnerConfig;
use crate::dispatch::Dispatcher;
use crate::queue::{QueueClient, QueueError};

/// Runner lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    /// Constructed but not yet running
    Idle,
    /// Polling and dispatching
    Running,
    /// Shutdown received; waiting for in-flight executions
    Draining,
    /// Drained and returned
    Stopped,
}

/// The asynchronous execution loop: poll -> gate -> fetch -> dispatch ->
/// acknowledge, repeated until shutdown, then drained.
///
/// A task is acknowledged immediately after dispatch, before execution
/// finishes or even starts. A crash between dispatch and completion loses
/// the task: delivery is at-most-once.
///
/// No steady-state error escapes [`run`](AsyncRunner::run); fetch,
/// acknowledge, and execution failures are logged and the loop continues.
/// The only fatal error is a malformed queue endpoint, rejected at
/// construction.
pub struct AsyncRunner {
    config: RunnerConfig,
    queue: QueueClient,
    gate: Arc<dyn CapacityGate>,
    executor: Arc<dyn TaskExecutor>,
    datastore: Arc<dyn Datastore>,
    dispatcher: Dispatcher,
    status: std::sync::RwLock<RunnerStatus>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl AsyncRunner {
    /// Create a runner over the queue endpoint in `config`.
    ///
    /// Fails only when the endpoint cannot be parsed - the surrounding
    /// process must treat that as a startup error.
    pub fn new(
        config: RunnerConfig,
        gate: Arc<dyn CapacityGate>,
        executor: Arc<dyn TaskExecutor>,
        datastore: Arc<dyn Datastore>,
    ) -> Result<Self, QueueError> {
        let queue = QueueClient::new(&config.endpoint, config.request_timeout)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            queue,
            gate,
            executor,
            datastore,
            dispatcher: Dispatcher::new(),
            status: std::sync::RwLock::new(RunnerStatus::Idle),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Signal the runner to stop fetching and drain.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Current lifecycle status.
    pub fn status(&self) -> RunnerStatus {
        *self.status.read().unwrap()
    }

    /// Number of dispatched executions still in flight.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// The normalized queue endpoint this runner polls.
    pub fn endpoint(&self) -> &url::Url {
        self.queue.endpoint()
    }

    /// Run the loop until shutdown, then wait for every dispatched
    /// execution to finish before returning.
    pub async fn run(&self) {
        info!(
            runner_id = %self.config.runner_id,
            endpoint = %self.queue.endpoint(),
            "starting async runner"
        );
        *self.status.write().unwrap() = RunnerStatus::Running;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            if !self.gate.has_available_memory() {
                debug!(runner_id = %self.config.runner_id, "memory full");
                if self.wait().await {
                    break;
                }
                continue;
            }

            let task = match self.queue.fetch_next().await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    if self.wait().await {
                        break;
                    }
                    continue;
                }
                Err(err) if err.is_timeout() => {
                    error!(
                        runner_id = %self.config.runner_id,
                        error = %err,
                        "could not fetch task, timeout"
                    );
                    continue;
                }
                Err(err) => {
                    error!(
                        runner_id = %self.config.runner_id,
                        error = %err,
                        "could not fetch task"
                    );
                    if self.wait().await {
                        break;
                    }
                    continue;
                }
            };

            debug!(
                runner_id = %self.config.runner_id,
                task_id = %task.id,
                "running task"
            );
            self.dispatch(task.clone());

            // Remove the task from the queue. Failure is logged, never
            // retried; the dispatched execution stands either way.
            if let Err(err) = self.queue.acknowledge(&task).await {
                error!(
                    runner_id = %self.config.runner_id,
                    task_id = %task.id,
                    error = %err,
                    "cannot acknowledge task"
                );
                continue;
            }

            info!(
                runner_id = %self.config.runner_id,
                task_id = %task.id,
                "task accepted"
            );
        }

        *self.status.write().unwrap() = RunnerStatus::Draining;
        info!(
            runner_id = %self.config.runner_id,
            in_flight = self.dispatcher.in_flight(),
            "draining async runner"
        );
        self.dispatcher.drain().await;
        *self.status.write().unwrap() = RunnerStatus::Stopped;
        info!(runner_id = %self.config.runner_id, "async runner stopped");
    }

    /// Start one tracked execution for a fetched task.
    fn dispatch(&self, task: Task) {
        let cfg = ExecutionConfig::from_task(&task, &self.config.defaults);
        let executor = Arc::clone(&self.executor);
        let datastore = Arc::clone(&self.datastore);

        self.dispatcher.spawn(async move {
            let task_id = task.id.clone();
            match executor.run_tracked_task(task, cfg, datastore).await {
                Ok(result) => {
                    debug!(task_id = %task_id, status = %result.status, "processed task");
                }
                Err(err) => {
                    error!(task_id = %task_id, error = %err, "cannot run task");
                }
            }
        });
    }

    /// Sleep one poll interval; returns true when shutdown arrived instead.
    async fn wait(&self) -> bool {
        if *self.shutdown_rx.borrow() {
            return true;
        }
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.config.poll_interval) => false,
            _ = shutdown_rx.changed() => true,
        }
    }
}
