//! # fnq async execution worker
//!
//! The asynchronous half of the platform's execution engine: a polling loop
//! that pulls pending invocation tasks from the queue service, admits them
//! against shared memory accounting, dispatches each as an independent
//! tokio task, and drains in-flight work on shutdown.
//!
//! ## Delivery guarantee
//!
//! A task is acknowledged (removed from the queue) immediately after
//! dispatch, before its execution completes or even starts. A crash between
//! dispatch and completion therefore loses the task: delivery is
//! at-most-once by design.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fnq_core::MemoryTracker;
//! use fnq_worker::{AsyncRunner, RunnerConfig};
//!
//! let config = RunnerConfig::from_env();
//! let tracker = Arc::new(MemoryTracker::new(total_ram));
//! let runner = Arc::new(AsyncRunner::new(config, tracker, executor, datastore)?);
//!
//! let handle = tokio::spawn({
//!     let runner = Arc::clone(&runner);
//!     async move { runner.run().await }
//! });
//!
//! tokio::signal::ctrl_c().await?;
//! runner.shutdown();
//! handle.await?; // returns once in-flight executions have drained
//! ```

pub mod config;
pub mod dispatch;
pub mod queue;
pub mod runner;

pub use config::RunnerConfig;
pub use dispatch::Dispatcher;
pub use queue::{QueueClient, QueueError};
pub use runner::{AsyncRunner, RunnerStatus};
