// Integration tests for the async runner loop
// Run with: cargo test -p fnq-worker --test async_runner
//
// The queue service is a wiremock server; execution, persistence, and the
// capacity gate are in-process mocks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fnq_core::{
    CapacityGate, Datastore, DatastoreError, ExecutionConfig, ExecutorError, RunResult, Task,
    TaskExecutor, TaskStatus,
};
use fnq_worker::{AsyncRunner, RunnerConfig, RunnerStatus};

// =============================================================================
// Mock collaborators
// =============================================================================

struct TestGate {
    open: AtomicBool,
}

impl TestGate {
    fn new(open: bool) -> Arc<Self> {
        Arc::new(Self {
            open: AtomicBool::new(open),
        })
    }
}

impl CapacityGate for TestGate {
    fn has_available_memory(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

struct MockExecutor {
    seen: Mutex<Vec<(Task, ExecutionConfig)>>,
    started: AtomicUsize,
    completed: AtomicUsize,
    // When set, executions block until a permit is released
    hold: Option<Arc<tokio::sync::Semaphore>>,
}

impl MockExecutor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            hold: None,
        })
    }

    fn holding(hold: Arc<tokio::sync::Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            hold: Some(hold),
        })
    }

    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskExecutor for MockExecutor {
    async fn run_tracked_task(
        &self,
        task: Task,
        cfg: ExecutionConfig,
        ds: Arc<dyn Datastore>,
    ) -> Result<RunResult, ExecutorError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        ds.update_task_status(&task, TaskStatus::Running, None)
            .await?;
        self.seen.lock().unwrap().push((task.clone(), cfg));

        if let Some(hold) = &self.hold {
            hold.acquire()
                .await
                .map_err(|e| ExecutorError::driver(e.to_string()))?
                .forget();
        }

        ds.update_task_status(&task, TaskStatus::Success, None)
            .await?;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(RunResult::success())
    }
}

struct RecordingDatastore {
    updates: Mutex<Vec<(String, TaskStatus)>>,
}

impl RecordingDatastore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            updates: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Datastore for RecordingDatastore {
    async fn update_task_status(
        &self,
        task: &Task,
        status: TaskStatus,
        _error: Option<&str>,
    ) -> Result<(), DatastoreError> {
        self.updates.lock().unwrap().push((task.id.clone(), status));
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn runner_for(
    server: &MockServer,
    gate: Arc<TestGate>,
    executor: Arc<MockExecutor>,
    datastore: Arc<RecordingDatastore>,
    poll_interval: Duration,
) -> Arc<AsyncRunner> {
    let config = RunnerConfig::new(server.uri())
        .with_poll_interval(poll_interval)
        .with_request_timeout(Duration::from_secs(5))
        .with_runner_id("async-test");
    Arc::new(AsyncRunner::new(config, gate, executor, datastore).unwrap())
}

fn spawn_runner(runner: &Arc<AsyncRunner>) -> tokio::task::JoinHandle<()> {
    let runner = Arc::clone(runner);
    tokio::spawn(async move { runner.run().await })
}

async fn eventually(f: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

fn task_body(id: &str) -> serde_json::Value {
    json!({"id": id, "image": "img", "app_name": "app1"})
}

fn empty_body() -> serde_json::Value {
    json!({"id": ""})
}

async fn mount_single_task(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_body(id)))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .mount(server)
        .await;
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn fetched_task_is_dispatched_and_acknowledged_once() {
    let server = MockServer::start().await;
    mount_single_task(&server, "t1").await;
    Mock::given(method("DELETE"))
        .and(body_partial_json(json!({"id": "t1"})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let executor = MockExecutor::new();
    let datastore = RecordingDatastore::new();
    let runner = runner_for(
        &server,
        TestGate::new(true),
        Arc::clone(&executor),
        Arc::clone(&datastore),
        Duration::from_millis(50),
    );
    let handle = spawn_runner(&runner);

    assert!(eventually(|| executor.completed() == 1, Duration::from_secs(5)).await);

    runner.shutdown();
    handle.await.unwrap();

    // The executor saw the task with default timeouts applied
    let seen = executor.seen.lock().unwrap();
    let (task, cfg) = &seen[0];
    assert_eq!(task.id, "t1");
    assert_eq!(cfg.task_id, "t1");
    assert_eq!(cfg.image, "img");
    assert_eq!(cfg.app_name, "app1");
    assert_eq!(cfg.timeout, Duration::from_secs(30));
    assert_eq!(cfg.idle_timeout, Duration::from_secs(30));

    // The datastore handle was threaded through to the execution
    let updates = datastore.updates.lock().unwrap();
    assert_eq!(
        *updates,
        vec![
            ("t1".to_string(), TaskStatus::Running),
            ("t1".to_string(), TaskStatus::Success),
        ]
    );

    // DELETE count is verified by wiremock on drop
}

#[tokio::test]
async fn acknowledge_failure_is_logged_and_loop_continues() {
    let server = MockServer::start().await;
    mount_single_task(&server, "t1").await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already claimed"))
        .expect(1)
        .mount(&server)
        .await;

    let executor = MockExecutor::new();
    let runner = runner_for(
        &server,
        TestGate::new(true),
        Arc::clone(&executor),
        RecordingDatastore::new(),
        Duration::from_millis(20),
    );
    let handle = spawn_runner(&runner);

    assert!(eventually(|| executor.completed() == 1, Duration::from_secs(5)).await);
    // Let several more iterations pass: the failed acknowledge must not be
    // retried and the task must not be dispatched again
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(executor.started(), 1);

    runner.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn closed_gate_prevents_any_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_body("t1")))
        .expect(0)
        .mount(&server)
        .await;

    let executor = MockExecutor::new();
    let runner = runner_for(
        &server,
        TestGate::new(false),
        Arc::clone(&executor),
        RecordingDatastore::new(),
        Duration::from_millis(20),
    );
    let handle = spawn_runner(&runner);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(executor.started(), 0);

    runner.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn reopened_gate_resumes_fetching() {
    let server = MockServer::start().await;
    mount_single_task(&server, "t1").await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let gate = TestGate::new(false);
    let executor = MockExecutor::new();
    let runner = runner_for(
        &server,
        Arc::clone(&gate),
        Arc::clone(&executor),
        RecordingDatastore::new(),
        Duration::from_millis(20),
    );
    let handle = spawn_runner(&runner);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(executor.started(), 0);

    gate.open.store(true, Ordering::SeqCst);
    assert!(eventually(|| executor.completed() == 1, Duration::from_secs(5)).await);

    runner.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn empty_task_records_are_never_dispatched() {
    let server = MockServer::start().await;
    // Fully-populated record with an empty id: still "no task pending"
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "", "image": "img", "app_name": "app1",
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let executor = MockExecutor::new();
    let runner = runner_for(
        &server,
        TestGate::new(true),
        Arc::clone(&executor),
        RecordingDatastore::new(),
        Duration::from_millis(20),
    );
    let handle = spawn_runner(&runner);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(executor.started(), 0);

    runner.shutdown();
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_errors_retry_without_sleeping() {
    let server = MockServer::start().await;
    // Two requests stall past the client budget, then a real task is served.
    // The runner's poll interval is far larger than the whole test budget:
    // if it slept on either timeout the task could not complete in time.
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(empty_body())
                .set_delay(Duration::from_millis(500)),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_single_task(&server, "t1").await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let executor = MockExecutor::new();
    let config = RunnerConfig::new(server.uri())
        .with_poll_interval(Duration::from_secs(60))
        .with_request_timeout(Duration::from_millis(100))
        .with_runner_id("async-test");
    let runner = Arc::new(
        AsyncRunner::new(
            config,
            TestGate::new(true),
            Arc::clone(&executor) as Arc<dyn TaskExecutor>,
            RecordingDatastore::new(),
        )
        .unwrap(),
    );
    let handle = spawn_runner(&runner);

    assert!(
        eventually(|| executor.completed() == 1, Duration::from_secs(10)).await,
        "timeout retries must not wait out the poll interval"
    );

    runner.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn shutdown_drains_in_flight_executions_before_returning() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_body("t1")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_body("t2")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let hold = Arc::new(tokio::sync::Semaphore::new(0));
    let executor = MockExecutor::holding(Arc::clone(&hold));
    let runner = runner_for(
        &server,
        TestGate::new(true),
        Arc::clone(&executor),
        RecordingDatastore::new(),
        Duration::from_millis(20),
    );
    let handle = spawn_runner(&runner);

    // Both executions started and are now blocked inside the executor
    assert!(eventually(|| executor.started() == 2, Duration::from_secs(5)).await);
    assert_eq!(runner.in_flight(), 2);

    runner.shutdown();

    // The loop must not return while work is in flight
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());
    assert_eq!(executor.completed(), 0);
    assert_eq!(runner.status(), RunnerStatus::Draining);

    hold.add_permits(2);
    handle.await.unwrap();

    // run() returned only after every dispatched execution finished
    assert_eq!(executor.completed(), 2);
    assert_eq!(runner.in_flight(), 0);
    assert_eq!(runner.status(), RunnerStatus::Stopped);
}

#[tokio::test]
async fn wire_timeouts_override_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t1", "image": "img", "app_name": "app1",
            "timeout": 120, "idle_timeout": 7,
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let executor = MockExecutor::new();
    let runner = runner_for(
        &server,
        TestGate::new(true),
        Arc::clone(&executor),
        RecordingDatastore::new(),
        Duration::from_millis(20),
    );
    let handle = spawn_runner(&runner);

    assert!(eventually(|| executor.completed() == 1, Duration::from_secs(5)).await);
    runner.shutdown();
    handle.await.unwrap();

    let seen = executor.seen.lock().unwrap();
    let (_, cfg) = &seen[0];
    assert_eq!(cfg.timeout, Duration::from_secs(120));
    assert_eq!(cfg.idle_timeout, Duration::from_secs(7));
}
