// Queue service protocol adapter
//
// The queue is consumed as a black box through two HTTP operations:
// GET <endpoint> returns the next pending task (empty id = nothing pending,
// HTTP 200 either way), DELETE <endpoint> with the JSON task body
// acknowledges it (202 Accepted is the only success status).

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use fnq_core::Task;

/// Errors from the queue protocol.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Queue endpoint address could not be parsed. The only startup-fatal
    /// error in the subsystem: the runner must not start without a usable
    /// endpoint.
    #[error("cannot parse queue endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    /// Request timed out. Retried without delay - timeouts are expected
    /// under load and must not throttle the poll loop.
    #[error("queue request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Any other transport failure
    #[error("queue transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Response body was not a task record
    #[error("cannot decode task: {0}")]
    Decode(#[source] reqwest::Error),

    /// Acknowledge was refused; `body` is the queue's response verbatim
    #[error("queue refused acknowledge ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
}

impl QueueError {
    /// Timeout-class errors are retried immediately; everything else waits
    /// one poll interval.
    pub fn is_timeout(&self) -> bool {
        matches!(self, QueueError::Timeout(_))
    }
}

impl From<reqwest::Error> for QueueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QueueError::Timeout(err)
        } else if err.is_decode() {
            QueueError::Decode(err)
        } else {
            QueueError::Transport(err)
        }
    }
}

/// Client for the queue service's task endpoint.
pub struct QueueClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl QueueClient {
    /// Build a client for the given queue address.
    ///
    /// The address is normalized once here; see [`normalize_endpoint`].
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, QueueError> {
        let endpoint = normalize_endpoint(endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(QueueError::Transport)?;
        Ok(Self { http, endpoint })
    }

    /// The normalized endpoint this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch the next pending task.
    ///
    /// Returns `Ok(None)` when the queue has nothing pending (a record with
    /// an empty id). Transport and decode failures are errors.
    pub async fn fetch_next(&self) -> Result<Option<Task>, QueueError> {
        let resp = self.http.get(self.endpoint.clone()).send().await?;
        let task: Task = resp.json().await?;
        if task.is_empty() {
            return Ok(None);
        }
        debug!(task_id = %task.id, "fetched task");
        Ok(Some(task))
    }

    /// Acknowledge (delete) a task, removing it from the queue.
    ///
    /// Success is exactly `202 Accepted`; any other status is surfaced with
    /// the response body as the error detail.
    pub async fn acknowledge(&self, task: &Task) -> Result<(), QueueError> {
        let resp = self
            .http
            .delete(self.endpoint.clone())
            .json(task)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::ACCEPTED {
            let body = resp.text().await.unwrap_or_default();
            return Err(QueueError::Rejected { status, body });
        }
        debug!(task_id = %task.id, "acknowledged task");
        Ok(())
    }
}

/// Normalize a queue address: a bare authority gets the `http` scheme, and
/// an empty or root path becomes `/tasks`. An explicit path is left alone.
///
/// - `host:1234` -> `http://host:1234/tasks`
/// - `https://host/` -> `https://host/tasks`
/// - `https://host/custom` -> unchanged
pub fn normalize_endpoint(raw: &str) -> Result<Url, QueueError> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let mut url = Url::parse(&candidate).map_err(|source| QueueError::InvalidEndpoint {
        endpoint: raw.to_string(),
        source,
    })?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/tasks");
    }

    Ok(url)
}
