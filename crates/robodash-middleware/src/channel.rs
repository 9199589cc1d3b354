//! [`RemoteChannel`] – ordered, timeout-bounded remote writer.
//!
//! Callers enqueue a job (one or more [`WriteStep`]s tagged with a caller
//! chosen value) and return immediately.  A single writer task applies jobs
//! in submission order, bounds every step by the configured timeout and
//! reports a [`WriteOutcome`] for each job on the caller's outcome channel.
//!
//! A failed step aborts the remaining steps of its job.  Nothing is retried.
//! If the outcome channel closes, jobs already queued are still applied
//! before the writer stops.

use std::sync::Arc;
use std::time::Duration;

use robodash_types::DashError;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::store::RemoteStore;

/// One remote operation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteStep {
    /// Replace the value at `path`.
    Set { path: String, value: Value },
    /// Append `value` under the list at `path`.
    Push { path: String, value: Value },
}

impl WriteStep {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        WriteStep::Set {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn push(path: impl Into<String>, value: impl Into<Value>) -> Self {
        WriteStep::Push {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            WriteStep::Set { path, .. } | WriteStep::Push { path, .. } => path,
        }
    }

    async fn apply(&self, store: &dyn RemoteStore) -> Result<(), DashError> {
        match self {
            WriteStep::Set { path, value } => store.set(path, value.clone()).await,
            WriteStep::Push { path, value } => store.push(path, value.clone()).await.map(|_| ()),
        }
    }
}

/// Result of one enqueued job.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome<T> {
    pub tag: T,
    pub result: Result<(), DashError>,
}

struct WriteJob<T> {
    tag: T,
    steps: Vec<WriteStep>,
}

/// Handle to the writer task.  Clone it cheaply; all clones feed the same
/// ordered queue.
pub struct RemoteChannel<T> {
    jobs: mpsc::UnboundedSender<WriteJob<T>>,
    store: Arc<dyn RemoteStore>,
    timeout: Duration,
}

impl<T> Clone for RemoteChannel<T> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            store: Arc::clone(&self.store),
            timeout: self.timeout,
        }
    }
}

impl<T: Send + 'static> RemoteChannel<T> {
    /// Spawn the writer task.  Outcomes are converted into `M` and sent to
    /// `outcomes`; the task stops once `outcomes` is closed and the queue is
    /// drained, or once every handle has been dropped.
    pub fn spawn<M>(
        store: Arc<dyn RemoteStore>,
        timeout: Duration,
        outcomes: mpsc::UnboundedSender<M>,
    ) -> Self
    where
        M: From<WriteOutcome<T>> + Send + 'static,
    {
        let (jobs, mut rx) = mpsc::unbounded_channel::<WriteJob<T>>();
        let writer_store = Arc::clone(&store);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let result = run_steps(writer_store.as_ref(), &job.steps, timeout).await;
                if outcomes.send(M::from(WriteOutcome { tag: job.tag, result })).is_err() {
                    // Jobs already accepted still reach the store, unreported.
                    let mut drained = 0usize;
                    while let Ok(job) = rx.try_recv() {
                        let _ = run_steps(writer_store.as_ref(), &job.steps, timeout).await;
                        drained += 1;
                    }
                    debug!(drained, "write outcome receiver closed; stopping writer");
                    break;
                }
            }
        });
        Self {
            jobs,
            store,
            timeout,
        }
    }

    /// Queue `steps` under `tag`.  Never blocks.
    pub fn enqueue(&self, tag: T, steps: Vec<WriteStep>) -> Result<(), DashError> {
        self.jobs
            .send(WriteJob { tag, steps })
            .map_err(|_| DashError::Channel("remote writer has stopped".to_string()))
    }

    /// Apply `step` immediately, bypassing the queue, bounded by the timeout.
    ///
    /// Used for teardown, where the caller waits for the result.
    pub async fn write_now(&self, step: WriteStep) -> Result<(), DashError> {
        run_steps(self.store.as_ref(), std::slice::from_ref(&step), self.timeout).await
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

async fn run_steps(
    store: &dyn RemoteStore,
    steps: &[WriteStep],
    timeout: Duration,
) -> Result<(), DashError> {
    for step in steps {
        match tokio::time::timeout(timeout, step.apply(store)).await {
            Ok(Ok(())) => debug!(path = step.path(), "remote write ok"),
            Ok(Err(e)) => {
                warn!(path = step.path(), error = %e, "remote write failed");
                return Err(e);
            }
            Err(_) => {
                let after_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(path = step.path(), after_ms, "remote write timed out");
                return Err(DashError::Timeout {
                    path: step.path().to_string(),
                    after_ms,
                });
            }
        }
    }
    Ok(())
}
