//! Waiting for asynchronously processed remote tasks
//!
//! The minting service answers a submission with a task id and finishes the
//! work later. [`TaskPoller`] re-fetches the task at a fixed interval until the
//! snapshot is terminal, the attempt or time budget runs out, or the shared
//! cancellation token fires.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use crate::client::TaskHandle;
use crate::error::{ApiError, PollError};

/// Polling bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay between two status fetches
    pub interval: Duration,
    /// Give up after this many fetches
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed since the first fetch
    pub max_duration: Option<Duration>,
    /// Consecutive transport failures tolerated before giving up
    pub transport_retries: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: None,
            max_duration: Some(Duration::from_secs(900)), // 15 minutes
            transport_retries: 0,
        }
    }
}

/// State of a remote task as reported by one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskProgress<T> {
    Pending,
    Completed(T),
    Failed(String),
}

/// A snapshot type the poller knows how to interpret
pub trait PollTarget {
    type Output;

    fn progress(self) -> TaskProgress<Self::Output>;
}

/// Fixed-interval poller with a time budget and cancellation
#[derive(Debug, Clone)]
pub struct TaskPoller {
    config: PollerConfig,
    cancel: CancellationToken,
}

impl TaskPoller {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token, typically the process shutdown token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetch snapshots of `task` until one is terminal
    pub async fn wait_for_completion<T, F, Fut>(
        &self,
        task: &TaskHandle,
        mut fetch: F,
    ) -> Result<T::Output, PollError>
    where
        T: PollTarget,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut transport_failures: u32 = 0;

        loop {
            attempts += 1;
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.cancelled(task)),
                fetched = fetch() => fetched,
            };

            match fetched {
                Ok(snapshot) => {
                    transport_failures = 0;
                    match snapshot.progress() {
                        TaskProgress::Completed(output) => {
                            debug!(task_id = %task, attempts, "Remote task completed");
                            return Ok(output);
                        }
                        TaskProgress::Failed(message) => {
                            warn!(task_id = %task, attempts, %message, "Remote task reported failure");
                            return Err(PollError::RemoteReportedFailure(message));
                        }
                        TaskProgress::Pending => {
                            debug!(task_id = %task, attempts, "Remote task still pending");
                        }
                    }
                }
                Err(err) => {
                    transport_failures += 1;
                    if transport_failures > self.config.transport_retries {
                        return Err(PollError::Transport(err));
                    }
                    warn!(
                        task_id = %task,
                        attempts,
                        transport_failures,
                        error = %err,
                        "Task status fetch failed, will retry"
                    );
                }
            }

            if let Some(max_attempts) = self.config.max_attempts {
                if attempts >= max_attempts {
                    return Err(self.timed_out(task, attempts, started));
                }
            }

            let mut wait = self.config.interval;
            if let Some(max_duration) = self.config.max_duration {
                let elapsed = started.elapsed();
                if elapsed >= max_duration {
                    return Err(self.timed_out(task, attempts, started));
                }
                wait = wait.min(max_duration - elapsed);
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.cancelled(task)),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn timed_out(&self, task: &TaskHandle, attempts: u32, started: Instant) -> PollError {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        warn!(task_id = %task, attempts, elapsed_ms, "Gave up waiting for remote task");
        PollError::Timeout {
            task_id: task.to_string(),
            attempts,
            elapsed_ms,
        }
    }

    fn cancelled(&self, task: &TaskHandle) -> PollError {
        warn!(task_id = %task, "Polling cancelled");
        PollError::Cancelled {
            task_id: task.to_string(),
        }
    }
}
