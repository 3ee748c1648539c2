//! Polling of deferred server jobs.
//!
//! Some mutations answer with a job id instead of completing. The poller
//! sleeps a short interval, queries the job, and repeats until the job is
//! `finished` or `failed`. Any query problem (gate denied, transport failure,
//! non-2xx) or cancellation ends the poll at once with failure; there is no
//! retry and no iteration cap.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::ApiError;
use super::models::JobState;

/// Default delay between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Anything that can report the state of a server job.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Queries the current state of `job`.
    async fn job_state(&self, job: u64, cancel: &CancellationToken) -> Result<JobState, ApiError>;
}

#[derive(Debug, Clone, Copy)]
pub struct JobPoller {
    interval: Duration,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl JobPoller {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for `job` to reach a terminal state. `true` only for `finished`.
    pub async fn wait_for_job(
        &self,
        source: &dyn JobStatusSource,
        job: u64,
        cancel: &CancellationToken,
    ) -> bool {
        self.wait(source, job, cancel).await.is_ok()
    }

    /// Waits for `job` and reports why it did not finish.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::JobFailed`] when the server reports `failed`, and
    /// [`ApiError::JobIndeterminate`] when the poll was cancelled or a status
    /// query failed.
    #[instrument(level = "debug", skip(self, source, cancel))]
    pub async fn wait(
        &self,
        source: &dyn JobStatusSource,
        job: u64,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let mut polls = 0u32;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(polls, "job poll cancelled");
                    return Err(ApiError::JobIndeterminate { job });
                }
                () = tokio::time::sleep(self.interval) => {}
            }

            polls += 1;
            match source.job_state(job, cancel).await {
                Ok(JobState::Finished) => {
                    debug!(polls, "job finished");
                    return Ok(());
                }
                Ok(JobState::Failed) => {
                    warn!(job, polls, "job failed");
                    return Err(ApiError::JobFailed { job });
                }
                Ok(JobState::Pending) => {}
                Err(e) => {
                    debug!(polls, error = %e, "job status query failed");
                    return Err(ApiError::JobIndeterminate { job });
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Replays a fixed sequence of status replies.
    struct Scripted {
        replies: Mutex<VecDeque<Result<JobState, ApiError>>>,
        queries: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Result<JobState, ApiError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl JobStatusSource for Scripted {
        async fn job_state(
            &self,
            _job: u64,
            _cancel: &CancellationToken,
        ) -> Result<JobState, ApiError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(JobState::Pending))
        }
    }

    fn poller() -> JobPoller {
        JobPoller::new(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_pending_then_finished_is_true() {
        let source = Scripted::new(vec![
            Ok(JobState::Pending),
            Ok(JobState::Pending),
            Ok(JobState::Finished),
        ]);
        let ok = poller()
            .wait_for_job(&source, 42, &CancellationToken::new())
            .await;
        assert!(ok);
        assert_eq!(source.queries.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pending_then_failed_is_false() {
        let source = Scripted::new(vec![Ok(JobState::Pending), Ok(JobState::Failed)]);
        let result = poller().wait(&source, 7, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ApiError::JobFailed { job: 7 })));
        assert_eq!(source.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_poll_issues_no_queries() {
        let source = Scripted::new(vec![Ok(JobState::Finished)]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = poller().wait(&source, 1, &cancel).await;

        assert!(matches!(result, Err(ApiError::JobIndeterminate { job: 1 })));
        assert_eq!(source.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_query_stops_polling() {
        let source = Scripted::new(vec![
            Ok(JobState::Pending),
            Err(ApiError::server("http://h/api/minion/3", 500)),
            Ok(JobState::Finished),
        ]);
        let ok = poller()
            .wait_for_job(&source, 3, &CancellationToken::new())
            .await;
        assert!(!ok);
        assert_eq!(source.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_during_wait_stops_polling() {
        let source = Scripted::new(Vec::new());
        let cancel = CancellationToken::new();
        let poller = JobPoller::new(Duration::from_millis(20));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(70)).await;
            canceller.cancel();
        });

        assert!(!poller.wait_for_job(&source, 9, &cancel).await);
        assert!(source.queries.load(Ordering::SeqCst) <= 4);
    }
}
