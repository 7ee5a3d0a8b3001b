//! Generic "create job, poll until terminal, fetch result" client.

use std::time::Duration;

use async_trait::async_trait;
use bcast_models::{AssetRef, JobId, JobState};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{ProviderError, ProviderResult};
use crate::retry::{retry_async_when, RetryConfig};

/// Job accepted by a provider.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: JobId,
    pub state: JobState,
}

/// One status observation.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    /// Provider-reported error or progress note.
    pub detail: Option<String>,
    /// Result reference when the status payload carries it inline.
    pub output: Option<AssetRef>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            detail: None,
            output: None,
        }
    }
}

/// A remote asynchronous generation API.
#[async_trait]
pub trait JobProvider: Send + Sync {
    type Request: Send + Sync;

    /// Short name used in logs, metrics and errors.
    fn name(&self) -> &str;

    /// Submit a job. Non-2xx must map to [`ProviderError::CreationRejected`].
    async fn create_job(&self, request: &Self::Request) -> ProviderResult<JobHandle>;

    async fn poll_job(&self, id: &JobId) -> ProviderResult<JobStatus>;

    /// Retrieve the asset of a completed job.
    async fn fetch_result(&self, id: &JobId, status: &JobStatus) -> ProviderResult<AssetRef>;
}

/// Anything that turns a request into an asset: a [`JobClient`] or a
/// synchronous provider.
#[async_trait]
pub trait AssetGenerator<R: Sync>: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn generate(&self, request: &R, cancel: &CancelSignal) -> ProviderResult<AssetRef>;
}

/// Polling bounds for a job client.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    /// Total wait from the first poll until `JobTimeout`.
    pub timeout: Duration,
    /// Retries of a single failed status request.
    pub status_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(4),
            timeout: Duration::from_secs(600),
            status_retries: 3,
        }
    }
}

/// Stateless driver over a [`JobProvider`].
pub struct JobClient<P> {
    provider: P,
    poll: PollConfig,
}

impl<P: JobProvider> JobClient<P> {
    pub fn new(provider: P, poll: PollConfig) -> Self {
        Self { provider, poll }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn create_job(&self, request: &P::Request) -> ProviderResult<JobHandle> {
        let handle = self.provider.create_job(request).await?;
        info!(
            provider = self.provider.name(),
            job_id = %handle.id,
            state = %handle.state,
            "Job created"
        );
        Ok(handle)
    }

    /// Poll at a fixed interval until the job is terminal.
    ///
    /// Fails with `Timeout` once the configured bound has elapsed (status
    /// retries included), `JobFailed` on a terminal failure and `Cancelled`
    /// as soon as `cancel` fires.
    pub async fn poll_until_terminal(
        &self,
        id: &JobId,
        cancel: &CancelSignal,
    ) -> ProviderResult<JobStatus> {
        let name = self.provider.name();
        let started = Instant::now();
        let deadline = started + self.poll.timeout;
        let status_retry = RetryConfig::new(format!("{name} status"))
            .with_max_retries(self.poll.status_retries)
            .fixed(self.poll.interval);

        loop {
            let now = Instant::now();
            if now >= deadline {
                warn!(provider = name, job_id = %id, "Job polling timed out");
                return Err(ProviderError::Timeout {
                    provider: name.to_string(),
                    job_id: id.to_string(),
                    waited_secs: now.duration_since(started).as_secs(),
                });
            }

            let wait = self.poll.interval.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => {
                    info!(provider = name, job_id = %id, "Job polling cancelled");
                    return Err(ProviderError::Cancelled);
                }
            }

            let polled = retry_async_when(&status_retry, ProviderError::is_retryable, || {
                self.provider.poll_job(id)
            });
            let status = tokio::select! {
                polled = tokio::time::timeout_at(deadline, polled) => match polled {
                    Ok(result) => result.into_result()?,
                    Err(_) => {
                        warn!(provider = name, job_id = %id, "Job status retries ran past the deadline");
                        return Err(ProviderError::Timeout {
                            provider: name.to_string(),
                            job_id: id.to_string(),
                            waited_secs: started.elapsed().as_secs(),
                        });
                    }
                },
                _ = cancel.cancelled() => {
                    info!(provider = name, job_id = %id, "Job polling cancelled");
                    return Err(ProviderError::Cancelled);
                }
            };

            debug!(provider = name, job_id = %id, state = %status.state, "Job status");
            match status.state {
                JobState::Completed => return Ok(status),
                JobState::Failed => {
                    let detail = status
                        .detail
                        .unwrap_or_else(|| "provider reported failure".to_string());
                    return Err(ProviderError::job_failed(name, id.as_str(), detail));
                }
                JobState::Queued | JobState::InProgress => {}
            }
        }
    }

    pub async fn fetch_result(&self, id: &JobId, status: &JobStatus) -> ProviderResult<AssetRef> {
        self.provider.fetch_result(id, status).await
    }

    /// Create, poll, fetch. The job id is dropped once the asset is in hand.
    pub async fn run(&self, request: &P::Request, cancel: &CancelSignal) -> ProviderResult<AssetRef> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let started = std::time::Instant::now();
        let name = self.provider.name().to_string();

        let result = async {
            let handle = self.create_job(request).await?;
            let status = self.poll_until_terminal(&handle.id, cancel).await?;
            self.fetch_result(&handle.id, &status).await
        }
        .await;

        let outcome = match &result {
            Ok(_) => "completed",
            Err(ProviderError::CreationRejected { .. }) => "rejected",
            Err(ProviderError::Timeout { .. }) => "timeout",
            Err(ProviderError::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        metrics::histogram!(
            "bcast_provider_job_duration_seconds",
            "provider" => name,
            "outcome" => outcome
        )
        .record(started.elapsed().as_secs_f64());

        result
    }
}

#[async_trait]
impl<P: JobProvider> AssetGenerator<P::Request> for JobClient<P> {
    fn provider_name(&self) -> &str {
        self.provider.name()
    }

    async fn generate(
        &self,
        request: &P::Request,
        cancel: &CancelSignal,
    ) -> ProviderResult<AssetRef> {
        self.run(request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted provider: reports each state in turn, then repeats the last.
    struct Scripted {
        states: Vec<JobState>,
        polls: AtomicU32,
        reject: bool,
        /// Status requests answered with a 503 before the script starts.
        transient: u32,
    }

    impl Scripted {
        fn new(states: Vec<JobState>) -> Self {
            Self {
                states,
                polls: AtomicU32::new(0),
                reject: false,
                transient: 0,
            }
        }
    }

    #[async_trait]
    impl JobProvider for Scripted {
        type Request = String;

        fn name(&self) -> &str {
            "scripted"
        }

        async fn create_job(&self, _request: &String) -> ProviderResult<JobHandle> {
            if self.reject {
                return Err(ProviderError::creation_rejected("scripted", 500, "boom"));
            }
            Ok(JobHandle {
                id: JobId::from("job-1"),
                state: JobState::Queued,
            })
        }

        async fn poll_job(&self, _id: &JobId) -> ProviderResult<JobStatus> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.transient {
                return Err(ProviderError::request_failed("scripted", 503, "busy"));
            }
            let n = (n - self.transient) as usize;
            let state = self.states[n.min(self.states.len() - 1)];
            let mut status = JobStatus::new(state);
            if state == JobState::Failed {
                status.detail = Some("content policy".into());
            }
            Ok(status)
        }

        async fn fetch_result(&self, id: &JobId, _status: &JobStatus) -> ProviderResult<AssetRef> {
            Ok(AssetRef::url(format!("https://cdn.example/{id}.mp4")))
        }
    }

    fn poll(interval_secs: u64, timeout_secs: u64) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(timeout_secs),
            status_retries: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes() {
        let client = JobClient::new(
            Scripted::new(vec![JobState::Queued, JobState::InProgress, JobState::Completed]),
            poll(4, 600),
        );
        let asset = client.run(&"prompt".to_string(), &CancelSignal::never()).await.unwrap();
        assert_eq!(asset.as_url(), Some("https://cdn.example/job-1.mp4"));
        assert_eq!(client.provider().polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_terminal_times_out_within_bound() {
        let client = JobClient::new(Scripted::new(vec![JobState::InProgress]), poll(4, 30));
        let started = Instant::now();

        let err = client
            .poll_until_terminal(&JobId::from("job-1"), &CancelSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Timeout { waited_secs: 30, .. }));
        assert!(started.elapsed() <= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_retries_stop_at_the_deadline() {
        let mut provider = Scripted::new(vec![JobState::InProgress]);
        provider.transient = 10;
        let config = PollConfig {
            status_retries: 3,
            ..poll(4, 8)
        };
        let client = JobClient::new(provider, config);
        let started = Instant::now();

        let err = client
            .poll_until_terminal(&JobId::from("job-1"), &CancelSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Timeout { waited_secs: 8, .. }));
        assert!(started.elapsed() <= Duration::from_secs(8));
        assert!(client.provider().polls.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_status_retries() {
        let mut provider = Scripted::new(vec![JobState::InProgress]);
        provider.transient = 10;
        let config = PollConfig {
            status_retries: 3,
            ..poll(4, 600)
        };
        let client = JobClient::new(provider, config);
        let (tx, cancel) = CancelSignal::channel();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(6)).await;
            tx.send(true).unwrap();
        });

        let started = Instant::now();
        let err = client
            .poll_until_terminal(&JobId::from("job-1"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(8));
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_carries_detail() {
        let client = JobClient::new(
            Scripted::new(vec![JobState::InProgress, JobState::Failed]),
            poll(4, 600),
        );
        let err = client.run(&"p".to_string(), &CancelSignal::never()).await.unwrap_err();
        match err {
            ProviderError::JobFailed { detail, job_id, .. } => {
                assert_eq!(detail, "content policy");
                assert_eq!(job_id, "job-1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_rejection_skips_polling() {
        let mut provider = Scripted::new(vec![JobState::Completed]);
        provider.reject = true;
        let client = JobClient::new(provider, poll(4, 600));

        let err = client.run(&"p".to_string(), &CancelSignal::never()).await.unwrap_err();
        assert!(matches!(err, ProviderError::CreationRejected { status: 500, .. }));
        assert_eq!(client.provider().polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let client = JobClient::new(Scripted::new(vec![JobState::InProgress]), poll(4, 600));
        let (tx, cancel) = CancelSignal::channel();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            tx.send(true).unwrap();
        });

        let err = client
            .poll_until_terminal(&JobId::from("job-1"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
        assert!(client.provider().polls.load(Ordering::SeqCst) <= 3);
        canceller.await.unwrap();
    }
}
