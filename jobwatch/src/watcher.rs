//! The job polling state machine.
//!
//! A [`JobWatcher`] owns at most one background task at a time. The task
//! submits the upload, polls the relay on a fixed interval until the job
//! reaches a terminal status, then downloads the result exactly once. Any
//! failure along the way (submission error, poll transport error, or an
//! upstream `status: error`) moves the watcher to `Failed` and stops the
//! timer immediately; nothing is retried.

use crate::client::RelayApi;
use crate::types::{JobProgress, JobStatus, VideoUpload};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Configuration for the polling loop.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Fixed period between progress polls.
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(800),
        }
    }
}

/// Observable state of the watcher.
///
/// `Complete` and `Failed` are terminal: once either is published, the
/// background task has returned and no further network calls are made.
#[derive(Debug, Clone)]
pub enum WatchState {
    Idle,
    Submitting,
    Polling {
        job_id: String,
        progress: Option<JobProgress>,
    },
    Downloading {
        job_id: String,
    },
    Complete {
        job_id: String,
        video: Bytes,
    },
    Failed {
        error: String,
    },
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WatchState::Complete { .. } | WatchState::Failed { .. })
    }
}

/// Drives one annotation job at a time from submission to completion.
pub struct JobWatcher<C: RelayApi + 'static> {
    client: C,
    config: WatcherConfig,
    state: watch::Sender<WatchState>,
    task: Option<JoinHandle<()>>,
}

impl<C: RelayApi + 'static> JobWatcher<C> {
    pub fn new(client: C) -> Self {
        Self::with_config(client, WatcherConfig::default())
    }

    pub fn with_config(client: C, config: WatcherConfig) -> Self {
        let (state, _) = watch::channel(WatchState::Idle);
        Self {
            client,
            config,
            state,
            task: None,
        }
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> WatchState {
        self.state.borrow().clone()
    }

    /// Submit `upload` and start polling it.
    ///
    /// Any previous job's task (and with it, its polling timer) is cancelled
    /// first, so at most one timer is ever active per watcher.
    pub fn start(&mut self, upload: VideoUpload) {
        self.cancel();

        let client = self.client.clone();
        let config = self.config.clone();
        let state = self.state.clone();
        self.task = Some(tokio::spawn(run_job(client, config, upload, state)));
    }

    /// Abort the in-flight job, if any. Safe to call at any time, including
    /// after the job has already finished.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<C: RelayApi + 'static> Drop for JobWatcher<C> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[tracing::instrument(skip_all, fields(filename = %upload.filename))]
async fn run_job<C: RelayApi>(
    client: C,
    config: WatcherConfig,
    upload: VideoUpload,
    state: watch::Sender<WatchState>,
) {
    state.send_replace(WatchState::Submitting);

    let job_id = match client.submit_annotate(&upload).await {
        Ok(job_id) => job_id,
        Err(err) => {
            tracing::warn!(error = %err, "job submission failed");
            state.send_replace(WatchState::Failed {
                error: err.to_string(),
            });
            return;
        }
    };

    tracing::info!(job_id = %job_id, "job submitted, polling for completion");
    state.send_replace(WatchState::Polling {
        job_id: job_id.clone(),
        progress: None,
    });

    let mut ticks = tokio::time::interval(config.poll_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The interval's first tick completes immediately; consume it so polls
    // start one full period after submission.
    ticks.tick().await;

    loop {
        ticks.tick().await;

        let progress = match client.annotate_progress(&job_id).await {
            Ok(progress) => progress,
            Err(err) => {
                tracing::warn!(job_id = %job_id, error = %err, "progress poll failed, stopping");
                state.send_replace(WatchState::Failed {
                    error: err.to_string(),
                });
                return;
            }
        };

        match progress.status {
            JobStatus::Done => break,
            JobStatus::Error => {
                let error = progress
                    .error
                    .unwrap_or_else(|| "annotation job failed".to_string());
                tracing::warn!(job_id = %job_id, error = %error, "job reported failure");
                state.send_replace(WatchState::Failed { error });
                return;
            }
            JobStatus::Pending | JobStatus::Processing => {
                tracing::debug!(
                    job_id = %job_id,
                    processed = progress.processed,
                    percent = ?progress.percent,
                    "job in progress"
                );
                state.send_replace(WatchState::Polling {
                    job_id: job_id.clone(),
                    progress: Some(progress),
                });
            }
        }
    }

    state.send_replace(WatchState::Downloading {
        job_id: job_id.clone(),
    });

    match client.annotate_result(&job_id).await {
        Ok(video) => {
            tracing::info!(job_id = %job_id, bytes = video.len(), "annotated video downloaded");
            state.send_replace(WatchState::Complete { job_id, video });
        }
        Err(err) => {
            tracing::warn!(job_id = %job_id, error = %err, "result download failed");
            state.send_replace(WatchState::Failed {
                error: err.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockRelayClient;
    use crate::error::WatchError;

    fn progress(status: JobStatus, percent: Option<f64>) -> JobProgress {
        JobProgress {
            status,
            processed: 0,
            total: None,
            percent,
            error: None,
        }
    }

    fn upload() -> VideoUpload {
        VideoUpload::new(vec![0u8; 8], "clip.mp4")
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_downloads_exactly_once() {
        let mock = MockRelayClient::new();
        mock.push_submit(Ok("J".to_string()));
        mock.push_progress(Ok(progress(JobStatus::Pending, None)));
        mock.push_progress(Ok(progress(JobStatus::Processing, Some(40.0))));
        mock.push_progress(Ok(progress(JobStatus::Done, Some(100.0))));
        mock.push_result(Ok(Bytes::from_static(b"annotated")));

        let mut watcher = JobWatcher::new(mock.clone());
        let mut states = watcher.subscribe();
        watcher.start(upload());

        let terminal = states.wait_for(|s| s.is_terminal()).await.unwrap().clone();
        match terminal {
            WatchState::Complete { job_id, video } => {
                assert_eq!(job_id, "J");
                assert_eq!(video.as_ref(), b"annotated");
            }
            other => panic!("expected Complete, got {other:?}"),
        }

        assert_eq!(mock.progress_calls(), 3);
        assert_eq!(mock.result_calls(), 1);

        // The polling timer must be inactive after completion: no further
        // calls accrue no matter how much time passes.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.progress_calls(), 3);
        assert_eq!(mock.result_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_stops_polling_without_download() {
        let mock = MockRelayClient::new();
        mock.push_submit(Ok("J".to_string()));
        mock.push_progress(Ok(progress(JobStatus::Pending, None)));
        mock.push_progress(Ok(JobProgress {
            status: JobStatus::Error,
            processed: 3,
            total: None,
            percent: None,
            error: Some("boom".to_string()),
        }));

        let mut watcher = JobWatcher::new(mock.clone());
        let mut states = watcher.subscribe();
        watcher.start(upload());

        let terminal = states.wait_for(|s| s.is_terminal()).await.unwrap().clone();
        match terminal {
            WatchState::Failed { error } => assert_eq!(error, "boom"),
            other => panic!("expected Failed, got {other:?}"),
        }

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.progress_calls(), 2);
        assert_eq!(mock.result_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_fails_immediately() {
        let mock = MockRelayClient::new();
        mock.push_submit(Ok("J".to_string()));
        mock.push_progress(Err(WatchError::Internal("connection reset".to_string())));

        let mut watcher = JobWatcher::new(mock.clone());
        let mut states = watcher.subscribe();
        watcher.start(upload());

        let terminal = states.wait_for(|s| s.is_terminal()).await.unwrap().clone();
        assert!(matches!(terminal, WatchState::Failed { .. }));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.progress_calls(), 1);
        assert_eq!(mock.result_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_failure_never_starts_timer() {
        let mock = MockRelayClient::new();
        mock.push_submit(Err(WatchError::Internal("relay down".to_string())));

        let mut watcher = JobWatcher::new(mock.clone());
        let mut states = watcher.subscribe();
        watcher.start(upload());

        let terminal = states.wait_for(|s| s.is_terminal()).await.unwrap().clone();
        assert!(matches!(terminal, WatchState::Failed { .. }));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.progress_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_new_job_cancels_previous_timer() {
        let mock = MockRelayClient::new();
        mock.push_submit(Ok("A".to_string()));
        // Job A never finishes
        mock.set_default_progress(progress(JobStatus::Pending, None));

        let mut watcher = JobWatcher::new(mock.clone());
        watcher.start(upload());

        // Let A poll a few times
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(mock.progress_calls() >= 2);

        // Job B fails at submission, so after the switch nothing polls
        mock.push_submit(Err(WatchError::Internal("nope".to_string())));
        let mut states = watcher.subscribe();
        watcher.start(upload());
        states.wait_for(|s| s.is_terminal()).await.unwrap();

        let settled = mock.progress_calls();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.progress_calls(), settled, "job A kept polling after being replaced");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let mock = MockRelayClient::new();
        mock.push_submit(Ok("A".to_string()));
        mock.set_default_progress(progress(JobStatus::Pending, None));

        let mut watcher = JobWatcher::new(mock.clone());
        watcher.start(upload());
        tokio::time::sleep(Duration::from_millis(1000)).await;

        watcher.cancel();
        watcher.cancel();

        let settled = mock.progress_calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(mock.progress_calls(), settled);
    }
}
