//! Periodic live-capture analysis with an in-flight guard.
//!
//! Unlike the job watcher, live capture has no lifecycle: it fires a
//! lightweight `analyze_frame` call on a fixed period for as long as it
//! runs. The only flow control is the in-flight guard: if the previous
//! call has not returned by the next tick, the tick is skipped entirely, so
//! a slow backend never sees more than one outstanding request.

use crate::client::RelayApi;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Configuration for the capture loop.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Fixed period between analyze attempts.
    pub tick_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(333),
        }
    }
}

/// Drives periodic frame analysis against the relay.
///
/// Frames are pulled from a caller-supplied source on each non-skipped tick;
/// analysis outcomes (success or failure, untouched) are delivered on the
/// results channel.
pub struct LiveCaptureDriver<C: RelayApi + 'static> {
    client: C,
    config: CaptureConfig,
    in_flight: Arc<AtomicBool>,
    skipped: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl<C: RelayApi + 'static> LiveCaptureDriver<C> {
    pub fn new(client: C) -> Self {
        Self::with_config(client, CaptureConfig::default())
    }

    pub fn with_config(client: C, config: CaptureConfig) -> Self {
        Self {
            client,
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
            skipped: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    /// Number of ticks skipped because a call was still in flight.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Start ticking. Any previous loop is stopped first.
    pub fn start<F>(&mut self, mut frames: F, results: mpsc::Sender<Result<serde_json::Value>>)
    where
        F: FnMut() -> serde_json::Value + Send + 'static,
    {
        self.stop();
        self.in_flight.store(false, Ordering::SeqCst);

        let client = self.client.clone();
        let tick_interval = self.config.tick_interval;
        let in_flight = self.in_flight.clone();
        let skipped = self.skipped.clone();

        self.task = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(tick_interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticks.tick().await;

            loop {
                ticks.tick().await;

                // At most one analyze call outstanding: winner of the swap
                // proceeds, everyone else skips the tick.
                if in_flight.swap(true, Ordering::SeqCst) {
                    skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!("previous analyze call still in flight, skipping tick");
                    continue;
                }

                let frame = frames();
                let client = client.clone();
                let in_flight = in_flight.clone();
                let results = results.clone();
                tokio::spawn(async move {
                    let outcome = client.analyze_frame(&frame).await;
                    in_flight.store(false, Ordering::SeqCst);
                    if results.send(outcome).await.is_err() {
                        tracing::debug!("capture result receiver dropped");
                    }
                });
            }
        }));
    }

    /// Stop ticking. Idempotent; safe to call when already stopped.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<C: RelayApi + 'static> Drop for LiveCaptureDriver<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockRelayClient;

    #[tokio::test(start_paused = true)]
    async fn test_slow_calls_never_overlap() {
        let mock = MockRelayClient::new();
        mock.set_default_analyze(serde_json::json!({"people": []}));
        // Each call takes three tick periods
        mock.set_analyze_delay(Duration::from_millis(1000));

        let (tx, mut rx) = mpsc::channel(64);
        let mut driver = LiveCaptureDriver::with_config(
            mock.clone(),
            CaptureConfig {
                tick_interval: Duration::from_millis(333),
            },
        );
        driver.start(|| serde_json::json!({"image_base64": "data:,"}), tx);

        // Run through well over five tick periods
        tokio::time::sleep(Duration::from_secs(5)).await;
        driver.stop();

        assert_eq!(mock.max_in_flight(), 1, "analyze calls overlapped");
        assert!(mock.analyze_calls() >= 2);
        assert!(
            driver.skipped_ticks() >= 2,
            "expected skipped ticks while a call was in flight"
        );

        // Results were delivered for completed calls
        let mut delivered = 0;
        while rx.try_recv().is_ok() {
            delivered += 1;
        }
        assert!(delivered >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_calls_tick_every_period() {
        let mock = MockRelayClient::new();
        mock.set_default_analyze(serde_json::json!({"ok": true}));

        let (tx, _rx) = mpsc::channel(64);
        let mut driver = LiveCaptureDriver::with_config(
            mock.clone(),
            CaptureConfig {
                tick_interval: Duration::from_millis(100),
            },
        );
        driver.start(|| serde_json::json!({}), tx);

        tokio::time::sleep(Duration::from_millis(1050)).await;
        driver.stop();

        assert!(mock.analyze_calls() >= 8);
        assert_eq!(mock.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_halts_calls() {
        let mock = MockRelayClient::new();
        mock.set_default_analyze(serde_json::json!({}));

        let (tx, _rx) = mpsc::channel(64);
        let mut driver = LiveCaptureDriver::new(mock.clone());
        driver.start(|| serde_json::json!({}), tx);

        tokio::time::sleep(Duration::from_secs(1)).await;
        driver.stop();
        driver.stop();

        let settled = mock.analyze_calls();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(mock.analyze_calls(), settled);
    }
}
