//! The full client → relay → backend job flow, driven by the jobwatch
//! polling client against a live relay instance.

use async_trait::async_trait;
use bytes::Bytes;
use fallgate::config::Config;
use fallgate::sink::BlobSink;
use fallgate::upstream::UpstreamClient;
use fallgate::{AppState, build_router};
use jobwatch::{HttpRelayClient, JobWatcher, VideoUpload, WatchState, WatcherConfig};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct NoopSink;

#[async_trait]
impl BlobSink for NoopSink {
    async fn store(
        &self,
        original_filename: &str,
        _bytes: Bytes,
        _content_type: &str,
    ) -> anyhow::Result<String> {
        Ok(original_filename.to_string())
    }
}

/// Bind the relay on an ephemeral port and serve it in the background.
async fn spawn_relay(backend_url: &str) -> String {
    let mut config = Config::default();
    config.backend.url = backend_url.parse().unwrap();

    let upstream = UpstreamClient::new(&config.backend).unwrap();
    let state = AppState::builder()
        .config(config)
        .upstream(upstream)
        .sink(Arc::new(NoopSink) as Arc<dyn BlobSink>)
        .build();
    let router = build_router(state).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn progress_body(status: &str, processed: u64, percent: Option<f64>) -> serde_json::Value {
    serde_json::json!({
        "status": status,
        "processed": processed,
        "total": 100,
        "percent": percent,
        "error": null
    })
}

#[tokio::test]
async fn test_watcher_drives_job_through_relay_to_completion() {
    let backend = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/annotate_video_async"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "e2e42"})),
        )
        .mount(&backend)
        .await;

    // Progress sequence: first poll pending, second processing, then done.
    // Earlier-mounted mocks win until their quota is exhausted.
    Mock::given(method("GET"))
        .and(path("/annotate_progress/e2e42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(progress_body("pending", 0, None)))
        .up_to_n_times(1)
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/annotate_progress/e2e42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(progress_body("processing", 50, Some(50.0))),
        )
        .up_to_n_times(1)
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/annotate_progress/e2e42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(progress_body("done", 100, Some(100.0))),
        )
        .mount(&backend)
        .await;

    Mock::given(method("GET"))
        .and(path("/annotate_result/e2e42"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-disposition",
                    "attachment; filename=\"e2e_annotated.mp4\"",
                )
                .set_body_bytes(vec![5u8; 2048]),
        )
        .expect(1)
        .mount(&backend)
        .await;

    let relay_url = spawn_relay(&backend.uri()).await;
    let client = HttpRelayClient::new(relay_url.parse().unwrap());
    let mut watcher = JobWatcher::with_config(
        client,
        WatcherConfig {
            poll_interval: Duration::from_millis(50),
        },
    );
    let mut states = watcher.subscribe();

    watcher.start(VideoUpload::new(vec![0u8; 64], "e2e.mp4"));

    let terminal = tokio::time::timeout(
        Duration::from_secs(10),
        states.wait_for(|state| state.is_terminal()),
    )
    .await
    .expect("job did not reach a terminal state in time")
    .unwrap()
    .clone();

    match terminal {
        WatchState::Complete { job_id, video } => {
            assert_eq!(job_id, "e2e42");
            assert_eq!(video.len(), 2048);
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[tokio::test]
async fn test_watcher_surfaces_backend_job_failure_through_relay() {
    let backend = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/annotate_video_async"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "doomed"})),
        )
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/annotate_progress/doomed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "error",
            "processed": 3,
            "total": null,
            "percent": null,
            "error": "Failed to read video"
        })))
        .mount(&backend)
        .await;
    // The result endpoint must never be hit for a failed job
    Mock::given(method("GET"))
        .and(path("/annotate_result/doomed"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let relay_url = spawn_relay(&backend.uri()).await;
    let client = HttpRelayClient::new(relay_url.parse().unwrap());
    let mut watcher = JobWatcher::with_config(
        client,
        WatcherConfig {
            poll_interval: Duration::from_millis(50),
        },
    );
    let mut states = watcher.subscribe();

    watcher.start(VideoUpload::new(vec![0u8; 64], "doomed.mp4"));

    let terminal = tokio::time::timeout(
        Duration::from_secs(10),
        states.wait_for(|state| state.is_terminal()),
    )
    .await
    .expect("job did not reach a terminal state in time")
    .unwrap()
    .clone();

    match terminal {
        WatchState::Failed { error } => assert_eq!(error, "Failed to read video"),
        other => panic!("expected Failed, got {other:?}"),
    }
}
