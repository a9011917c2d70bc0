//! # fallgate: relay for the fall-detection analysis backend
//!
//! `fallgate` sits between browser clients and a slow ML analysis backend.
//! It accepts frame and video uploads, forwards each request to the backend
//! with per-operation timeouts, and hands results back: buffered JSON for
//! the lightweight endpoints, a backpressure-preserving byte stream for
//! annotated videos. For long-running work it relays the backend's
//! asynchronous job surface: submit a video, poll the returned job
//! identifier, fetch the finished stream.
//!
//! The relay is deliberately transparent. Backend responses, including
//! structured error responses, are replayed to the client byte-for-byte,
//! so the backend's error taxonomy survives the hop. Only two failures are
//! generated locally: a 400 when the client's own request is invalid
//! (checked before any network call), and a 502 with a fixed
//! `{"error": "Backend unavailable"}` envelope when the backend cannot be
//! reached at all. Nothing is retried; every failure surfaces immediately.
//!
//! Uploads may opt into advisory persistence (`save_to_bucket`): the raw
//! bytes are copied to an S3-compatible bucket in a detached task. That
//! sink is lazily initialized on first use and its failures are logged and
//! swallowed; persistence never delays or breaks the principal forward.
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); the outbound
//! side is reqwest. There is no database and no per-request state beyond
//! the in-flight request itself.

pub mod api;
pub mod config;
pub mod errors;
mod openapi;
pub mod sink;
pub mod telemetry;
pub mod upstream;

pub use config::Config;

use crate::sink::{BlobSink, S3BlobSink};
use crate::upstream::UpstreamClient;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use bon::Builder;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub upstream: UpstreamClient,
    pub sink: Arc<dyn BlobSink>,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    if config.cors.allowed_origins.iter().any(|origin| origin == "*") {
        return Ok(CorsLayer::permissive());
    }

    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        origins.push(origin.parse::<HeaderValue>()?);
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Build the application router with all endpoints and middleware.
///
/// Upload routes get a raised body limit (videos); everything else keeps
/// axum's default. The route table mirrors the backend's surface so clients
/// can switch between direct and relayed access without path changes.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = create_cors_layer(&state.config)?;
    let upload_limit = state.config.max_upload_bytes as usize;

    let upload_routes = Router::new()
        .route("/analyze_video", post(api::handlers::videos::analyze_video))
        .route("/annotate_video", post(api::handlers::videos::annotate_video))
        .route(
            "/annotate_video_async",
            post(api::handlers::jobs::submit_annotate_job),
        )
        .layer(DefaultBodyLimit::max(upload_limit));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/health", get(api::handlers::health::backend_health))
        .route("/analyze_frame", post(api::handlers::frames::analyze_frame))
        .merge(upload_routes)
        .route(
            "/annotate_progress/{job_id}",
            get(api::handlers::jobs::annotate_progress),
        )
        .route(
            "/annotate_result/{job_id}",
            get(api::handlers::jobs::annotate_result),
        )
        .with_state(state)
        .merge(Scalar::with_url("/docs", openapi::ApiDoc::openapi()))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        );

    Ok(router)
}

/// The relay server: a bound listener plus its router.
pub struct Application {
    router: Router,
    listener: TcpListener,
}

impl Application {
    /// Construct the application from configuration: build the upstream
    /// client and storage sink, assemble the router, and bind the listener.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let upstream = UpstreamClient::new(&config.backend)?;
        let sink: Arc<dyn BlobSink> = Arc::new(S3BlobSink::new(config.storage.clone()));
        let state = AppState::builder()
            .config(config)
            .upstream(upstream)
            .sink(sink)
            .build();
        Self::with_state(state).await
    }

    /// Construct from pre-built state (used by tests to inject a fake sink
    /// or a fake backend URL).
    pub async fn with_state(state: AppState) -> anyhow::Result<Self> {
        let addr = format!("{}:{}", state.config.host, state.config.port);
        let backend = state.config.backend.url.clone();
        let router = build_router(state)?;
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            backend = %backend,
            "fallgate listening"
        );
        Ok(Self { router, listener })
    }

    /// Serve until `shutdown` resolves, then drain gracefully.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
