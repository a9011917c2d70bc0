use crate::AppState;
use crate::api::models::{UploadPayload, read_upload};
use crate::errors::Result;
use crate::sink::spawn_store;
use crate::upstream::UpstreamPayload;
use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

#[utoipa::path(
    post,
    path = "/analyze_video",
    tag = "relay",
    summary = "Analyze a video",
    description = "Forwards an uploaded video to the backend and returns its JSON summary. \
                   With `save_to_bucket`, the raw upload is additionally persisted to object \
                   storage on a best-effort basis.",
    request_body(content_type = "multipart/form-data", description = "`file` + optional `save_to_bucket`"),
    responses(
        (status = 200, description = "Analysis summary, verbatim"),
        (status = 400, description = "No file in the request"),
        (status = 502, description = "Backend unreachable")
    )
)]
pub async fn analyze_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<UpstreamPayload> {
    let upload = read_upload(&mut multipart).await?;
    persist_if_requested(&state, &upload);
    state.upstream.analyze_video(&upload).await
}

#[utoipa::path(
    post,
    path = "/annotate_video",
    tag = "relay",
    summary = "Annotate a video",
    description = "Forwards an uploaded video for annotation and streams the annotated MP4 \
                   straight back without buffering it.",
    request_body(content_type = "multipart/form-data", description = "`file` + optional `save_to_bucket`"),
    responses(
        (status = 200, description = "Annotated video stream (`video/mp4`)"),
        (status = 400, description = "No file in the request"),
        (status = 502, description = "Backend unreachable")
    )
)]
pub async fn annotate_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let upload = read_upload(&mut multipart).await?;
    persist_if_requested(&state, &upload);
    let response = state.upstream.annotate_video_stream(&upload).await?;
    Ok(stream_video_response(response))
}

/// Kick off the advisory bucket upload if the client asked for it. Never
/// awaited: the principal forward must not wait on storage, and a storage
/// failure must not affect it.
pub(crate) fn persist_if_requested(state: &AppState, upload: &UploadPayload) {
    if !upload.save_to_bucket {
        return;
    }
    spawn_store(
        state.sink.clone(),
        upload.filename.clone(),
        upload.bytes.clone(),
        upload.content_type.clone(),
    );
}

/// Pipe a backend video response through to the client. The body is streamed
/// chunk-by-chunk (a slow client slows the backend read, not the relay's
/// memory), the content type is pinned to `video/mp4`, and the backend's
/// `Content-Disposition` is kept when present.
pub(crate) fn stream_video_response(upstream: reqwest::Response) -> Response {
    let mut builder = Response::builder()
        .status(upstream.status())
        .header(header::CONTENT_TYPE, "video/mp4");
    if let Some(disposition) = upstream.headers().get(header::CONTENT_DISPOSITION) {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition.clone());
    }
    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}
