use crate::AppState;
use crate::api::handlers::videos::{persist_if_requested, stream_video_response};
use crate::api::models::read_upload;
use crate::errors::Result;
use crate::upstream::UpstreamPayload;
use axum::extract::{Multipart, Path, State};
use axum::response::Response;

#[utoipa::path(
    post,
    path = "/annotate_video_async",
    tag = "jobs",
    summary = "Submit an annotation job",
    description = "Starts an asynchronous annotation job on the backend and returns its \
                   `{\"job_id\"}` receipt verbatim. The identifier is the only handle for \
                   later progress and result queries.",
    request_body(content_type = "multipart/form-data", description = "`file` + optional `save_to_bucket`"),
    responses(
        (status = 200, description = "Job receipt, verbatim"),
        (status = 400, description = "No file in the request"),
        (status = 502, description = "Backend unreachable")
    )
)]
pub async fn submit_annotate_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<UpstreamPayload> {
    let upload = read_upload(&mut multipart).await?;
    persist_if_requested(&state, &upload);
    state.upstream.submit_annotate(&upload).await
}

#[utoipa::path(
    get,
    path = "/annotate_progress/{job_id}",
    tag = "jobs",
    summary = "Job progress",
    description = "Forwards the backend's progress snapshot for a job. Every call is a live \
                   round-trip; nothing is cached and a job is never re-submitted by polling.",
    params(("job_id" = String, Path, description = "Job identifier from submission")),
    responses(
        (status = 200, description = "Progress JSON, verbatim"),
        (status = 404, description = "Unknown job (forwarded from the backend)"),
        (status = 502, description = "Backend unreachable")
    )
)]
pub async fn annotate_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<UpstreamPayload> {
    state.upstream.annotate_progress(&job_id).await
}

#[utoipa::path(
    get,
    path = "/annotate_result/{job_id}",
    tag = "jobs",
    summary = "Job result",
    description = "Streams the annotated video for a finished job. Calling before the job is \
                   done is forwarded as-is; the backend decides how to answer.",
    params(("job_id" = String, Path, description = "Job identifier from submission")),
    responses(
        (status = 200, description = "Annotated video stream (`video/mp4`)"),
        (status = 404, description = "Unknown job (forwarded from the backend)"),
        (status = 502, description = "Backend unreachable")
    )
)]
pub async fn annotate_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response> {
    let response = state.upstream.annotate_result_stream(&job_id).await?;
    Ok(stream_video_response(response))
}
