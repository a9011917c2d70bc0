use crate::AppState;
use crate::errors::{Error, Result};
use crate::upstream::UpstreamPayload;
use axum::extract::State;
use bytes::Bytes;

#[utoipa::path(
    post,
    path = "/analyze_frame",
    tag = "relay",
    summary = "Analyze a single frame",
    description = "Forwards a `{\"image_base64\": ...}` body to the backend's frame analyzer \
                   and returns its JSON verdict verbatim.",
    request_body(content_type = "application/json", description = "`{\"image_base64\": ...}`"),
    responses(
        (status = 200, description = "Analysis result, verbatim"),
        (status = 400, description = "Body is not valid JSON"),
        (status = 502, description = "Backend unreachable")
    )
)]
pub async fn analyze_frame(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<UpstreamPayload> {
    // Validate locally before spending a backend round-trip, but forward the
    // original bytes so the payload the backend sees is untouched.
    serde_json::from_slice::<serde_json::Value>(&body)
        .map_err(|err| Error::bad_request(format!("Invalid JSON body: {err}")))?;

    state.upstream.analyze_frame(body).await
}
