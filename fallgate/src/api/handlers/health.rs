use crate::AppState;
use crate::errors::Result;
use crate::upstream::UpstreamPayload;
use axum::extract::State;

#[utoipa::path(
    get,
    path = "/health",
    tag = "relay",
    summary = "Backend health",
    description = "Forwards the backend's health report. If the backend cannot be reached, \
                   answers 502 with a `{\"error\": \"Backend unavailable\"}` envelope instead \
                   of failing the request.",
    responses(
        (status = 200, description = "Backend health JSON, verbatim"),
        (status = 502, description = "Backend unreachable")
    )
)]
pub async fn backend_health(State(state): State<AppState>) -> Result<UpstreamPayload> {
    state.upstream.health().await
}
