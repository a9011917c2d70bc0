use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "fallgate",
        description = "HTTP relay in front of the fall-detection analysis backend"
    ),
    paths(
        crate::api::handlers::health::backend_health,
        crate::api::handlers::frames::analyze_frame,
        crate::api::handlers::videos::analyze_video,
        crate::api::handlers::videos::annotate_video,
        crate::api::handlers::jobs::submit_annotate_job,
        crate::api::handlers::jobs::annotate_progress,
        crate::api::handlers::jobs::annotate_result,
    ),
    tags(
        (name = "relay", description = "Synchronous forwarding endpoints"),
        (name = "jobs", description = "Asynchronous annotation jobs")
    )
)]
pub struct ApiDoc;
