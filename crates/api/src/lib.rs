pub mod error;
pub mod routes;
pub mod scheduler;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    // Batch API: submit and poll
    let v2_routes = Router::new()
        .route("/batch-transcribe", post(routes::jobs::submit_batch))
        .route("/jobs/{job_id}", get(routes::jobs::get_status));

    let admin_routes = Router::new().route("/model", post(routes::admin::load_model));

    let system_routes = Router::new().route("/stats", get(routes::health::stats));

    Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health))
        .route("/transcribe", post(routes::transcribe::transcribe))
        .route("/stream", post(routes::transcribe::stream))
        .nest("/v2", v2_routes)
        .nest("/admin", admin_routes)
        .nest("/system", system_routes)
        .layer(DefaultBodyLimit::max(state.settings.uploads.max_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
