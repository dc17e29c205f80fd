use crate::api::{handlers, AppState};
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Flows
        .route("/v1/flows", get(handlers::list_flows))
        .route("/v1/flows/:flow/events", post(handlers::submit_event))
        .route("/v1/flows/:flow/process", post(handlers::process_event))
        // Models
        .route("/v1/models/:id", get(handlers::get_model))
        .route("/v1/models/:id/cache", delete(handlers::evict_model))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
