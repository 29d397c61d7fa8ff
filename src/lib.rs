pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;

use crate::services::pipeline::ExtractionPipeline;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::extract::create_extraction,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::extract::ExtractionForm,
            api::handlers::extract::ExtractionResponse,
            api::handlers::health::HealthResponse,
            services::link::DownloadLink,
            services::progress::PipelineEvent,
        )
    ),
    tags(
        (name = "extractions", description = "Reels extraction endpoints"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ExtractionPipeline>,
}

pub fn create_app(state: AppState) -> Router {
    // Added before the request-id layer so it runs inside it and the span sees the id.
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &Request<Body>, _span: &tracing::Span| {
            tracing::info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &Response<Body>, latency: std::time::Duration, _span: &tracing::Span| {
                tracing::info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::page::index))
        .route("/extract", post(api::handlers::extract::extract_form))
        .route("/extract/events", get(api::handlers::extract::extract_events))
        .route(
            "/api/extractions",
            post(api::handlers::extract::create_extraction),
        )
        .route("/health", get(api::handlers::health::health_check))
        .layer(trace_layer)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
