use crate::api::handlers::{alerts, analysis, devices, health, heartbeat, AppState};
use axum::{
    extract::Request,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Level;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/devices", get(devices::list_devices))
        .route(
            "/api/v1/alerts",
            get(alerts::list_alerts).post(alerts::create_alert),
        )
        .route(
            "/api/v1/alerts/{id}/acknowledge",
            put(alerts::acknowledge_alert),
        )
        .route("/api/v1/identify", post(analysis::identify))
        .route("/api/v1/anomaly", get(analysis::detect_anomaly))
        .route("/api/v1/predict/energy", post(analysis::predict_energy))
        .route("/api/v1/heartbeat", get(heartbeat::heartbeat_status))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(
                    |_response: &axum::response::Response,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::DEBUG, latency = ?latency, "request completed");
                    },
                ),
        )
}
