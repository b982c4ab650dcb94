use std::future::ready;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::metrics_middleware::track_metrics;
use crate::middleware::{decompress_gzip_body, DecompressionLayerState};
use crate::prometheus::setup_metrics_recorder;

#[derive(Clone)]
pub struct State {
    pub service_name: String,
}

pub fn router(
    service_name: String,
    decompression: DecompressionLayerState,
    metrics: bool,
) -> Router {
    let state = State { service_name };
    let body_limit = decompression.payload_size_limit;

    let router = Router::new()
        .route("/", get(handlers::index))
        .route("/_liveness", get(handlers::liveness))
        .route("/echo", post(handlers::echo))
        .route("/params", post(handlers::params))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn_with_state(
            decompression,
            decompress_gzip_body,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Don't install metrics unless asked to
    // Installing a global recorder when used as a library (during tests etc)
    // does not work well.
    if metrics {
        let recorder_handle = setup_metrics_recorder();

        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}
