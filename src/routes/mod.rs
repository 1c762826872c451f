mod health;
mod metrics;
mod predict;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(health::home))
        .route("/predict/", post(predict::predict))
        .route("/metrics", get(metrics::metrics_handler))
}
