use axum::{response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct Acknowledgement {
    message: String,
}

/// Static health check; answers regardless of model state.
pub async fn home() -> impl IntoResponse {
    Json(Acknowledgement {
        message: "Helmet Detection API is running!".into(),
    })
}
