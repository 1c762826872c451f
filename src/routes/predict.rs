use crate::{
    detection::{Detection, PredictionResponse},
    detector::DetectorError,
    server::SharedState,
    store::StoreError,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{Multipart, MultipartError},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("multipart upload is missing a `file` field")]
    MissingFile,
    #[error("failed to read multipart upload")]
    Multipart(#[source] MultipartError),
    #[error("failed to store uploaded file")]
    UploadIo(#[source] StoreError),
    #[error("uploaded bytes are not a decodable image")]
    Decode(#[source] image::ImageError),
    #[error("model inference failed")]
    Inference(#[source] DetectorError),
    #[error("failed to write annotated image")]
    Encode(#[source] image::ImageError),
    #[error("inference worker terminated unexpectedly")]
    Worker(#[source] tokio::task::JoinError),
}

impl PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MissingFile | PredictError::Multipart(_) | PredictError::Decode(_) => {
                StatusCode::BAD_REQUEST
            }
            PredictError::UploadIo(_)
            | PredictError::Inference(_)
            | PredictError::Encode(_)
            | PredictError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        // Full detail goes to the log; the client sees the sanitized message.
        tracing::error!(error = ?self, "predict request failed");
        (
            self.status_code(),
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Accepts a multipart image upload, runs detection and responds with the
/// detections plus the path of the annotated copy. Decode, inference and
/// drawing are CPU-bound and run on a blocking worker thread.
#[instrument(skip(state, multipart))]
pub async fn predict(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResponse>, PredictError> {
    state.metrics.record_request("/predict/");

    let (filename, bytes) = read_file_field(&mut multipart).await?;

    let request_id = Uuid::new_v4().to_string();
    let upload_path = state.store.upload_path(&request_id, &filename);
    let annotated_path = state.store.annotated_path(&request_id, &filename);

    state
        .store
        .save_upload(&upload_path, &bytes)
        .await
        .map_err(PredictError::UploadIo)?;

    let detector = state.detector.clone();
    let annotator = state.annotator.clone();
    let output_path = annotated_path.clone();
    let started = Instant::now();

    let detections = tokio::task::spawn_blocking(move || {
        let image = image::load_from_memory(&bytes).map_err(PredictError::Decode)?;
        let raw_detections = detector.detect(&image).map_err(PredictError::Inference)?;
        let detections: Vec<Detection> = raw_detections
            .iter()
            .map(|raw| Detection::from_raw(raw, detector.labels()))
            .collect();

        let mut canvas = image.to_rgb8();
        annotator.annotate(&mut canvas, &detections);
        canvas.save(&output_path).map_err(PredictError::Encode)?;

        Ok::<_, PredictError>(detections)
    })
    .await
    .map_err(PredictError::Worker)??;

    state
        .metrics
        .record_inference_duration(started.elapsed().as_millis() as u64, "/predict/");

    // The transient upload is only dropped once the whole pipeline succeeded.
    state
        .store
        .remove_upload(&upload_path)
        .await
        .map_err(PredictError::UploadIo)?;

    tracing::debug!("Returning {} detections", detections.len());

    Ok(Json(PredictionResponse {
        detections,
        detection_image_path: annotated_path.display().to_string(),
    }))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), PredictError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(PredictError::Multipart)?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await.map_err(PredictError::Multipart)?;
            return Ok((filename, bytes));
        }
    }

    Err(PredictError::MissingFile)
}
