use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("failed to load model: {0}")]
    ModelLoad(#[source] ort::Error),
    #[error("failed to load labels from {path}: {source}")]
    Labels {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("inference failed: {0}")]
    Inference(#[source] ort::Error),
    #[error("model returned malformed output: {0}")]
    MalformedOutput(String),
    #[error("model session mutex poisoned")]
    Poisoned,
}

/// One model-reported object instance, in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// A pretrained object-detection model, loaded once at startup and shared
/// read-only across requests. `detect` is synchronous and CPU-bound; callers
/// on the async loop must offload it to a blocking worker.
pub trait Detector: Send + Sync + 'static {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>, DetectorError>;

    /// Class-index-to-label table, fixed at model-load time.
    fn labels(&self) -> &[String];
}
