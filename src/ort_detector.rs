use crate::{
    config::ModelConfig,
    detector::{Detector, DetectorError, RawDetection},
};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{s, Array, Axis, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
    sync::Mutex,
};

const INPUT_SIZE: u32 = 640;
const IOU_THRESHOLD: f32 = 0.7;

fn intersection(box1: &RawDetection, box2: &RawDetection) -> f32 {
    // Overlap widths go negative for disjoint boxes; clamp each axis so two
    // negative gaps cannot multiply into a positive area.
    (box1.x2.min(box2.x2) - box1.x1.max(box2.x1)).max(0.)
        * (box1.y2.min(box2.y2) - box1.y1.max(box2.y1)).max(0.)
}

fn union(box1: &RawDetection, box2: &RawDetection) -> f32 {
    ((box1.x2 - box1.x1) * (box1.y2 - box1.y1)) + ((box2.x2 - box2.x1) * (box2.y2 - box2.y1))
        - intersection(box1, box2)
}

fn image_to_tensor(image: &DynamicImage) -> (Array<f32, Ix4>, u32, u32) {
    let (img_width, img_height) = image.dimensions();
    let img = image.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    (input, img_width, img_height)
}

fn load_class_labels(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let label = line.trim();
        if !label.is_empty() {
            labels.push(label.to_string());
        }
    }

    if labels.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "labels file contains no labels",
        ));
    }

    Ok(labels)
}

/// ONNX Runtime-backed helmet detector. One session per process, built at
/// startup and shared behind a mutex; inference serializes on the session.
pub struct OrtDetector {
    session: Mutex<Session>,
    class_labels: Vec<String>,
    min_probability: f32,
}

impl OrtDetector {
    pub fn new(model_config: &ModelConfig) -> Result<Self, DetectorError> {
        let labels_path = model_config.get_labels_path();
        let class_labels =
            load_class_labels(&labels_path).map_err(|source| DetectorError::Labels {
                path: labels_path.display().to_string(),
                source,
            })?;

        let session = Session::builder()
            .and_then(|builder| Ok(builder.with_optimization_level(GraphOptimizationLevel::Level3)?))
            .and_then(|mut builder| builder.commit_from_file(model_config.get_model_path()))
            .map_err(DetectorError::ModelLoad)?;

        tracing::info!(
            "Loaded ONNX session from {:?} with {} class labels",
            model_config.get_model_path(),
            class_labels.len()
        );

        Ok(Self {
            session: Mutex::new(session),
            class_labels,
            min_probability: model_config.min_probability,
        })
    }

    fn run_session(&self, input: &Array<f32, Ix4>) -> Result<ndarray::ArrayD<f32>, DetectorError> {
        let mut session = self.session.lock().map_err(|_| DetectorError::Poisoned)?;

        let tensor_ref =
            TensorRef::from_array_view(input.view()).map_err(DetectorError::Inference)?;
        let input_tensor = ort::inputs![tensor_ref];

        let outputs = session.run(input_tensor).map_err(DetectorError::Inference)?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(DetectorError::Inference)?;

        let ix = shape.to_ixdyn();
        ndarray::ArrayD::from_shape_vec(ix, data.to_vec())
            .map_err(|e| DetectorError::MalformedOutput(e.to_string()))
    }
}

fn decode_output(
    outputs: &ndarray::ArrayD<f32>,
    img_width: u32,
    img_height: u32,
    min_probability: f32,
) -> Result<Vec<RawDetection>, DetectorError> {
    if outputs.ndim() != 3 || outputs.shape()[1] < 5 {
        return Err(DetectorError::MalformedOutput(format!(
            "expected (1, 4+classes, anchors) output, got {:?}",
            outputs.shape()
        )));
    }

    let output = outputs.slice(s![0, .., ..]);
    let mut boxes = Vec::new();

    for anchor in output.axis_iter(Axis(1)) {
        let row: Vec<f32> = anchor.iter().copied().collect();
        let Some((class_id, prob)) = row
            .iter()
            .skip(4)
            .enumerate()
            .map(|(index, value)| (index, *value))
            .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
        else {
            continue;
        };

        if prob < min_probability {
            continue;
        }

        let xc = row[0] / INPUT_SIZE as f32 * (img_width as f32);
        let yc = row[1] / INPUT_SIZE as f32 * (img_height as f32);
        let w = row[2] / INPUT_SIZE as f32 * (img_width as f32);
        let h = row[3] / INPUT_SIZE as f32 * (img_height as f32);

        boxes.push(RawDetection {
            class_id,
            confidence: prob,
            x1: xc - w / 2.,
            y1: yc - h / 2.,
            x2: xc + w / 2.,
            y2: yc + h / 2.,
        });
    }

    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
    let mut result = Vec::new();

    while !boxes.is_empty() {
        result.push(boxes[0]);
        boxes = boxes
            .iter()
            .filter(|box1| intersection(&boxes[0], box1) / union(&boxes[0], box1) < IOU_THRESHOLD)
            .cloned()
            .collect();
    }

    Ok(result)
}

impl Detector for OrtDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>, DetectorError> {
        let (input, img_width, img_height) = image_to_tensor(image);
        let outputs = self.run_session(&input)?;
        let detections = decode_output(&outputs, img_width, img_height, self.min_probability)?;

        tracing::debug!("Model reported {} detections", detections.len());
        Ok(detections)
    }

    fn labels(&self) -> &[String] {
        &self.class_labels
    }
}
