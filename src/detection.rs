use crate::detector::RawDetection;
use serde::Serialize;

/// One detection in the response contract: resolved class label, confidence
/// rounded to two decimals, corner coordinates truncated to integers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_label: String,
    pub confidence: f32,
    pub bbox: [i32; 4],
}

impl Detection {
    pub fn from_raw(raw: &RawDetection, class_labels: &[String]) -> Self {
        let class_label = class_labels
            .get(raw.class_id)
            .cloned()
            .unwrap_or_else(|| format!("Unknown class {}", raw.class_id));

        let x1 = raw.x1.min(raw.x2);
        let x2 = raw.x1.max(raw.x2);
        let y1 = raw.y1.min(raw.y2);
        let y2 = raw.y1.max(raw.y2);

        Self {
            class_label,
            confidence: (raw.confidence * 100.).round() / 100.,
            bbox: [x1 as i32, y1 as i32, x2 as i32, y2 as i32],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub detections: Vec<Detection>,
    pub detection_image_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["With Helmet".to_string(), "Without Helmet".to_string()]
    }

    #[test]
    fn from_raw_truncates_coordinates_and_rounds_confidence() {
        let raw = RawDetection {
            class_id: 0,
            confidence: 0.9149,
            x1: 100.7,
            y1: 100.2,
            x2: 200.9,
            y2: 300.1,
        };

        let detection = Detection::from_raw(&raw, &labels());

        assert_eq!(detection.class_label, "With Helmet");
        assert_eq!(detection.confidence, 0.91);
        assert_eq!(detection.bbox, [100, 100, 200, 300]);
    }

    #[test]
    fn from_raw_orders_corner_coordinates() {
        let raw = RawDetection {
            class_id: 1,
            confidence: 0.5,
            x1: 200.,
            y1: 300.,
            x2: 100.,
            y2: 100.,
        };

        let detection = Detection::from_raw(&raw, &labels());
        let [x1, y1, x2, y2] = detection.bbox;

        assert!(x1 < x2);
        assert!(y1 < y2);
    }

    #[test]
    fn from_raw_falls_back_on_unknown_class() {
        let raw = RawDetection {
            class_id: 9,
            confidence: 0.42,
            x1: 0.,
            y1: 0.,
            x2: 1.,
            y2: 1.,
        };

        let detection = Detection::from_raw(&raw, &labels());
        assert_eq!(detection.class_label, "Unknown class 9");
    }

    #[test]
    fn detection_serializes_to_the_wire_shape() {
        let detection = Detection {
            class_label: "With Helmet".to_string(),
            confidence: 0.91,
            bbox: [100, 100, 200, 300],
        };

        let json = serde_json::to_string(&detection).unwrap();
        assert_eq!(
            json,
            r#"{"class":"With Helmet","confidence":0.91,"bbox":[100,100,200,300]}"#
        );
    }
}
