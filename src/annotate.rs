use crate::{config::AnnotationConfig, detection::Detection};
use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use thiserror::Error;

static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

const COMPLIANT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const FLAGGED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_SCALE: f32 = 16.0;
const BOX_THICKNESS: i32 = 2;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("embedded font is invalid: {0}")]
    Font(#[from] InvalidFont),
}

/// Draws detection overlays: a rectangle per bounding box plus a
/// `<label> <confidence>` legend above its top-left corner. Color policy is
/// binary, keyed on the configured compliant label.
pub struct Annotator {
    font: FontRef<'static>,
    compliant_label: String,
}

impl Annotator {
    pub fn new(annotation_config: &AnnotationConfig) -> Result<Self, AnnotateError> {
        let font = FontRef::try_from_slice(FONT_BYTES)?;
        Ok(Self {
            font,
            compliant_label: annotation_config.compliant_label.clone(),
        })
    }

    fn color_for(&self, class_label: &str) -> Rgb<u8> {
        if class_label == self.compliant_label {
            COMPLIANT_COLOR
        } else {
            FLAGGED_COLOR
        }
    }

    pub fn annotate(&self, image: &mut RgbImage, detections: &[Detection]) {
        for detection in detections {
            let [x1, y1, x2, y2] = detection.bbox;
            let color = self.color_for(&detection.class_label);
            let width = (x2 - x1).max(1) as u32;
            let height = (y2 - y1).max(1) as u32;

            for inset in 0..BOX_THICKNESS {
                if width <= 2 * inset as u32 || height <= 2 * inset as u32 {
                    break;
                }
                let rect = Rect::at(x1 + inset, y1 + inset)
                    .of_size(width - 2 * inset as u32, height - 2 * inset as u32);
                draw_hollow_rect_mut(image, rect, color);
            }

            let legend = format!("{} {:.2}", detection.class_label, detection.confidence);
            let text_y = (y1 - LABEL_SCALE as i32 + 2).max(0);
            draw_text_mut(
                image,
                color,
                x1.max(0),
                text_y,
                PxScale::from(LABEL_SCALE),
                &self.font,
                &legend,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotator() -> Annotator {
        Annotator::new(&AnnotationConfig {
            compliant_label: "With Helmet".to_string(),
        })
        .unwrap()
    }

    fn detection(class_label: &str) -> Detection {
        Detection {
            class_label: class_label.to_string(),
            confidence: 0.91,
            bbox: [20, 30, 60, 80],
        }
    }

    #[test]
    fn compliant_detection_draws_green_box() {
        let mut image = RgbImage::new(100, 100);
        annotator().annotate(&mut image, &[detection("With Helmet")]);

        assert_eq!(*image.get_pixel(20, 50), COMPLIANT_COLOR);
        assert_eq!(*image.get_pixel(40, 30), COMPLIANT_COLOR);
        assert_eq!(*image.get_pixel(40, 31), COMPLIANT_COLOR);
    }

    #[test]
    fn non_compliant_detection_draws_red_box() {
        let mut image = RgbImage::new(100, 100);
        annotator().annotate(&mut image, &[detection("Without Helmet")]);

        assert_eq!(*image.get_pixel(59, 50), FLAGGED_COLOR);
    }

    #[test]
    fn zero_detections_leaves_the_image_untouched() {
        let mut image = RgbImage::new(50, 50);
        let untouched = image.clone();
        annotator().annotate(&mut image, &[]);

        assert_eq!(image, untouched);
    }

    #[test]
    fn boxes_at_the_image_edge_do_not_panic() {
        let mut image = RgbImage::new(100, 100);
        let clipped = Detection {
            class_label: "Without Helmet".to_string(),
            confidence: 0.33,
            bbox: [-10, -10, 150, 150],
        };
        annotator().annotate(&mut image, &[clipped]);
    }
}
