use crate::common::{Config, FaceAuthError, Result};
use crate::core::onnx::load_session;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

const NMS_IOU_THRESHOLD: f32 = 0.45;
const MIN_BOX_SIDE: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

pub struct FaceDetector {
    session: Session,
    _environment: Arc<Environment>,
    input_width: u32,
    input_height: u32,
    detection_confidence: f32,
}

impl FaceDetector {
    pub fn new(config: &Config, models_base: &Path) -> Result<Self> {
        let model_path = crate::common::paths::resolve_model_path(&config.models.detector_path, models_base);
        let (session, environment) =
            load_session("face_detector", &model_path, config.performance.optimization_level)?;

        Ok(Self {
            session,
            _environment: environment,
            input_width: config.detector.input_width,
            input_height: config.detector.input_height,
            detection_confidence: config.detector.detection_confidence,
        })
    }

    /// Faces sorted by confidence, in original image coordinates.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let orig_width = image.width() as f32;
        let orig_height = image.height() as f32;

        let img_array = if image.width() == self.input_width && image.height() == self.input_height {
            self.image_to_array(image)
        } else {
            let resized = image.resize_exact(self.input_width, self.input_height, FilterType::Triangle);
            self.image_to_array(&resized)
        };

        let cow_array = CowArray::from(img_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let output = outputs
            .first()
            .ok_or_else(|| FaceAuthError::Model("Detector produced no outputs".into()))?
            .try_extract::<f32>()?
            .view()
            .to_owned();
        let shape = output.shape().to_vec();
        let values = output
            .as_slice()
            .ok_or_else(|| FaceAuthError::Model("Detector output is not contiguous".into()))?;

        let mut faces = parse_predictions(values, &shape, self.input_width as f32, self.input_height as f32);

        // NMS on everything first so duplicates go before the confidence cut
        faces = apply_nms(faces, NMS_IOU_THRESHOLD);
        faces.retain(|face| face.confidence >= self.detection_confidence);

        let scale_x = orig_width / self.input_width as f32;
        let scale_y = orig_height / self.input_height as f32;
        for face in &mut faces {
            face.x1 *= scale_x;
            face.x2 *= scale_x;
            face.y1 *= scale_y;
            face.y2 *= scale_y;
        }

        tracing::debug!("Detector found {} face(s)", faces.len());
        Ok(faces)
    }

    fn image_to_array(&self, img: &DynamicImage) -> Array4<f32> {
        let rgb = img.to_rgb8();
        let width = rgb.width() as usize;
        let height = rgb.height() as usize;
        let mut array = Array4::<f32>::zeros((1, 3, height, width));

        let norm_factor = 1.0 / 255.0;
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            array[[0, 0, y, x]] = pixel[0] as f32 * norm_factor;
            array[[0, 1, y, x]] = pixel[1] as f32 * norm_factor;
            array[[0, 2, y, x]] = pixel[2] as f32 * norm_factor;
        }

        array
    }
}

/// Decodes YOLO-style predictions, `[1, N, F]` or transposed `[1, F, N]`,
/// where each prediction is `[x_center, y_center, width, height, score, ...]`.
pub fn parse_predictions(values: &[f32], shape: &[usize], input_width: f32, input_height: f32) -> Vec<FaceBox> {
    let mut faces = Vec::new();

    // Face heads carry 5 fields, or 20 with landmarks
    let fields = 5..=20;
    let (num_predictions, prediction_length, is_transposed) = match *shape {
        [_, n, len] if fields.contains(&len) => (n, len, false),
        [_, len, n] if fields.contains(&len) => (n, len, true),
        [n, len] => (n, len, false),
        _ => {
            tracing::warn!("Unexpected detector output shape: {:?}", shape);
            return faces;
        }
    };

    if prediction_length < 5 || values.len() < num_predictions * prediction_length {
        tracing::warn!("Detector output too short for shape {:?}", shape);
        return faces;
    }

    for i in 0..num_predictions {
        let at = |field: usize| {
            if is_transposed {
                values[field * num_predictions + i]
            } else {
                values[i * prediction_length + field]
            }
        };
        let (x_center_raw, y_center_raw, width_raw, height_raw, confidence) = (at(0), at(1), at(2), at(3), at(4));

        if confidence <= 0.001 {
            continue;
        }

        // Normalized coordinates need scaling to the input size
        let normalized = x_center_raw <= 1.0 && y_center_raw <= 1.0 && width_raw <= 1.0 && height_raw <= 1.0;
        let (sx, sy) = if normalized { (input_width, input_height) } else { (1.0, 1.0) };

        let x_center = x_center_raw * sx;
        let y_center = y_center_raw * sy;
        let width = width_raw * sx;
        let height = height_raw * sy;

        let x1 = (x_center - width / 2.0).max(0.0);
        let y1 = (y_center - height / 2.0).max(0.0);
        let x2 = (x_center + width / 2.0).min(input_width);
        let y2 = (y_center + height / 2.0).min(input_height);

        if (x2 - x1) > MIN_BOX_SIDE && (y2 - y1) > MIN_BOX_SIDE {
            faces.push(FaceBox { x1, y1, x2, y2, confidence });
        }
    }

    faces
}

pub fn apply_nms(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|kept| calculate_iou(kept, &candidate) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

pub fn calculate_iou(box1: &FaceBox, box2: &FaceBox) -> f32 {
    let x1 = box1.x1.max(box2.x1);
    let y1 = box1.y1.max(box2.y1);
    let x2 = box1.x2.min(box2.x2);
    let y2 = box1.y2.min(box2.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = box1.width() * box1.height() + box2.width() * box2.height() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> FaceBox {
        FaceBox { x1, y1, x2, y2, confidence }
    }

    #[test]
    fn nms_drops_overlapping_lower_confidence_boxes() {
        let boxes = vec![
            face(0.0, 0.0, 100.0, 100.0, 0.8),
            face(5.0, 5.0, 105.0, 105.0, 0.9),
            face(300.0, 300.0, 400.0, 400.0, 0.7),
        ];
        let kept = apply_nms(boxes, NMS_IOU_THRESHOLD);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.7);
    }

    #[test]
    fn parses_standard_and_transposed_layouts() {
        // two predictions: one face, one below the score floor
        let standard = [320.0, 320.0, 100.0, 120.0, 0.9, 10.0, 10.0, 50.0, 50.0, 0.0];
        let faces = parse_predictions(&standard, &[1, 2, 5], 640.0, 640.0);
        assert_eq!(faces, vec![face(270.0, 260.0, 370.0, 380.0, 0.9)]);

        let transposed = [320.0, 10.0, 320.0, 10.0, 100.0, 50.0, 120.0, 50.0, 0.9, 0.0];
        let faces = parse_predictions(&transposed, &[1, 5, 2], 640.0, 640.0);
        assert_eq!(faces, vec![face(270.0, 260.0, 370.0, 380.0, 0.9)]);
    }

    #[test]
    fn normalized_coordinates_are_scaled_to_input() {
        let normalized = [0.5, 0.5, 0.25, 0.25, 0.8];
        let faces = parse_predictions(&normalized, &[1, 1, 5], 640.0, 480.0);
        assert_eq!(faces, vec![face(240.0, 180.0, 400.0, 300.0, 0.8)]);
    }

    #[test]
    fn malformed_output_yields_no_faces() {
        assert!(parse_predictions(&[1.0, 2.0], &[1, 1, 5], 640.0, 640.0).is_empty());
        assert!(parse_predictions(&[1.0; 5], &[5], 640.0, 640.0).is_empty());
    }
}
