use crate::common::{Config, FaceAuthError, Result};
use crate::core::detector::FaceBox;
use crate::core::onnx::load_session;
use crate::core::recognizer::crop_face;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

/// Index of the "real face" class in the anti-spoof classifier output.
const LIVE_CLASS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessScore {
    pub is_live: bool,
    pub score: f32,
}

/// MiniFASNet-style anti-spoof classifier.
pub struct LivenessModel {
    session: Session,
    _environment: Arc<Environment>,
    input_size: u32,
    crop_scale: f32,
    live_threshold: f32,
}

impl LivenessModel {
    pub fn new(config: &Config, models_base: &Path) -> Result<Self> {
        let model_path = crate::common::paths::resolve_model_path(&config.models.antispoof_path, models_base);
        let (session, environment) =
            load_session("anti_spoof", &model_path, config.performance.optimization_level)?;

        Ok(Self {
            session,
            _environment: environment,
            input_size: config.antispoof.input_size,
            crop_scale: config.antispoof.crop_scale,
            live_threshold: config.antispoof.live_threshold,
        })
    }

    pub fn check(&self, image: &DynamicImage, face: &FaceBox) -> Result<LivenessScore> {
        let crop = crop_face(image, face, self.crop_scale)
            .resize_exact(self.input_size, self.input_size, FilterType::Triangle);

        let input_array = self.preprocess(&crop);
        let cow_array = CowArray::from(input_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let logits = outputs
            .first()
            .ok_or_else(|| FaceAuthError::Model("Anti-spoof model produced no outputs".into()))?
            .try_extract::<f32>()?
            .view()
            .to_owned()
            .into_raw_vec();

        score_logits(&logits, self.live_threshold)
    }

    // The classifier was trained on raw BGR values.
    fn preprocess(&self, img: &DynamicImage) -> Array4<f32> {
        let rgb = img.to_rgb8();
        let size = self.input_size as usize;
        let mut array = Array4::<f32>::zeros((1, 3, size, size));

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            array[[0, 0, y, x]] = pixel[2] as f32;
            array[[0, 1, y, x]] = pixel[1] as f32;
            array[[0, 2, y, x]] = pixel[0] as f32;
        }

        array
    }
}

/// Softmax over the classifier logits; live when the real-face class wins and
/// clears the threshold.
pub fn score_logits(logits: &[f32], live_threshold: f32) -> Result<LivenessScore> {
    if logits.len() <= LIVE_CLASS || logits.iter().any(|v| !v.is_finite()) {
        return Err(FaceAuthError::Model(format!(
            "Unexpected anti-spoof output: {} logits", logits.len()
        )));
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    let probs: Vec<f32> = exps.iter().map(|e| e / total).collect();

    let best = probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let score = probs[LIVE_CLASS];

    Ok(LivenessScore {
        is_live: best == LIVE_CLASS && score >= live_threshold,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_class_must_win_and_clear_threshold() {
        let live = score_logits(&[0.1, 4.0, 0.2], 0.5).unwrap();
        assert!(live.is_live);
        assert!(live.score > 0.9);

        let spoof = score_logits(&[3.0, 0.5, 2.0], 0.5).unwrap();
        assert!(!spoof.is_live);

        // wins the argmax but not confidently enough
        let borderline = score_logits(&[1.0, 1.1, 1.0], 0.5).unwrap();
        assert!(!borderline.is_live);
    }

    #[test]
    fn malformed_output_fails_closed() {
        assert!(score_logits(&[1.0], 0.5).is_err());
        assert!(score_logits(&[1.0, f32::NAN, 0.0], 0.5).is_err());
    }
}
