use crate::common::{Config, FaceAuthError, Result};
use crate::core::detector::{FaceBox, FaceDetector};
use crate::core::gateway::{AnalyzeOptions, DetectedFace, FaceAnalyzer};
use crate::core::liveness::{LivenessModel, LivenessScore};
use crate::core::model::RecognitionModel;
use crate::core::recognizer::FaceRecognizer;
use std::path::Path;

/// Detector + recognizer + anti-spoof classifier running on ONNX Runtime.
/// Loaded once at startup; models are reused across requests.
pub struct OnnxFaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    liveness: LivenessModel,
    model: RecognitionModel,
    backend: String,
}

impl OnnxFaceAnalyzer {
    pub fn new(config: &Config, models_base: &Path) -> Result<Self> {
        Ok(Self {
            detector: FaceDetector::new(config, models_base)?,
            recognizer: FaceRecognizer::new(config, models_base)?,
            liveness: LivenessModel::new(config, models_base)?,
            model: config.recognizer.model,
            backend: config.detector.backend.clone(),
        })
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&self, image: &[u8], options: &AnalyzeOptions) -> Result<Vec<DetectedFace>> {
        if options.model != self.model || options.detector_backend != self.backend {
            return Err(FaceAuthError::Model(format!(
                "Analyzer loaded {} / {}, request asked for {} / {}",
                self.model, self.backend, options.model, options.detector_backend
            )));
        }

        let frame = image::load_from_memory(image)?;
        let boxes = self.detector.detect(&frame)?;

        // Liveness runs over every detection so a spoof past the cap still surfaces
        let mut scored = Vec::with_capacity(boxes.len());
        for face in boxes {
            let liveness = if options.anti_spoofing {
                let liveness = self.liveness.check(&frame, &face)?;
                tracing::debug!("Anti-spoof score {:.3} (live: {})", liveness.score, liveness.is_live);
                liveness
            } else {
                LivenessScore { is_live: true, score: 1.0 }
            };
            scored.push((face, liveness));
        }

        let kept = cap_faces(scored, options.max_faces);
        let mut faces = Vec::with_capacity(kept.len());
        for (face, liveness) in kept {
            // A spoofed face never yields an embedding
            let embedding = if liveness.is_live {
                self.recognizer.get_embedding(&frame, &face)?
            } else {
                Vec::new()
            };

            faces.push(DetectedFace {
                embedding,
                is_live: liveness.is_live,
                confidence: face.confidence,
                antispoof_score: liveness.score,
            });
        }

        Ok(faces)
    }
}

/// Keeps the first `max_faces` detections plus any spoofed face beyond them.
fn cap_faces(
    scored: Vec<(FaceBox, LivenessScore)>,
    max_faces: Option<usize>,
) -> Vec<(FaceBox, LivenessScore)> {
    let Some(max_faces) = max_faces else {
        return scored;
    };

    scored
        .into_iter()
        .enumerate()
        .filter(|(i, (_, liveness))| *i < max_faces || !liveness.is_live)
        .map(|(_, face)| face)
        .collect()
}
