use crate::common::{FaceAuthError, Result};
use crate::core::model::RecognitionModel;
use crate::core::recognizer::Embedding;
use std::sync::Arc;

/// One face as reported by the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub embedding: Embedding,
    pub is_live: bool,
    pub confidence: f32,
    pub antispoof_score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeOptions {
    pub model: RecognitionModel,
    pub detector_backend: String,
    pub anti_spoofing: bool,
    /// Upper bound on the faces the analyzer needs to report.
    pub max_faces: Option<usize>,
}

/// External embedding + anti-spoofing capability.
pub trait FaceAnalyzer {
    fn analyze(&self, image: &[u8], options: &AnalyzeOptions) -> Result<Vec<DetectedFace>>;
}

impl<T: FaceAnalyzer + ?Sized> FaceAnalyzer for &T {
    fn analyze(&self, image: &[u8], options: &AnalyzeOptions) -> Result<Vec<DetectedFace>> {
        (**self).analyze(image, options)
    }
}

impl<T: FaceAnalyzer + ?Sized> FaceAnalyzer for Arc<T> {
    fn analyze(&self, image: &[u8], options: &AnalyzeOptions) -> Result<Vec<DetectedFace>> {
        (**self).analyze(image, options)
    }
}

/// Process-wide detector/model selection for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub model: RecognitionModel,
    pub detector_backend: String,
}

pub struct ExtractionGateway<A> {
    analyzer: A,
    settings: ExtractionSettings,
}

impl<A: FaceAnalyzer> ExtractionGateway<A> {
    pub fn new(analyzer: A, settings: ExtractionSettings) -> Self {
        Self { analyzer, settings }
    }

    pub fn extract(&self, image: &[u8], enforce_single_face: bool) -> Result<Embedding> {
        let options = AnalyzeOptions {
            model: self.settings.model,
            detector_backend: self.settings.detector_backend.clone(),
            anti_spoofing: true,
            // Two is enough to tell a single subject from an ambiguous one.
            max_faces: enforce_single_face.then_some(2),
        };

        let faces = self.analyzer.analyze(image, &options).map_err(|e| {
            if e.is_extraction_outcome() {
                e
            } else {
                FaceAuthError::EmbeddingExtractionFailed(e.to_string())
            }
        })?;

        if faces.iter().any(|face| !face.is_live) {
            tracing::warn!("Spoof detected among {} face(s)", faces.len());
            return Err(FaceAuthError::SpoofDetected);
        }

        let face = match faces.len() {
            0 => {
                tracing::warn!("No face detected in the provided image");
                return Err(FaceAuthError::NoFaceDetected);
            }
            1 => faces.into_iter().next(),
            n if enforce_single_face => {
                tracing::warn!("Multiple faces detected in the provided image: {}", n);
                return Err(FaceAuthError::MultipleFacesDetected(n));
            }
            _ => faces.into_iter().max_by(|a, b| a.confidence.total_cmp(&b.confidence)),
        }
        .ok_or(FaceAuthError::NoFaceDetected)?;

        check_embedding(&face.embedding, self.settings.model)?;
        Ok(face.embedding)
    }
}

fn check_embedding(embedding: &[f32], model: RecognitionModel) -> Result<()> {
    if embedding.is_empty() {
        return Err(FaceAuthError::EmbeddingExtractionFailed("empty embedding vector".into()));
    }
    if embedding.len() != model.embedding_dimension() {
        return Err(FaceAuthError::EmbeddingExtractionFailed(format!(
            "{} embeddings have {} values, got {}",
            model,
            model.embedding_dimension(),
            embedding.len()
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(FaceAuthError::EmbeddingExtractionFailed("non-finite embedding value".into()));
    }
    if embedding.iter().all(|&v| v == 0.0) {
        return Err(FaceAuthError::EmbeddingExtractionFailed("all-zero embedding vector".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct ScriptedAnalyzer {
        result: RefCell<Option<Result<Vec<DetectedFace>>>>,
        seen: RefCell<Vec<AnalyzeOptions>>,
    }

    impl ScriptedAnalyzer {
        fn returning(result: Result<Vec<DetectedFace>>) -> Self {
            Self {
                result: RefCell::new(Some(result)),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl FaceAnalyzer for ScriptedAnalyzer {
        fn analyze(&self, _image: &[u8], options: &AnalyzeOptions) -> Result<Vec<DetectedFace>> {
            self.seen.borrow_mut().push(options.clone());
            self.result.borrow_mut().take().expect("analyzer called once")
        }
    }

    fn face(value: f32, is_live: bool, confidence: f32) -> DetectedFace {
        DetectedFace {
            embedding: vec![value; 128],
            is_live,
            confidence,
            antispoof_score: if is_live { 0.98 } else { 0.1 },
        }
    }

    fn gateway(analyzer: &ScriptedAnalyzer) -> ExtractionGateway<&ScriptedAnalyzer> {
        ExtractionGateway::new(
            analyzer,
            ExtractionSettings {
                model: RecognitionModel::Facenet,
                detector_backend: "yolov8-face".into(),
            },
        )
    }

    #[test]
    fn zero_faces_is_no_face_detected() {
        let analyzer = ScriptedAnalyzer::returning(Ok(vec![]));
        let err = gateway(&analyzer).extract(b"img", true).unwrap_err();
        assert!(matches!(err, FaceAuthError::NoFaceDetected));
    }

    #[test]
    fn two_faces_is_ambiguous() {
        let analyzer = ScriptedAnalyzer::returning(Ok(vec![face(0.1, true, 0.9), face(0.2, true, 0.8)]));
        let err = gateway(&analyzer).extract(b"img", true).unwrap_err();
        assert!(matches!(err, FaceAuthError::MultipleFacesDetected(2)));
        assert_eq!(analyzer.seen.borrow()[0].max_faces, Some(2));
        assert!(analyzer.seen.borrow()[0].anti_spoofing);
    }

    #[test]
    fn single_live_face_yields_its_embedding() {
        let analyzer = ScriptedAnalyzer::returning(Ok(vec![face(0.3, true, 0.9)]));
        let embedding = gateway(&analyzer).extract(b"img", true).unwrap();
        assert_eq!(embedding, vec![0.3; 128]);
    }

    #[test]
    fn spoofed_single_face_is_rejected() {
        let analyzer = ScriptedAnalyzer::returning(Ok(vec![face(0.3, false, 0.9)]));
        let err = gateway(&analyzer).extract(b"img", true).unwrap_err();
        assert!(matches!(err, FaceAuthError::SpoofDetected));
    }

    #[test]
    fn spoof_takes_precedence_over_multiple_faces() {
        let analyzer = ScriptedAnalyzer::returning(Ok(vec![face(0.1, true, 0.9), face(0.2, false, 0.8)]));
        let err = gateway(&analyzer).extract(b"img", true).unwrap_err();
        assert!(matches!(err, FaceAuthError::SpoofDetected));
    }

    #[test]
    fn analyzer_reported_spoof_passes_through() {
        let analyzer = ScriptedAnalyzer::returning(Err(FaceAuthError::SpoofDetected));
        let err = gateway(&analyzer).extract(b"img", true).unwrap_err();
        assert!(matches!(err, FaceAuthError::SpoofDetected));
    }

    #[test]
    fn unclassified_analyzer_failure_becomes_extraction_failure() {
        let analyzer = ScriptedAnalyzer::returning(Err(FaceAuthError::Model("session crashed".into())));
        let err = gateway(&analyzer).extract(b"img", true).unwrap_err();
        assert!(matches!(err, FaceAuthError::EmbeddingExtractionFailed(msg) if msg.contains("session crashed")));
    }

    #[test]
    fn degenerate_embeddings_are_internal_failures() {
        for embedding in [vec![], vec![0.0; 128], vec![0.5; 64], {
            let mut v = vec![0.5; 128];
            v[7] = f32::NAN;
            v
        }] {
            let analyzer = ScriptedAnalyzer::returning(Ok(vec![DetectedFace {
                embedding,
                is_live: true,
                confidence: 0.9,
                antispoof_score: 0.99,
            }]));
            let err = gateway(&analyzer).extract(b"img", true).unwrap_err();
            assert!(matches!(err, FaceAuthError::EmbeddingExtractionFailed(_)));
        }
    }

    #[test]
    fn relaxed_mode_picks_most_confident_face() {
        let analyzer = ScriptedAnalyzer::returning(Ok(vec![face(0.1, true, 0.6), face(0.2, true, 0.95)]));
        let embedding = gateway(&analyzer).extract(b"img", false).unwrap();
        assert_eq!(embedding, vec![0.2; 128]);
        assert_eq!(analyzer.seen.borrow()[0].max_faces, None);
    }
}
