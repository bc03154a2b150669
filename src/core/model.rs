use crate::common::{FaceAuthError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Face recognition models with calibrated decision thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecognitionModel {
    #[serde(rename = "VGG-Face")]
    VggFace,
    Facenet,
    Facenet512,
    ArcFace,
    Dlib,
    SFace,
    OpenFace,
    DeepFace,
    #[serde(rename = "DeepID")]
    DeepId,
    GhostFaceNet,
}

impl RecognitionModel {
    pub const ALL: [RecognitionModel; 10] = [
        RecognitionModel::VggFace,
        RecognitionModel::Facenet,
        RecognitionModel::Facenet512,
        RecognitionModel::ArcFace,
        RecognitionModel::Dlib,
        RecognitionModel::SFace,
        RecognitionModel::OpenFace,
        RecognitionModel::DeepFace,
        RecognitionModel::DeepId,
        RecognitionModel::GhostFaceNet,
    ];

    /// Length of the vectors this model emits.
    pub fn embedding_dimension(self) -> usize {
        match self {
            RecognitionModel::VggFace => 4096,
            RecognitionModel::Facenet => 128,
            RecognitionModel::Facenet512 => 512,
            RecognitionModel::ArcFace => 512,
            RecognitionModel::Dlib => 128,
            RecognitionModel::SFace => 128,
            RecognitionModel::OpenFace => 128,
            RecognitionModel::DeepFace => 4096,
            RecognitionModel::DeepId => 160,
            RecognitionModel::GhostFaceNet => 512,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecognitionModel::VggFace => "VGG-Face",
            RecognitionModel::Facenet => "Facenet",
            RecognitionModel::Facenet512 => "Facenet512",
            RecognitionModel::ArcFace => "ArcFace",
            RecognitionModel::Dlib => "Dlib",
            RecognitionModel::SFace => "SFace",
            RecognitionModel::OpenFace => "OpenFace",
            RecognitionModel::DeepFace => "DeepFace",
            RecognitionModel::DeepId => "DeepID",
            RecognitionModel::GhostFaceNet => "GhostFaceNet",
        }
    }
}

impl fmt::Display for RecognitionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    /// Euclidean distance between L2-normalized vectors.
    EuclideanL2,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::EuclideanL2 => "euclidean_l2",
        })
    }
}

impl std::str::FromStr for RecognitionModel {
    type Err = FaceAuthError;

    fn from_str(s: &str) -> Result<Self> {
        RecognitionModel::ALL
            .iter()
            .copied()
            .find(|model| model.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| FaceAuthError::Config(format!("Unknown recognition model: {}", s)))
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = FaceAuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "euclidean_l2" => Ok(DistanceMetric::EuclideanL2),
            _ => Err(FaceAuthError::Config(format!("Unknown distance metric: {}", s))),
        }
    }
}

/// Calibrated threshold for a model/metric pair, taken from each model's
/// published reference evaluation.
pub fn calibrated_threshold(model: RecognitionModel, metric: DistanceMetric) -> f64 {
    use DistanceMetric::*;
    use RecognitionModel::*;

    match (model, metric) {
        (VggFace, Cosine) => 0.68,
        (VggFace, Euclidean) => 1.17,
        (VggFace, EuclideanL2) => 1.17,
        (Facenet, Cosine) => 0.40,
        (Facenet, Euclidean) => 10.0,
        (Facenet, EuclideanL2) => 0.80,
        (Facenet512, Cosine) => 0.30,
        (Facenet512, Euclidean) => 23.56,
        (Facenet512, EuclideanL2) => 1.04,
        (ArcFace, Cosine) => 0.68,
        (ArcFace, Euclidean) => 4.15,
        (ArcFace, EuclideanL2) => 1.13,
        (Dlib, Cosine) => 0.07,
        (Dlib, Euclidean) => 0.6,
        (Dlib, EuclideanL2) => 0.4,
        (SFace, Cosine) => 0.593,
        (SFace, Euclidean) => 10.734,
        (SFace, EuclideanL2) => 1.055,
        (OpenFace, Cosine) => 0.10,
        (OpenFace, Euclidean) => 0.55,
        (OpenFace, EuclideanL2) => 0.55,
        (DeepFace, Cosine) => 0.23,
        (DeepFace, Euclidean) => 64.0,
        (DeepFace, EuclideanL2) => 0.64,
        (DeepId, Cosine) => 0.015,
        (DeepId, Euclidean) => 45.0,
        (DeepId, EuclideanL2) => 0.17,
        (GhostFaceNet, Cosine) => 0.65,
        (GhostFaceNet, Euclidean) => 35.71,
        (GhostFaceNet, EuclideanL2) => 1.10,
    }
}

/// Maps the relative margin between distance and threshold to a percentage.
///
/// `confidence = 50 + 50 * tanh(steepness * |threshold - distance| / threshold)`
///
/// The result sits in `[50, 100)` for every decision and grows as the
/// distance moves away from the threshold in either direction, so it reads as
/// "how sure are we of this accept/reject".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceCurve {
    pub steepness: f64,
}

pub const CONFIDENCE_MIN: f64 = 0.0;
pub const CONFIDENCE_MAX: f64 = 100.0;

impl Default for ConfidenceCurve {
    fn default() -> Self {
        Self { steepness: 3.0 }
    }
}

impl ConfidenceCurve {
    pub fn confidence(&self, distance: f64, threshold: f64, verified: bool) -> f64 {
        let margin = if verified {
            threshold - distance
        } else {
            distance - threshold
        };
        let margin = margin.max(0.0);
        // A degenerate threshold leaves only "on it" or "past it"
        let relative = if threshold.is_finite() && threshold > 0.0 {
            margin / threshold
        } else if margin > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        let score = 50.0 + 50.0 * (self.steepness * relative).tanh();
        score.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
    }
}

/// Immutable decision configuration, built once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    pub model: RecognitionModel,
    pub metric: DistanceMetric,
    pub threshold: f64,
    pub confidence: ConfidenceCurve,
}

impl ModelConfig {
    pub fn calibrated(model: RecognitionModel, metric: DistanceMetric) -> Self {
        Self {
            model,
            metric,
            threshold: calibrated_threshold(model, metric),
            confidence: ConfidenceCurve::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(FaceAuthError::Config(format!(
                "Threshold must be a positive finite number, got {}",
                threshold
            )));
        }
        self.threshold = threshold;
        Ok(self)
    }

    pub fn with_confidence(mut self, confidence: ConfidenceCurve) -> Result<Self> {
        if !confidence.steepness.is_finite() || confidence.steepness <= 0.0 {
            return Err(FaceAuthError::Config(format!(
                "Confidence steepness must be a positive finite number, got {}",
                confidence.steepness
            )));
        }
        self.confidence = confidence;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_table_is_keyed_by_model_and_metric() {
        assert_eq!(calibrated_threshold(RecognitionModel::Facenet, DistanceMetric::Cosine), 0.40);
        assert_eq!(calibrated_threshold(RecognitionModel::ArcFace, DistanceMetric::EuclideanL2), 1.13);
        assert_eq!(calibrated_threshold(RecognitionModel::Facenet512, DistanceMetric::Euclidean), 23.56);

        let config = ModelConfig::calibrated(RecognitionModel::SFace, DistanceMetric::Cosine);
        assert_eq!(config.threshold, 0.593);
    }

    #[test]
    fn model_names_match_their_serialized_form() {
        #[derive(Deserialize)]
        struct Wrapper {
            model: RecognitionModel,
            metric: DistanceMetric,
        }

        let parsed: Wrapper = toml::from_str("model = \"VGG-Face\"\nmetric = \"euclidean_l2\"").unwrap();
        assert_eq!(parsed.model, RecognitionModel::VggFace);
        assert_eq!(parsed.metric, DistanceMetric::EuclideanL2);
        assert_eq!(parsed.model.to_string(), "VGG-Face");
        assert_eq!(parsed.metric.to_string(), "euclidean_l2");
    }

    #[test]
    fn override_rejects_non_positive_thresholds() {
        let base = ModelConfig::calibrated(RecognitionModel::ArcFace, DistanceMetric::Cosine);
        assert!(base.with_threshold(0.0).is_err());
        assert!(base.with_threshold(f64::NAN).is_err());
        assert_eq!(base.with_threshold(0.4).unwrap().threshold, 0.4);
    }

    #[test]
    fn degenerate_thresholds_keep_confidence_bounded() {
        let curve = ConfidenceCurve::default();
        for threshold in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            for (distance, verified) in [(0.0, false), (0.3, false), (0.0, true)] {
                let score = curve.confidence(distance, threshold, verified);
                assert!(
                    (CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&score),
                    "threshold {} distance {} gave {}", threshold, distance, score
                );
            }
        }

        // identical vectors against a zero threshold sit exactly on the boundary
        assert_eq!(curve.confidence(0.0, 0.0, false), 50.0);
        assert_eq!(curve.confidence(0.3, 0.0, false), CONFIDENCE_MAX);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("arcface".parse::<RecognitionModel>().unwrap(), RecognitionModel::ArcFace);
        assert_eq!("DeepID".parse::<RecognitionModel>().unwrap(), RecognitionModel::DeepId);
        assert_eq!("euclidean-l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::EuclideanL2);
        assert!("manhattan".parse::<DistanceMetric>().is_err());

        for model in RecognitionModel::ALL {
            assert_eq!(model.name().parse::<RecognitionModel>().unwrap(), model);
        }
    }
}
