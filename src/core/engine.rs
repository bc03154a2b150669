//! Verification decision core.
//!
//! Everything here is a pure function of two embeddings and a [`ModelConfig`]:
//! the same probe/reference pair always produces the same outcome.

use crate::common::{FaceAuthError, Result};
use crate::core::model::{DistanceMetric, ModelConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub distance: f64,
    pub threshold: f64,
    pub confidence: f64,
}

pub fn decide(probe: &[f32], reference: &[f32], config: &ModelConfig) -> Result<VerificationOutcome> {
    if probe.len() != reference.len() {
        return Err(FaceAuthError::DimensionMismatch {
            probe: probe.len(),
            reference: reference.len(),
        });
    }

    let distance = distance(probe, reference, config.metric);
    Ok(decide_distance(distance, config))
}

/// Applies threshold and confidence mapping to an already computed distance.
pub fn decide_distance(distance: f64, config: &ModelConfig) -> VerificationOutcome {
    let threshold = config.threshold;
    // Strict: a distance equal to the threshold is a rejection.
    let verified = distance < threshold;
    let confidence = config.confidence.confidence(distance, threshold, verified);

    VerificationOutcome {
        verified,
        distance,
        threshold,
        confidence,
    }
}

/// Symmetric, non-negative distance. Identical vectors are exactly 0.
pub fn distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> f64 {
    if a == b {
        return 0.0;
    }

    match metric {
        DistanceMetric::Cosine => (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0),
        DistanceMetric::Euclidean => euclidean_distance(a.iter().copied(), b.iter().copied()),
        DistanceMetric::EuclideanL2 => {
            let norm_a = l2_norm(a);
            let norm_b = l2_norm(b);
            if norm_a == 0.0 || norm_b == 0.0 {
                return euclidean_distance(a.iter().copied(), b.iter().copied());
            }
            euclidean_distance(
                a.iter().map(|&x| (x as f64 / norm_a) as f32),
                b.iter().map(|&y| (y as f64 / norm_b) as f32),
            )
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt()
}

fn euclidean_distance(a: impl Iterator<Item = f32>, b: impl Iterator<Item = f32>) -> f64 {
    a.zip(b)
        .map(|(x, y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
