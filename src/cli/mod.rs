//! Helpers behind the `faceverify` command line.

use crate::common::{Config, FaceAuthError, Result};
use crate::core::auth::FaceUpload;
use crate::core::engine::{self, VerificationOutcome};
use crate::core::model::{ConfidenceCurve, DistanceMetric, ModelConfig, RecognitionModel};
use crate::core::recognizer::Embedding;
use image::ImageFormat;
use serde::Deserialize;
use std::path::Path;

/// Reads an image file and labels it with the content type its extension implies.
pub fn upload_from_path(path: &Path) -> Result<FaceUpload> {
    let bytes = std::fs::read(path)?;
    Ok(FaceUpload::new(content_type_for(path), bytes))
}

pub fn content_type_for(path: &Path) -> &'static str {
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        Ok(_) => "image/octet-stream",
        Err(_) => "application/octet-stream",
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingFile {
    Bare(Embedding),
    Document { face_embedding: Embedding },
}

/// Loads an embedding from JSON: either a bare array or a stored user document.
pub fn load_embedding_file(path: &Path) -> Result<Embedding> {
    let contents = std::fs::read_to_string(path)?;
    let parsed: EmbeddingFile = serde_json::from_str(&contents).map_err(|e| {
        FaceAuthError::Other(anyhow::anyhow!("{} is not an embedding file: {}", path.display(), e))
    })?;

    let embedding = match parsed {
        EmbeddingFile::Bare(embedding) => embedding,
        EmbeddingFile::Document { face_embedding } => face_embedding,
    };

    if embedding.is_empty() {
        return Err(FaceAuthError::Other(anyhow::anyhow!(
            "{} holds an empty embedding", path.display()
        )));
    }
    Ok(embedding)
}

/// Offline decision over two embedding files.
pub fn compare_files(probe: &Path, reference: &Path, model: &ModelConfig) -> Result<VerificationOutcome> {
    let probe = load_embedding_file(probe)?;
    let reference = load_embedding_file(reference)?;
    engine::decide(&probe, &reference, model)
}

/// Decision settings for offline comparison.
///
/// Flags win over the config file. A missing config file falls back to the
/// calibrated ArcFace/cosine defaults; a config that exists but does not load
/// is an error.
pub fn offline_model_config(
    config_path: &Path,
    model: Option<String>,
    metric: Option<String>,
    threshold: Option<f64>,
) -> Result<ModelConfig> {
    let config = if config_path.exists() {
        Some(Config::load_from_path(config_path)?)
    } else {
        tracing::debug!("No config at {}, using calibrated defaults", config_path.display());
        None
    };

    let model: RecognitionModel = match model {
        Some(name) => name.parse()?,
        None => config.as_ref().map_or(RecognitionModel::ArcFace, |c| c.recognizer.model),
    };
    let metric: DistanceMetric = match metric {
        Some(name) => name.parse()?,
        None => config.as_ref().map_or(DistanceMetric::Cosine, |c| c.verification.metric),
    };

    let mut model_config = ModelConfig::calibrated(model, metric);
    if let Some(c) = &config {
        model_config = model_config.with_confidence(ConfidenceCurve {
            steepness: c.verification.confidence_steepness,
        })?;
        // A configured threshold only applies to the configured pair
        if c.recognizer.model == model && c.verification.metric == metric {
            if let Some(t) = c.verification.threshold {
                model_config = model_config.with_threshold(t)?;
            }
        }
    }
    if let Some(t) = threshold {
        model_config = model_config.with_threshold(t)?;
    }
    Ok(model_config)
}
