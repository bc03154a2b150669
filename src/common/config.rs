use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{FaceAuthError, Result};
use crate::core::model::{ConfidenceCurve, DistanceMetric, ModelConfig, RecognitionModel};
use crate::core::gateway::ExtractionSettings;

pub const DEFAULT_CONFIG_PATH: &str = "configs/faceverify.toml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub models: ModelPaths,
    pub detector: DetectorConfig,
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub antispoof: AntiSpoofConfig,
    pub verification: VerificationConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelPaths {
    pub detector_path: PathBuf,
    pub recognizer_path: PathBuf,
    pub antispoof_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    pub input_width: u32,
    pub input_height: u32,
    pub detection_confidence: f32,
}

fn default_backend() -> String { "yolov8-face".to_string() }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognizerConfig {
    pub model: RecognitionModel,
    pub input_size: u32,
    #[serde(default = "default_normalization")]
    pub normalization_mean: f32,
    #[serde(default = "default_normalization")]
    pub normalization_std: f32,
}

fn default_normalization() -> f32 { 127.5 }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AntiSpoofConfig {
    #[serde(default = "default_antispoof_size")]
    pub input_size: u32,
    /// Factor applied to the face box before cropping; the classifier wants context.
    #[serde(default = "default_crop_scale")]
    pub crop_scale: f32,
    #[serde(default = "default_live_threshold")]
    pub live_threshold: f32,
}

fn default_antispoof_size() -> u32 { 80 }
fn default_crop_scale() -> f32 { 2.7 }
fn default_live_threshold() -> f32 { 0.5 }

impl Default for AntiSpoofConfig {
    fn default() -> Self {
        Self {
            input_size: default_antispoof_size(),
            crop_scale: default_crop_scale(),
            live_threshold: default_live_threshold(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationConfig {
    pub metric: DistanceMetric,
    /// Replaces the calibrated threshold for the model/metric pair.
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default = "default_steepness")]
    pub confidence_steepness: f64,
}

fn default_steepness() -> f64 { ConfidenceCurve::default().steepness }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentityConfig {
    /// File holding the shared session-signing secret.
    pub secret_path: PathBuf,
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
}

fn default_leeway() -> u64 { 30 }

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
    #[serde(default = "default_max_request")]
    pub max_request_bytes: usize,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_max_request() -> usize { 16 * 1024 * 1024 }
fn default_read_timeout() -> u64 { 10 }

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            max_request_bytes: default_max_request(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerformanceConfig {
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u32,
}

fn default_optimization_level() -> u32 { 3 }

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { optimization_level: default_optimization_level() }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceAuthError::Config(format!(
                "Config file not found: {}. Please create it from the example.", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| FaceAuthError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.detector.input_width == 0 || self.detector.input_width > 4096 {
            return Err(FaceAuthError::Config(format!(
                "Detector input width must be between 1 and 4096, got {}",
                self.detector.input_width
            )));
        }
        if self.detector.input_height == 0 || self.detector.input_height > 4096 {
            return Err(FaceAuthError::Config(format!(
                "Detector input height must be between 1 and 4096, got {}",
                self.detector.input_height
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.detection_confidence) {
            return Err(FaceAuthError::Config(format!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detector.detection_confidence
            )));
        }

        if self.recognizer.input_size == 0 || self.recognizer.input_size > 1024 {
            return Err(FaceAuthError::Config(format!(
                "Recognizer input size must be between 1 and 1024, got {}",
                self.recognizer.input_size
            )));
        }
        if self.recognizer.normalization_std <= 0.0 {
            return Err(FaceAuthError::Config(format!(
                "Recognizer normalization std must be positive, got {}",
                self.recognizer.normalization_std
            )));
        }

        if self.antispoof.input_size == 0 || self.antispoof.input_size > 1024 {
            return Err(FaceAuthError::Config(format!(
                "Anti-spoof input size must be between 1 and 1024, got {}",
                self.antispoof.input_size
            )));
        }
        if self.antispoof.crop_scale < 1.0 {
            return Err(FaceAuthError::Config(format!(
                "Anti-spoof crop scale must be at least 1.0, got {}",
                self.antispoof.crop_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.antispoof.live_threshold) {
            return Err(FaceAuthError::Config(format!(
                "Anti-spoof live threshold must be between 0.0 and 1.0, got {}",
                self.antispoof.live_threshold
            )));
        }

        if self.service.max_request_bytes < 1024 {
            return Err(FaceAuthError::Config(format!(
                "Service max request size must be at least 1024 bytes, got {}",
                self.service.max_request_bytes
            )));
        }

        // Surfaces threshold/steepness errors at load time rather than first request.
        self.model_config()?;
        Ok(())
    }

    /// Decision configuration for the verification engine.
    pub fn model_config(&self) -> Result<ModelConfig> {
        let mut model = ModelConfig::calibrated(self.recognizer.model, self.verification.metric)
            .with_confidence(ConfidenceCurve {
                steepness: self.verification.confidence_steepness,
            })?;
        if let Some(threshold) = self.verification.threshold {
            model = model.with_threshold(threshold)?;
        }
        Ok(model)
    }

    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            model: self.recognizer.model,
            detector_backend: self.detector.backend.clone(),
        }
    }
}
