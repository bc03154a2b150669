pub mod analyzer;
pub mod auth;
pub mod detector;
pub mod engine;
pub mod gateway;
pub mod liveness;
pub mod model;
mod onnx;
pub mod recognizer;

pub use analyzer::OnnxFaceAnalyzer;
pub use auth::{FaceUpload, FaceVerifier, Stage};
pub use detector::{FaceBox, FaceDetector};
pub use engine::{decide, distance, VerificationOutcome};
pub use gateway::{AnalyzeOptions, DetectedFace, ExtractionGateway, ExtractionSettings, FaceAnalyzer};
pub use model::{calibrated_threshold, ConfidenceCurve, DistanceMetric, ModelConfig, RecognitionModel};
pub use recognizer::{Embedding, FaceRecognizer};
