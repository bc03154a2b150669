// Core modules
pub mod cli;
pub mod common;
pub mod core;
pub mod identity;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use common::{Config, DevMode, ErrorClass, ErrorKind, FaceAuthError, Result};
pub use core::{
    decide, DetectedFace, DistanceMetric, Embedding, ExtractionGateway, ExtractionSettings,
    FaceAnalyzer, FaceUpload, FaceVerifier, ModelConfig, OnnxFaceAnalyzer, RecognitionModel,
    VerificationOutcome,
};
pub use identity::{Identity, IdentityProvider, IdentityResolver, SessionRejection, SignedSessionProvider};
pub use service::ServiceClient;
pub use storage::{EmbeddingStore, FileEmbeddingStore, MemoryEmbeddingStore};
