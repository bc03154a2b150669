use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceAuthError {
    #[error("Session token is missing")]
    MissingSession,

    #[error("Invalid session")]
    InvalidSession,

    #[error("No face embedding found for identity: {0}")]
    NotFound(String),

    #[error("Face image is missing")]
    MissingImage,

    #[error("Uploaded file is not an image (content type: {0:?})")]
    NotAnImage(String),

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Multiple faces detected: {0}")]
    MultipleFacesDetected(usize),

    #[error("Spoof detected")]
    SpoofDetected,

    #[error("Embedding extraction failed: {0}")]
    EmbeddingExtractionFailed(String),

    #[error("Embedding store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Embedding dimension mismatch: probe has {probe}, reference has {reference}")]
    DimensionMismatch { probe: usize, reference: usize },

    #[error("Service returned {kind:?}: {message}")]
    Service { kind: ErrorKind, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::OrtError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FaceAuthError>;

/// Wire-level error kind. Internal failures collapse to `Internal` before
/// they leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingSession,
    InvalidSession,
    NotFound,
    MissingImage,
    NotAnImage,
    NoFaceDetected,
    MultipleFacesDetected,
    SpoofDetected,
    EmbeddingExtractionFailed,
    StoreUnavailable,
    Internal,
}

/// How a failure is logged and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller can fix the input; reported verbatim, logged without identifiers.
    ClientInput,
    /// Reported, but logged with the triggering identifier.
    Diagnostic,
    /// Logged in full, reported as a generic failure.
    Internal,
}

impl ErrorKind {
    pub fn class(self) -> ErrorClass {
        match self {
            ErrorKind::MissingSession
            | ErrorKind::MissingImage
            | ErrorKind::NotAnImage
            | ErrorKind::NoFaceDetected
            | ErrorKind::MultipleFacesDetected
            | ErrorKind::SpoofDetected => ErrorClass::ClientInput,
            ErrorKind::InvalidSession | ErrorKind::NotFound => ErrorClass::Diagnostic,
            ErrorKind::EmbeddingExtractionFailed
            | ErrorKind::StoreUnavailable
            | ErrorKind::Internal => ErrorClass::Internal,
        }
    }

    /// Message safe to hand back to the caller.
    pub fn public_message(self) -> &'static str {
        match self {
            ErrorKind::MissingSession => "Session token is missing.",
            ErrorKind::InvalidSession => "Invalid session.",
            ErrorKind::NotFound => "No face embedding found for the user.",
            ErrorKind::MissingImage => "Face image is missing.",
            ErrorKind::NotAnImage => "File must be an image.",
            ErrorKind::NoFaceDetected => "No face detected in the image.",
            ErrorKind::MultipleFacesDetected => "Multiple faces detected in the image.",
            ErrorKind::SpoofDetected => "Spoof detected in the given image.",
            ErrorKind::EmbeddingExtractionFailed
            | ErrorKind::StoreUnavailable
            | ErrorKind::Internal => "An unexpected error occurred.",
        }
    }

    /// The kind as the caller sees it.
    pub fn public(self) -> ErrorKind {
        match self.class() {
            ErrorClass::Internal => ErrorKind::Internal,
            _ => self,
        }
    }
}

impl FaceAuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FaceAuthError::MissingSession => ErrorKind::MissingSession,
            FaceAuthError::InvalidSession => ErrorKind::InvalidSession,
            FaceAuthError::NotFound(_) => ErrorKind::NotFound,
            FaceAuthError::MissingImage => ErrorKind::MissingImage,
            FaceAuthError::NotAnImage(_) => ErrorKind::NotAnImage,
            FaceAuthError::NoFaceDetected => ErrorKind::NoFaceDetected,
            FaceAuthError::MultipleFacesDetected(_) => ErrorKind::MultipleFacesDetected,
            FaceAuthError::SpoofDetected => ErrorKind::SpoofDetected,
            FaceAuthError::EmbeddingExtractionFailed(_) => ErrorKind::EmbeddingExtractionFailed,
            FaceAuthError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            FaceAuthError::Service { kind, .. } => *kind,
            FaceAuthError::DimensionMismatch { .. }
            | FaceAuthError::Config(_)
            | FaceAuthError::Model(_)
            | FaceAuthError::Io(_)
            | FaceAuthError::Image(_)
            | FaceAuthError::Ort(_)
            | FaceAuthError::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind().class()
    }

    /// True for the outcomes the extraction gateway is allowed to report
    /// as-is. Everything else an analyzer returns is an extraction failure.
    pub fn is_extraction_outcome(&self) -> bool {
        matches!(
            self,
            FaceAuthError::NoFaceDetected
                | FaceAuthError::MultipleFacesDetected(_)
                | FaceAuthError::SpoofDetected
                | FaceAuthError::EmbeddingExtractionFailed(_)
        )
    }
}
