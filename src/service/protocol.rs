use crate::common::{ErrorKind, FaceAuthError, Result};
use crate::core::auth::FaceUpload;
use crate::core::engine::VerificationOutcome;
use crate::core::recognizer::Embedding;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Frames larger than this are refused by the client.
pub const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

// Request types
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Request {
    Health,
    Enroll(EnrollRequest),
    Verify(VerifyRequest),
    FetchEmbedding(FetchEmbeddingRequest),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnrollRequest {
    pub session: Option<String>,
    pub image: Option<FaceUpload>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VerifyRequest {
    pub session: Option<String>,
    pub image: Option<FaceUpload>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FetchEmbeddingRequest {
    pub session: Option<String>,
}

impl Request {
    /// Session token carried by the request, used to fingerprint failures.
    pub fn session(&self) -> Option<&str> {
        match self {
            Request::Health => None,
            Request::Enroll(req) => req.session.as_deref(),
            Request::Verify(req) => req.session.as_deref(),
            Request::FetchEmbedding(req) => req.session.as_deref(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Request::Health => "health",
            Request::Enroll(_) => "enroll",
            Request::Verify(_) => "verify",
            Request::FetchEmbedding(_) => "fetch-embedding",
        }
    }
}

// Response types
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Response {
    Healthy(HealthStatus),
    Enrolled,
    Verified(VerificationOutcome),
    Embedding(Embedding),
    Error(ErrorResponse),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub version: String,
    pub model: String,
    pub metric: String,
    pub threshold: f64,
}

/// Only public kinds and messages ever cross the socket.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorResponse {
    pub fn from_kind(kind: ErrorKind) -> Self {
        let kind = kind.public();
        Self {
            kind,
            message: kind.public_message().to_string(),
        }
    }
}

impl From<ErrorResponse> for FaceAuthError {
    fn from(err: ErrorResponse) -> Self {
        FaceAuthError::Service {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Writes `message` as a u32 little-endian length followed by its bincode body.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let data = bincode::serialize(message)
        .map_err(|e| anyhow::anyhow!("Failed to serialize message: {}", e))?;
    let len = u32::try_from(data.len())
        .map_err(|_| anyhow::anyhow!("Message too large: {} bytes", data.len()))?;

    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R, max_bytes: usize) -> Result<T> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > max_bytes {
        return Err(anyhow::anyhow!("Message too large: {} bytes (limit {})", len, max_bytes).into());
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    let message = bincode::deserialize(&buf)
        .map_err(|e| anyhow::anyhow!("Failed to deserialize message: {}", e))?;
    Ok(message)
}
