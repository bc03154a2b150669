//! Enrollment and verification flows.
//!
//! Each call walks the same stages in order and stops at the first failure:
//! nothing is written to the store unless every earlier stage succeeded.

use crate::common::{FaceAuthError, Result};
use crate::core::engine::{self, VerificationOutcome};
use crate::core::gateway::{ExtractionGateway, FaceAnalyzer};
use crate::core::model::ModelConfig;
use crate::core::recognizer::Embedding;
use crate::identity::{Identity, IdentityProvider, IdentityResolver};
use crate::storage::EmbeddingStore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An uploaded face image as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FaceUpload {
    pub fn new(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingSession,
    IdentityResolved,
    PreconditionsChecked,
    ExtractionComplete,
    Decided,
    Stored,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AwaitingSession => "awaiting-session",
            Stage::IdentityResolved => "identity-resolved",
            Stage::PreconditionsChecked => "preconditions-checked",
            Stage::ExtractionComplete => "extraction-complete",
            Stage::Decided => "decided",
            Stage::Stored => "stored",
        };
        f.write_str(name)
    }
}

pub struct FaceVerifier<R, S, A> {
    resolver: IdentityResolver<R>,
    store: S,
    gateway: ExtractionGateway<A>,
    model: ModelConfig,
}

impl<R, S, A> FaceVerifier<R, S, A>
where
    R: IdentityProvider,
    S: EmbeddingStore,
    A: FaceAnalyzer,
{
    pub fn new(
        resolver: IdentityResolver<R>,
        store: S,
        gateway: ExtractionGateway<A>,
        model: ModelConfig,
    ) -> Self {
        Self {
            resolver,
            store,
            gateway,
            model,
        }
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Replaces the caller's reference embedding with one taken from `upload`.
    pub fn enroll(&self, session: Option<&str>, upload: Option<&FaceUpload>) -> Result<Identity> {
        trace_stage("enroll", Stage::AwaitingSession);
        let identity = self.resolver.resolve(session)?;
        trace_stage("enroll", Stage::IdentityResolved);

        let image = validate_upload(upload)?;
        trace_stage("enroll", Stage::PreconditionsChecked);

        let embedding = self.gateway.extract(image, true)?;
        trace_stage("enroll", Stage::ExtractionComplete);

        self.store.upsert(&identity, &embedding)?;
        trace_stage("enroll", Stage::Stored);

        tracing::info!("Enrolled face for {}", identity);
        Ok(identity)
    }

    /// Compares the face in `upload` with the caller's reference embedding.
    pub fn verify(
        &self,
        session: Option<&str>,
        upload: Option<&FaceUpload>,
    ) -> Result<VerificationOutcome> {
        trace_stage("verify", Stage::AwaitingSession);
        let identity = self.resolver.resolve(session)?;
        trace_stage("verify", Stage::IdentityResolved);

        // An unenrolled identity fails here, before any image work.
        let reference = self.store.get(&identity)?;
        let image = validate_upload(upload)?;
        trace_stage("verify", Stage::PreconditionsChecked);

        let probe = self.gateway.extract(image, true)?;
        trace_stage("verify", Stage::ExtractionComplete);

        let outcome = engine::decide(&probe, &reference, &self.model)?;
        trace_stage("verify", Stage::Decided);

        tracing::info!(
            "Verification for {}: verified={} distance={:.4} threshold={:.4} confidence={:.1}",
            identity,
            outcome.verified,
            outcome.distance,
            outcome.threshold,
            outcome.confidence
        );
        Ok(outcome)
    }

    pub fn fetch_embedding(&self, session: Option<&str>) -> Result<Embedding> {
        let identity = self.resolver.resolve(session)?;
        self.store.get(&identity)
    }
}

fn trace_stage(flow: &str, stage: Stage) {
    tracing::debug!("{}: {}", flow, stage);
}

fn validate_upload(upload: Option<&FaceUpload>) -> Result<&[u8]> {
    let upload = match upload {
        Some(upload) if !upload.bytes.is_empty() => upload,
        _ => return Err(FaceAuthError::MissingImage),
    };

    if !upload.content_type.trim().to_ascii_lowercase().starts_with("image/") {
        return Err(FaceAuthError::NotAnImage(upload.content_type.clone()));
    }

    Ok(&upload.bytes)
}
