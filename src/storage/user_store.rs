use crate::common::{DevMode, FaceAuthError, Result};
use crate::core::recognizer::Embedding;
use crate::identity::Identity;
use crate::storage::EmbeddingStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const STORAGE_VERSION: u32 = 1;

/// One record per identity. Fields this crate does not know about are kept
/// as-is across upserts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(default)]
    pub version: u32,
    pub identity: String,
    #[serde(default)]
    pub face_embedding: Option<Embedding>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserDocument {
    pub fn new(identity: &Identity) -> Self {
        Self {
            version: STORAGE_VERSION,
            identity: identity.to_string(),
            face_embedding: None,
            updated_at: None,
            extra: serde_json::Map::new(),
        }
    }

    /// The stored embedding, if the record has a usable one.
    pub fn embedding(&self) -> Option<&Embedding> {
        self.face_embedding.as_ref().filter(|e| !e.is_empty())
    }

    pub fn set_embedding(&mut self, embedding: &[f32]) {
        self.version = STORAGE_VERSION;
        self.face_embedding = Some(embedding.to_vec());
        self.updated_at = Some(Utc::now());
    }
}

/// JSON documents on disk, one file per identity named by the SHA-256 of the
/// identity. Writes go to a temporary sibling and are renamed into place.
pub struct FileEmbeddingStore {
    data_dir: PathBuf,
}

impl FileEmbeddingStore {
    pub fn new_with_paths(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).map_err(|e| {
            FaceAuthError::StoreUnavailable(format!(
                "Failed to create {}: {}", data_dir.display(), e
            ))
        })?;

        Ok(Self { data_dir })
    }

    pub fn new_with_dev_mode(dev_mode: &DevMode) -> Result<Self> {
        let data_dir = dev_mode.data_dir();
        if dev_mode.is_enabled() {
            tracing::debug!("Embedding store using dev directory: {:?}", data_dir);
        }
        Self::new_with_paths(data_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn document_path(&self, identity: &Identity) -> PathBuf {
        let digest = Sha256::digest(identity.as_str().as_bytes());
        let name: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        self.data_dir.join(format!("{}.json", name))
    }

    /// Reads the whole record. `Ok(None)` when the identity has no file.
    pub fn load_document(&self, identity: &Identity) -> Result<Option<UserDocument>> {
        let path = self.document_path(identity);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FaceAuthError::StoreUnavailable(format!(
                    "Failed to read {}: {}", path.display(), e
                )))
            }
        };

        let document: UserDocument = serde_json::from_slice(&data).map_err(|e| {
            FaceAuthError::StoreUnavailable(format!("Corrupt document {}: {}", path.display(), e))
        })?;

        if document.identity != identity.as_str() {
            return Err(FaceAuthError::StoreUnavailable(format!(
                "Document {} belongs to a different identity", path.display()
            )));
        }

        Ok(Some(document))
    }

    pub fn save_document(&self, document: &UserDocument) -> Result<()> {
        let identity = Identity::parse(document.identity.as_str())
            .ok_or_else(|| FaceAuthError::StoreUnavailable("Document has a blank identity".into()))?;
        let path = self.document_path(&identity);

        let encoded = serde_json::to_vec_pretty(document)
            .map_err(|e| FaceAuthError::StoreUnavailable(format!("Failed to serialize: {}", e)))?;

        let unavailable = |e: std::io::Error| {
            FaceAuthError::StoreUnavailable(format!("Failed to write {}: {}", path.display(), e))
        };

        let mut tmp = NamedTempFile::new_in(&self.data_dir).map_err(unavailable)?;
        {
            let file = tmp.as_file_mut();
            file.write_all(&encoded).map_err(unavailable)?;
            file.sync_all().map_err(unavailable)?;
        }

        // Dropping an unpersisted temp file removes it
        tmp.persist(&path).map_err(|err| unavailable(err.error))?;
        Ok(())
    }
}

impl EmbeddingStore for FileEmbeddingStore {
    fn get(&self, identity: &Identity) -> Result<Embedding> {
        self.load_document(identity)?
            .and_then(|doc| doc.embedding().cloned())
            .ok_or_else(|| FaceAuthError::NotFound(identity.to_string()))
    }

    fn upsert(&self, identity: &Identity, embedding: &[f32]) -> Result<()> {
        let mut document = self
            .load_document(identity)?
            .unwrap_or_else(|| UserDocument::new(identity));
        document.set_embedding(embedding);
        self.save_document(&document)?;

        tracing::debug!("Stored {}-dim embedding for {}", embedding.len(), identity);
        Ok(())
    }
}
