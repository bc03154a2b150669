use crate::common::{FaceAuthError, Result};
use crate::core::recognizer::Embedding;
use crate::identity::Identity;
use crate::storage::{EmbeddingStore, UserDocument};
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-local store for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryEmbeddingStore {
    documents: RwLock<HashMap<String, UserDocument>>,
}

impl MemoryEmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a whole record, e.g. one created elsewhere without an embedding.
    pub fn insert_document(&self, document: UserDocument) -> Result<()> {
        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        documents.insert(document.identity.clone(), document);
        Ok(())
    }

    pub fn document(&self, identity: &Identity) -> Result<Option<UserDocument>> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents.get(identity.as_str()).cloned())
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EmbeddingStore for MemoryEmbeddingStore {
    fn get(&self, identity: &Identity) -> Result<Embedding> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        documents
            .get(identity.as_str())
            .and_then(|doc| doc.embedding().cloned())
            .ok_or_else(|| FaceAuthError::NotFound(identity.to_string()))
    }

    fn upsert(&self, identity: &Identity, embedding: &[f32]) -> Result<()> {
        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        documents
            .entry(identity.to_string())
            .or_insert_with(|| UserDocument::new(identity))
            .set_embedding(embedding);
        Ok(())
    }
}

fn poisoned() -> FaceAuthError {
    FaceAuthError::StoreUnavailable("Embedding store lock poisoned".into())
}
