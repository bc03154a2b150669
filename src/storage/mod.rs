pub mod memory;
pub mod user_store;

use crate::common::Result;
use crate::core::recognizer::Embedding;
use crate::identity::Identity;
use std::sync::Arc;

pub use memory::MemoryEmbeddingStore;
pub use user_store::{FileEmbeddingStore, UserDocument};

/// Persistent identity → embedding mapping.
///
/// `get` fails with `NotFound` whether the identity has no record at all or a
/// record without an embedding. `upsert` replaces the embedding and leaves
/// every other field of the record alone.
pub trait EmbeddingStore {
    fn get(&self, identity: &Identity) -> Result<Embedding>;
    fn upsert(&self, identity: &Identity, embedding: &[f32]) -> Result<()>;
}

impl<T: EmbeddingStore + ?Sized> EmbeddingStore for &T {
    fn get(&self, identity: &Identity) -> Result<Embedding> {
        (**self).get(identity)
    }

    fn upsert(&self, identity: &Identity, embedding: &[f32]) -> Result<()> {
        (**self).upsert(identity, embedding)
    }
}

impl<T: EmbeddingStore + ?Sized> EmbeddingStore for Arc<T> {
    fn get(&self, identity: &Identity) -> Result<Embedding> {
        (**self).get(identity)
    }

    fn upsert(&self, identity: &Identity, embedding: &[f32]) -> Result<()> {
        (**self).upsert(identity, embedding)
    }
}
