//! # Embedding Store
//!
//! The persistence contract behind the embedding cache: one durable record
//! per sentence, point lookups by exact sentence string, safe overwrite.
//! Generation and aggregation never see the backend.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | Process-lifetime map for tests and one-off runs |
//! | `FileStore` | `file` | One JSON file per sentence in a directory |

pub mod memory;
pub mod file;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{EmbeddingRecord, Sentence};
use crate::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

// ============================================================================
// Store configuration
// ============================================================================

/// Which store backs the cache.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-memory (no persistence)
    #[default]
    Memory,

    /// One file per sentence under `path`
    Directory { path: PathBuf },
}

impl StoreConfig {
    /// Open the configured store.
    pub async fn open(&self) -> Result<Arc<dyn EmbeddingStore>> {
        Ok(match self {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::Directory { path } => Arc::new(FileStore::open(path).await?),
        })
    }
}

// ============================================================================
// EmbeddingStore trait
// ============================================================================

/// Key-value contract keyed by the exact sentence string.
///
/// `get` distinguishes three outcomes: `Ok(Some)` for a readable record,
/// `Ok(None)` for a genuine miss, and `Err(Error::CacheCorruption)` for an
/// entry that exists but cannot be read. Writers must publish complete
/// records only: a concurrent reader sees the old record or the new one.
#[async_trait]
pub trait EmbeddingStore: Send + Sync + 'static {
    /// Look up a record by sentence.
    async fn get(&self, sentence: &Sentence) -> Result<Option<EmbeddingRecord>>;

    /// Insert or overwrite the record for `record.sentence`.
    async fn put(&self, record: EmbeddingRecord) -> Result<()>;

    /// Remove a record. Returns true if it existed.
    async fn remove(&self, sentence: &Sentence) -> Result<bool>;

    /// Number of stored records.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait]
impl<S: EmbeddingStore + ?Sized> EmbeddingStore for Arc<S> {
    async fn get(&self, sentence: &Sentence) -> Result<Option<EmbeddingRecord>> {
        (**self).get(sentence).await
    }

    async fn put(&self, record: EmbeddingRecord) -> Result<()> {
        (**self).put(record).await
    }

    async fn remove(&self, sentence: &Sentence) -> Result<bool> {
        (**self).remove(sentence).await
    }

    async fn len(&self) -> Result<usize> {
        (**self).len().await
    }
}
