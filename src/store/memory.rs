//! In-memory embedding store.
//!
//! A `HashMap` behind a `RwLock`. Records live for the process lifetime.
//! Writes replace whole records under the write lock, so readers never see
//! a partial entry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{EmbeddingRecord, Sentence};
use crate::Result;
use super::EmbeddingStore;

/// Process-lifetime embedding store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<Sentence, EmbeddingRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored sentence, sorted.
    pub fn sentences(&self) -> Vec<Sentence> {
        let mut keys: Vec<Sentence> = self.records.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl EmbeddingStore for MemoryStore {
    async fn get(&self, sentence: &Sentence) -> Result<Option<EmbeddingRecord>> {
        Ok(self.records.read().get(sentence).cloned())
    }

    async fn put(&self, record: EmbeddingRecord) -> Result<()> {
        self.records.write().insert(record.sentence.clone(), record);
        Ok(())
    }

    async fn remove(&self, sentence: &Sentence) -> Result<bool> {
        Ok(self.records.write().remove(sentence).is_some())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Embedding;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = MemoryStore::new();
        let key = Sentence::from("The doctor is a man");
        assert!(store.get(&key).await.unwrap().is_none());

        store
            .put(EmbeddingRecord::new(key.clone(), "m", Embedding::new(vec![1.0, 0.0])))
            .await
            .unwrap();
        store
            .put(EmbeddingRecord::new(key.clone(), "m", Embedding::new(vec![0.0, 1.0])))
            .await
            .unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.vector.as_slice(), &[0.0, 1.0]);
        assert!(store.remove(&key).await.unwrap());
        assert!(store.is_empty().await.unwrap());
    }
}
