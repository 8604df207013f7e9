//! Directory-backed embedding store.
//!
//! One JSON file per sentence, named by the xxHash64 of the sentence text.
//! The name has a fixed length whatever the sentence length. The record
//! keeps the full sentence, so two sentences sharing a hash show up as a
//! key mismatch on read.
//!
//! ```text
//! <dir>/<xxh64(sentence) as 16 hex digits>.json
//! ```
//!
//! Writes go to a temporary file in the same directory and are renamed
//! into place, so a reader sees either the previous record or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};
use xxhash_rust::xxh64::xxh64;

use crate::model::{EmbeddingRecord, Sentence};
use crate::{Error, Result};
use super::EmbeddingStore;

const RECORD_EXTENSION: &str = "json";

/// Embedding store persisted as one file per sentence.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    next_tmp: AtomicU64,
}

impl FileStore {
    /// Open (and create if needed) a store directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "opened embedding store");
        Ok(Self {
            dir,
            next_tmp: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `sentence`.
    pub fn record_path(&self, sentence: &Sentence) -> PathBuf {
        self.dir.join(format!("{}.{RECORD_EXTENSION}", encode_name(sentence.as_str())))
    }

    fn tmp_path(&self, final_path: &Path) -> PathBuf {
        let n = self.next_tmp.fetch_add(1, Ordering::Relaxed);
        let mut name = final_path
            .file_name()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        name.push(format!(".tmp-{}-{n}", std::process::id()));
        final_path.with_file_name(name)
    }
}

#[async_trait]
impl EmbeddingStore for FileStore {
    async fn get(&self, sentence: &Sentence) -> Result<Option<EmbeddingRecord>> {
        let path = self.record_path(sentence);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache entry");
                return Err(Error::CacheCorruption {
                    sentence: sentence.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            warn!(path = %path.display(), error = %e, "undecodable cache entry");
            Error::CacheCorruption {
                sentence: sentence.to_string(),
                reason: e.to_string(),
            }
        })
    }

    async fn put(&self, record: EmbeddingRecord) -> Result<()> {
        let path = self.record_path(&record.sentence);
        let tmp = self.tmp_path(&path);
        let bytes = serde_json::to_vec(&record)?;

        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, sentence: &Sentence) -> Result<bool> {
        match tokio::fs::remove_file(self.record_path(sentence)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn len(&self) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn encode_name(sentence: &str) -> String {
    format!("{:016x}", xxh64(sentence.as_bytes(), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Embedding;

    #[test]
    fn test_encode_name() {
        assert_eq!(encode_name("The doctor"), encode_name("The doctor"));
        assert_eq!(encode_name("").len(), 16);
        assert_ne!(encode_name("a/b"), encode_name("a_b"));
        assert!(encode_name("a/b").chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_long_sentence_is_a_miss_then_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let key = Sentence::new(
            "The scientist asked everyone in the crowded lecture hall to not interrupt them ".repeat(3),
        );
        assert!(key.as_str().len() > 200);

        assert!(store.get(&key).await.unwrap().is_none());
        store
            .put(EmbeddingRecord::new(key.clone(), "m", Embedding::new(vec![0.5, 1.5])))
            .await
            .unwrap();
        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.sentence, key);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_record_under_wrong_name_keeps_its_sentence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let stored = Sentence::from("The nurse is a woman");
        let other = Sentence::from("The nurse is a man");
        let record = EmbeddingRecord::new(stored.clone(), "m", Embedding::new(vec![1.0]));
        std::fs::write(store.record_path(&other), serde_json::to_vec(&record).unwrap()).unwrap();

        let read = store.get(&other).await.unwrap().unwrap();
        assert!(read.integrity_problem(&other).is_some());
    }

    #[tokio::test]
    async fn test_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let key = Sentence::from("The nurse is someone's daughter");

        assert!(store.get(&key).await.unwrap().is_none());
        store
            .put(EmbeddingRecord::new(key.clone(), "m", Embedding::new(vec![0.5, -0.5])))
            .await
            .unwrap();
        store
            .put(EmbeddingRecord::new(key.clone(), "m", Embedding::new(vec![0.25, 0.75])))
            .await
            .unwrap();

        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.sentence, key);
        assert_eq!(record.vector.as_slice(), &[0.25, 0.75]);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let key = Sentence::from("The artist called his friend");
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store
                .put(EmbeddingRecord::new(key.clone(), "m", Embedding::new(vec![1.0])))
                .await
                .unwrap();
        }
        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert!(reopened.get(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_garbage_file_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let key = Sentence::from("The lawyer is a boy");
        std::fs::write(store.record_path(&key), b"not json").unwrap();

        let err = store.get(&key).await.unwrap_err();
        assert!(matches!(err, Error::CacheCorruption { .. }));
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let key = Sentence::from("x");
        assert!(!store.remove(&key).await.unwrap());
        store
            .put(EmbeddingRecord::new(key.clone(), "m", Embedding::new(vec![1.0])))
            .await
            .unwrap();
        assert!(store.remove(&key).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
