//! Shared test doubles for the embedding provider.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use embedding_bias::{EmbeddingProvider, Error, Result};

pub const MODEL: &str = "test-embedding-8";

/// Deterministic 8-dimensional embedding: a byte histogram bucketed by
/// `byte % 8`, offset by one so no vector is zero.
pub fn histogram_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![1.0f32; 8];
    for b in text.bytes() {
        v[(b % 8) as usize] += 1.0;
    }
    v
}

/// Provider that records every call and can be told to fail.
pub struct CountingProvider {
    pub model: String,
    pub max_batch: usize,
    pub single_calls: AtomicUsize,
    pub bulk_calls: AtomicUsize,
    pub embedded_texts: Mutex<Vec<String>>,
    pub batch_sizes: Mutex<Vec<usize>>,
    /// Any batch (or single call) containing a text with this substring fails.
    pub fail_on: Mutex<Option<String>>,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self::with_max_batch(2048)
    }

    pub fn with_max_batch(max_batch: usize) -> Self {
        Self {
            model: MODEL.to_string(),
            max_batch,
            single_calls: AtomicUsize::new(0),
            bulk_calls: AtomicUsize::new(0),
            embedded_texts: Mutex::new(Vec::new()),
            batch_sizes: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
        }
    }

    pub fn failing_on(self, needle: &str) -> Self {
        *self.fail_on.lock() = Some(needle.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst) + self.bulk_calls.load(Ordering::SeqCst)
    }

    pub fn times_embedded(&self, text: &str) -> usize {
        self.embedded_texts.lock().iter().filter(|t| t.as_str() == text).count()
    }

    fn should_fail(&self, text: &str) -> bool {
        self.fail_on
            .lock()
            .as_deref()
            .is_some_and(|needle| text.contains(needle))
    }
}

#[async_trait]
impl EmbeddingProvider for CountingProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.should_fail(text) {
            return Err(Error::ProviderUnavailable(format!("quota exceeded for {text:?}")));
        }
        self.embedded_texts.lock().push(text.to_string());
        Ok(histogram_embedding(text))
    }

    async fn embed_bulk(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().push(texts.len());
        assert!(texts.len() <= self.max_batch, "batch exceeds provider maximum");
        if texts.iter().any(|t| self.should_fail(t)) {
            return Err(Error::ProviderUnavailable("network error".into()));
        }
        self.embedded_texts
            .lock()
            .extend(texts.iter().map(|t| t.to_string()));
        Ok(texts.iter().map(|t| histogram_embedding(t)).collect())
    }
}
