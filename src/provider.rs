//! # Embedding Provider
//!
//! The external service that turns text into vectors. Calls are fallible
//! and metered, so nothing outside [`EmbeddingCache`](crate::cache::EmbeddingCache)
//! should call a provider directly.
//!
//! Transport, authentication and retry policy belong to the implementation.
//! A failed call should come back as `Error::ProviderUnavailable`.

use async_trait::async_trait;

use crate::Result;

/// Text-to-vector provider contract.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the model producing the vectors. Stored alongside
    /// every cached vector.
    fn model_name(&self) -> &str;

    /// Largest batch accepted by `embed_bulk`.
    fn max_batch_size(&self) -> usize {
        2048
    }

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch. Output order must match input order.
    ///
    /// Default: one `embed` call per text.
    async fn embed_bulk(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
