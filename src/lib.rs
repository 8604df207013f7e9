//! # embedding-bias: Representational Bias in Sentence Embeddings
//!
//! Generates matched sentences that differ only in a gendered or neutral
//! attribute, embeds them through a cached provider, and aggregates the
//! vectors into cosine and WEAT-style statistics.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `EmbeddingProvider` and `EmbeddingStore` are the seams to the outside world
//! 2. **Clean DTOs**: `Sentence`, `Embedding`, `SentenceRecord` cross all boundaries
//! 3. **Generation owns nothing**: catalog + templates → sentences is a pure function
//! 4. **Every provider call goes through the cache**: a stored sentence is never re-embedded
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use embedding_bias::{Group, TemplateEngine};
//!
//! # fn example() -> embedding_bias::Result<()> {
//! let engine = TemplateEngine::gendered_terms()?;
//! let nouns = engine.catalog().nouns().to_vec();
//!
//! let male = engine.generate(&Group::Male, &nouns)?;
//! let tuples = engine.generate_comparison_tuples(&nouns)?;
//! assert_eq!(male.len(), tuples.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! | Store | Config | Description |
//! |-------|--------|-------------|
//! | Memory | `StoreConfig::Memory` | Process-lifetime map |
//! | File | `StoreConfig::Directory` | One JSON record per sentence |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod catalog;
pub mod template;
pub mod provider;
pub mod store;
pub mod cache;
pub mod aggregate;
pub mod export;
pub mod config;
pub mod experiment;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Agreement, ComparisonTuple, Embedding, EmbeddingRecord, Group, Sentence, SentenceRecord,
    StatKey,
};

// ============================================================================
// Re-exports: Generation
// ============================================================================

pub use catalog::{AttributeCatalog, CatalogBuilder, top_n};
pub use template::{SentenceTemplate, SlotRole, TemplateEngine};

// ============================================================================
// Re-exports: Embedding
// ============================================================================

pub use provider::EmbeddingProvider;
pub use store::{EmbeddingStore, FileStore, MemoryStore, StoreConfig};
pub use cache::{BulkOutcome, CacheStats, EmbeddingCache, SentenceFailure};

// ============================================================================
// Re-exports: Statistics and orchestration
// ============================================================================

pub use aggregate::{
    GroupMeans, cosine_similarity, group_mean, mean_vector, weat_differential, weat_score,
};
pub use config::ExperimentConfig;
pub use experiment::{BiasExperiment, ComparisonReport, OccupationStudy, StudyReport};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Configuration time: abort generation.
    #[error("Invalid group: {0}")]
    InvalidGroup(String),

    #[error("Catalog consistency error: {0}")]
    CatalogConsistency(String),

    #[error("Template binding error: {0}")]
    TemplateBinding(String),

    // Runtime, per sentence: reported and excluded from aggregation.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Corrupt cache entry for {sentence:?}: {reason}")]
    CacheCorruption { sentence: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cancelled before dispatch")]
    Cancelled,

    // Statistical preconditions: fatal to the statistic being computed.
    #[error("Empty group: {0}")]
    EmptyGroup(String),

    #[error("Dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Zero-norm vector in cosine similarity")]
    ZeroVector,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Broken catalog or template definitions.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidGroup(_)
                | Error::CatalogConsistency(_)
                | Error::TemplateBinding(_)
                | Error::Config(_)
        )
    }

    /// Failures scoped to a single sentence's embedding.
    pub fn is_per_sentence(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable(_)
                | Error::CacheCorruption { .. }
                | Error::Storage(_)
                | Error::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
