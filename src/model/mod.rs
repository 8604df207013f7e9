//! # Experiment Data Model
//!
//! Plain DTOs shared by generation, caching, aggregation and export.
//!
//! Design rule: no I/O, no provider types, no async here.

pub mod group;
pub mod sentence;
pub mod embedding;

pub use group::{Agreement, Group};
pub use sentence::{ComparisonTuple, Sentence, SentenceRecord};
pub use embedding::{Embedding, EmbeddingRecord, StatKey};
