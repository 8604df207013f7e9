//! Embedding vectors and their persisted form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Group, Sentence};

/// A fixed-length embedding vector. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(vector: Vec<f32>) -> Self {
        Self(vector)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(vector: Vec<f32>) -> Self {
        Self(vector)
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// One durable cache entry: the vector plus the metadata needed to know
/// which model produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub sentence: Sentence,
    pub model: String,
    pub dimensions: usize,
    pub vector: Embedding,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    pub fn new(sentence: Sentence, model: impl Into<String>, vector: Embedding) -> Self {
        Self {
            sentence,
            model: model.into(),
            dimensions: vector.dimensions(),
            vector,
            created_at: Utc::now(),
        }
    }

    /// Structural check applied on every read. Returns the reason the
    /// record cannot be trusted for `key`, if any.
    pub fn integrity_problem(&self, key: &Sentence) -> Option<String> {
        if &self.sentence != key {
            return Some(format!("stored sentence {:?} does not match key", self.sentence.as_str()));
        }
        if self.dimensions != self.vector.dimensions() {
            return Some(format!(
                "declared {} dimensions but vector has {}",
                self.dimensions,
                self.vector.dimensions()
            ));
        }
        if self.vector.dimensions() == 0 {
            return Some("empty vector".to_string());
        }
        if self.vector.as_slice().iter().any(|x| !x.is_finite()) {
            return Some("non-finite component".to_string());
        }
        None
    }
}

/// Aggregation key: a group, optionally narrowed to one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatKey {
    pub group: Group,
    pub attribute: Option<String>,
}

impl StatKey {
    pub fn group(group: Group) -> Self {
        Self { group, attribute: None }
    }

    pub fn group_attribute(group: Group, attribute: impl Into<String>) -> Self {
        Self {
            group,
            attribute: Some(attribute.into()),
        }
    }
}

impl std::fmt::Display for StatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.attribute {
            Some(attribute) => write!(f, "({}, {})", self.group, attribute),
            None => write!(f, "({})", self.group),
        }
    }
}
