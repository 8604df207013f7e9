//! # Bias Aggregation
//!
//! Group means, cosine similarity and the WEAT-style differential score.
//!
//! All accumulation happens in `f64` in input order, so results are
//! reproducible for a given embedding set. Preconditions (non-empty sets,
//! equal dimensions, non-zero norms) fail the statistic being computed;
//! nothing is silently defaulted to zero.
//!
//! ```text
//! s(w, A, B)       = mean_{a∈A} cos(w, a) − mean_{b∈B} cos(w, b)
//! weat(X, Y, A, B) = mean_{x∈X} s(x, A, B) − mean_{y∈Y} s(y, A, B)
//! ```
//!
//! The score above is this system's definition. It is not the effect-size
//! statistic from the WEAT literature.

use hashbrown::HashMap;

use crate::model::{Embedding, StatKey};
use crate::{Error, Result};

// ============================================================================
// Means
// ============================================================================

/// Element-wise arithmetic mean of equally sized vectors.
pub fn mean_vector<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Embedding> {
    let first = vectors
        .first()
        .ok_or_else(|| Error::EmptyGroup("mean of an empty vector set".into()))?;
    let dim = first.as_ref().len();

    let mut sum = vec![0.0f64; dim];
    for v in vectors {
        let v = v.as_ref();
        if v.len() != dim {
            return Err(Error::DimensionMismatch { left: dim, right: v.len() });
        }
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += f64::from(*x);
        }
    }
    let n = vectors.len() as f64;
    Ok(Embedding::new(sum.into_iter().map(|s| (s / n) as f32).collect()))
}

/// Mean embedding per observed key.
#[derive(Debug, Clone, Default)]
pub struct GroupMeans {
    means: HashMap<StatKey, Embedding>,
    counts: HashMap<StatKey, usize>,
}

impl GroupMeans {
    /// Mean for `key`. A key with no members is an `EmptyGroup` error.
    pub fn get(&self, key: &StatKey) -> Result<&Embedding> {
        self.means
            .get(key)
            .ok_or_else(|| Error::EmptyGroup(format!("no embeddings for key {key}")))
    }

    /// Number of embeddings averaged into `key` (zero if unobserved).
    pub fn count(&self, key: &StatKey) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Observed keys, sorted.
    pub fn keys(&self) -> Vec<&StatKey> {
        let mut keys: Vec<&StatKey> = self.means.keys().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}

/// Group embeddings by key and average each group.
pub fn group_mean<I, V>(entries: I) -> Result<GroupMeans>
where
    I: IntoIterator<Item = (StatKey, V)>,
    V: AsRef<[f32]>,
{
    let mut grouped: HashMap<StatKey, Vec<V>> = HashMap::new();
    for (key, vector) in entries {
        grouped.entry(key).or_default().push(vector);
    }

    let mut out = GroupMeans::default();
    for (key, vectors) in grouped {
        let mean = mean_vector(&vectors)?;
        out.counts.insert(key.clone(), vectors.len());
        out.means.insert(key, mean);
    }
    Ok(out)
}

// ============================================================================
// Similarity
// ============================================================================

/// Normalized dot product in `[-1, 1]`.
pub fn cosine_similarity(u: &[f32], v: &[f32]) -> Result<f64> {
    if u.len() != v.len() {
        return Err(Error::DimensionMismatch { left: u.len(), right: v.len() });
    }

    let mut dot = 0.0f64;
    let mut norm_u = 0.0f64;
    let mut norm_v = 0.0f64;
    for (&a, &b) in u.iter().zip(v) {
        let (a, b) = (f64::from(a), f64::from(b));
        dot += a * b;
        norm_u += a * a;
        norm_v += b * b;
    }

    if norm_u == 0.0 || norm_v == 0.0 {
        return Err(Error::ZeroVector);
    }
    Ok((dot / (norm_u * norm_v).sqrt()).clamp(-1.0, 1.0))
}

fn mean_cosine<V: AsRef<[f32]>>(w: &[f32], set: &[V]) -> Result<f64> {
    let mut total = 0.0f64;
    for member in set {
        total += cosine_similarity(w, member.as_ref())?;
    }
    Ok(total / set.len() as f64)
}

/// Per-word association: mean cosine to `set_a` minus mean cosine to `set_b`.
pub fn weat_differential<V: AsRef<[f32]>>(w: &[f32], set_a: &[V], set_b: &[V]) -> Result<f64> {
    if set_a.is_empty() {
        return Err(Error::EmptyGroup("attribute set A is empty".into()));
    }
    if set_b.is_empty() {
        return Err(Error::EmptyGroup("attribute set B is empty".into()));
    }
    Ok(mean_cosine(w, set_a)? - mean_cosine(w, set_b)?)
}

/// Mean differential over `group_x` minus mean differential over `group_y`.
/// Positive means X leans toward A (relative to B) more than Y does.
pub fn weat_score<V: AsRef<[f32]>>(group_x: &[V], group_y: &[V], set_a: &[V], set_b: &[V]) -> Result<f64> {
    if group_x.is_empty() {
        return Err(Error::EmptyGroup("target group X is empty".into()));
    }
    if group_y.is_empty() {
        return Err(Error::EmptyGroup("target group Y is empty".into()));
    }
    let mean_differential = |group: &[V]| -> Result<f64> {
        let mut total = 0.0f64;
        for w in group {
            total += weat_differential(w.as_ref(), set_a, set_b)?;
        }
        Ok(total / group.len() as f64)
    };
    Ok(mean_differential(group_x)? - mean_differential(group_y)?)
}
