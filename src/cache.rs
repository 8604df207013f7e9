//! # Embedding Cache
//!
//! Content-addressed memoization of provider calls. The exact sentence
//! string is the key; a sentence already in the store is never sent to the
//! provider again.
//!
//! ```text
//! get_or_compute_bulk([s0, s1, s0, s2])
//!   ├── dedupe            → s0, s1, s2
//!   ├── store lookup      → s1 hit;  s0, s2 missing
//!   ├── provider batches  → [s0, s2]   (≤ max_batch_size each, sequential)
//!   ├── store writes      → s0, s2
//!   └── reassemble        → [e0, e1, e0, e2]   caller order
//! ```
//!
//! Provider and store failures are per sentence: they are collected into a
//! [`BulkOutcome`] and never abort the remaining batches. A corrupt entry is
//! reported as such and only recomputed under `force_recompute`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::model::{Embedding, EmbeddingRecord, Sentence};
use crate::provider::EmbeddingProvider;
use crate::store::EmbeddingStore;
use crate::{Error, Result};

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    provider_calls: AtomicU64,
    corrupt_entries: AtomicU64,
}

impl CacheCounters {
    fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Snapshot of cache activity since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Outbound provider requests (a bulk batch counts once).
    pub provider_calls: u64,
    pub corrupt_entries: u64,
}

// ============================================================================
// Bulk outcome
// ============================================================================

/// A sentence that could not be embedded, with the reason.
#[derive(Debug)]
pub struct SentenceFailure {
    pub sentence: Sentence,
    pub error: Error,
}

/// Result of a bulk lookup: one slot per input sentence, in input order.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    embeddings: Vec<Option<Embedding>>,
    failures: Vec<SentenceFailure>,
}

impl BulkOutcome {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Embedding for input position `index`, if it succeeded.
    pub fn get(&self, index: usize) -> Option<&Embedding> {
        self.embeddings.get(index).and_then(Option::as_ref)
    }

    /// Per-position results in input order.
    pub fn embeddings(&self) -> &[Option<Embedding>] {
        &self.embeddings
    }

    /// Failed sentences, one entry per distinct sentence.
    pub fn failures(&self) -> &[SentenceFailure] {
        &self.failures
    }

    /// True when at least one sentence failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// All embeddings in input order, or the first failure.
    pub fn into_complete(self) -> Result<Vec<Embedding>> {
        if let Some(failure) = self.failures.into_iter().next() {
            return Err(failure.error);
        }
        Ok(self.embeddings.into_iter().flatten().collect())
    }
}

// ============================================================================
// EmbeddingCache
// ============================================================================

/// Wraps a provider with a persistent store.
pub struct EmbeddingCache<S: EmbeddingStore, P: EmbeddingProvider> {
    store: S,
    provider: P,
    model: String,
    max_batch_size: usize,
    /// sentence → lock held while that sentence is looked up or computed
    in_flight: Mutex<HashMap<Sentence, Arc<AsyncMutex<()>>>>,
    counters: CacheCounters,
    stop: Option<Arc<AtomicBool>>,
}

impl<S: EmbeddingStore, P: EmbeddingProvider> EmbeddingCache<S, P> {
    pub fn new(store: S, provider: P) -> Self {
        let model = provider.model_name().to_string();
        let max_batch_size = provider.max_batch_size().max(1);
        Self {
            store,
            provider,
            model,
            max_batch_size,
            in_flight: Mutex::new(HashMap::new()),
            counters: CacheCounters::default(),
            stop: None,
        }
    }

    /// Lower the outbound batch cap. Never exceeds the provider's maximum.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.min(self.provider.max_batch_size()).max(1);
        self
    }

    /// Flag checked between bulk batches. Once set, undispatched sentences
    /// fail with `Error::Cancelled`; finished batches stay stored.
    pub fn with_stop_signal(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            provider_calls: c.provider_calls.load(Ordering::Relaxed),
            corrupt_entries: c.corrupt_entries.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // Single lookups
    // ========================================================================

    /// Cached embedding for `sentence`, computing and storing it on a miss.
    pub async fn get_or_compute(&self, sentence: &Sentence) -> Result<Embedding> {
        self.get_or_compute_with(sentence, false).await
    }

    /// Like [`get_or_compute`](Self::get_or_compute); `force_recompute`
    /// skips the lookup (including a corrupt entry) and rewrites the entry.
    pub async fn get_or_compute_with(&self, sentence: &Sentence, force_recompute: bool) -> Result<Embedding> {
        let slot = self.key_lock(sentence);
        let result = {
            let _guard = slot.lock().await;
            self.compute_locked(sentence, force_recompute).await
        };
        self.release_key(sentence, slot);
        result
    }

    async fn compute_locked(&self, sentence: &Sentence, force_recompute: bool) -> Result<Embedding> {
        if !force_recompute {
            if let Some(embedding) = self.read_cached(sentence).await? {
                CacheCounters::bump(&self.counters.hits, 1);
                debug!(sentence = %sentence, "embedding cache hit");
                return Ok(embedding);
            }
        }
        CacheCounters::bump(&self.counters.misses, 1);
        debug!(sentence = %sentence, force_recompute, "embedding cache miss");

        CacheCounters::bump(&self.counters.provider_calls, 1);
        let vector = self
            .provider
            .embed(sentence.as_str())
            .await
            .map_err(provider_error)?;
        self.store_vector(sentence, vector).await
    }

    // ========================================================================
    // Bulk lookups
    // ========================================================================

    /// Embeddings for many sentences, in the caller's order.
    pub async fn get_or_compute_bulk(&self, sentences: &[Sentence]) -> BulkOutcome {
        self.get_or_compute_bulk_with(sentences, false).await
    }

    /// Bulk lookup: cached sentences are served from the store, the missing
    /// ones are sent to the provider in sequential batches of at most
    /// `max_batch_size`. Duplicate inputs are computed once.
    pub async fn get_or_compute_bulk_with(&self, sentences: &[Sentence], force_recompute: bool) -> BulkOutcome {
        let mut positions: HashMap<&Sentence, Vec<usize>> = HashMap::new();
        let mut unique: Vec<&Sentence> = Vec::new();
        for (i, sentence) in sentences.iter().enumerate() {
            positions
                .entry(sentence)
                .or_insert_with(|| {
                    unique.push(sentence);
                    Vec::new()
                })
                .push(i);
        }

        let mut resolved: HashMap<&Sentence, Embedding> = HashMap::with_capacity(unique.len());
        let mut failures: Vec<SentenceFailure> = Vec::new();
        let mut missing: Vec<&Sentence> = Vec::new();

        if force_recompute {
            missing = unique.clone();
        } else {
            for &sentence in &unique {
                match self.read_cached(sentence).await {
                    Ok(Some(embedding)) => {
                        resolved.insert(sentence, embedding);
                    }
                    Ok(None) => missing.push(sentence),
                    Err(error) => failures.push(SentenceFailure {
                        sentence: sentence.clone(),
                        error,
                    }),
                }
            }
            CacheCounters::bump(&self.counters.hits, resolved.len() as u64);
        }
        CacheCounters::bump(&self.counters.misses, missing.len() as u64);

        info!(
            total = sentences.len(),
            unique = unique.len(),
            cached = resolved.len(),
            missing = missing.len(),
            batch_size = self.max_batch_size,
            "bulk embedding lookup"
        );

        let batches: Vec<&[&Sentence]> = missing.chunks(self.max_batch_size).collect();
        for (batch_no, batch) in batches.iter().enumerate() {
            if self.stop_requested() {
                let remaining: usize = batches[batch_no..].iter().map(|b| b.len()).sum();
                warn!(remaining, "bulk embedding stopped between batches");
                for rest in &batches[batch_no..] {
                    failures.extend(rest.iter().map(|&s| SentenceFailure {
                        sentence: s.clone(),
                        error: Error::Cancelled,
                    }));
                }
                break;
            }
            self.run_batch(batch_no, batch, force_recompute, &mut resolved, &mut failures)
                .await;
        }

        let mut embeddings = vec![None; sentences.len()];
        for (sentence, embedding) in resolved {
            if let Some(slots) = positions.get(sentence) {
                for &i in slots {
                    embeddings[i] = Some(embedding.clone());
                }
            }
        }
        BulkOutcome { embeddings, failures }
    }

    /// Lock the batch's keys (sorted, so concurrent callers cannot
    /// deadlock), drop anything a concurrent caller stored meanwhile, and
    /// embed the rest with one provider call.
    async fn run_batch<'a>(
        &self,
        batch_no: usize,
        batch: &[&'a Sentence],
        force_recompute: bool,
        resolved: &mut HashMap<&'a Sentence, Embedding>,
        failures: &mut Vec<SentenceFailure>,
    ) {
        let mut ordered: Vec<&'a Sentence> = batch.to_vec();
        ordered.sort();
        let slots: Vec<Arc<AsyncMutex<()>>> = ordered.iter().map(|s| self.key_lock(s)).collect();
        let mut guards = Vec::with_capacity(slots.len());
        for slot in &slots {
            guards.push(slot.lock().await);
        }

        let mut pending: Vec<&'a Sentence> = Vec::with_capacity(batch.len());
        for &sentence in batch {
            if force_recompute {
                pending.push(sentence);
                continue;
            }
            match self.read_cached(sentence).await {
                Ok(Some(embedding)) => {
                    resolved.insert(sentence, embedding);
                }
                Ok(None) => pending.push(sentence),
                Err(error) => failures.push(SentenceFailure {
                    sentence: sentence.clone(),
                    error,
                }),
            }
        }

        if !pending.is_empty() {
            let texts: Vec<&str> = pending.iter().map(|s| s.as_str()).collect();
            CacheCounters::bump(&self.counters.provider_calls, 1);
            debug!(batch = batch_no, size = texts.len(), "dispatching provider batch");

            match self.provider.embed_bulk(&texts).await {
                Err(e) => {
                    let reason = provider_reason(e);
                    warn!(batch = batch_no, size = pending.len(), %reason, "provider batch failed");
                    failures.extend(pending.iter().map(|&s| SentenceFailure {
                        sentence: s.clone(),
                        error: Error::ProviderUnavailable(reason.clone()),
                    }));
                }
                Ok(vectors) if vectors.len() != pending.len() => {
                    let reason = format!(
                        "provider returned {} vectors for {} texts",
                        vectors.len(),
                        pending.len()
                    );
                    warn!(batch = batch_no, %reason, "provider batch rejected");
                    failures.extend(pending.iter().map(|&s| SentenceFailure {
                        sentence: s.clone(),
                        error: Error::ProviderUnavailable(reason.clone()),
                    }));
                }
                Ok(vectors) => {
                    for (&sentence, vector) in pending.iter().zip(vectors) {
                        match self.store_vector(sentence, vector).await {
                            Ok(embedding) => {
                                resolved.insert(sentence, embedding);
                            }
                            Err(error) => failures.push(SentenceFailure {
                                sentence: sentence.clone(),
                                error,
                            }),
                        }
                    }
                }
            }
        }

        drop(guards);
        for (sentence, slot) in ordered.into_iter().zip(slots) {
            self.release_key(sentence, slot);
        }
    }

    async fn store_vector(&self, sentence: &Sentence, vector: Vec<f32>) -> Result<Embedding> {
        let embedding = validate_vector(vector)?;
        self.store
            .put(EmbeddingRecord::new(sentence.clone(), &self.model, embedding.clone()))
            .await
            .map_err(|e| match e {
                Error::Io(_) | Error::Serialization(_) => Error::Storage(e.to_string()),
                other => other,
            })?;
        Ok(embedding)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// `Ok(None)` on a miss or on a record from another model; corruption
    /// is an error, never an implicit miss.
    async fn read_cached(&self, sentence: &Sentence) -> Result<Option<Embedding>> {
        match self.store.get(sentence).await {
            Ok(Some(record)) => {
                if let Some(reason) = record.integrity_problem(sentence) {
                    CacheCounters::bump(&self.counters.corrupt_entries, 1);
                    warn!(sentence = %sentence, %reason, "corrupt cache entry");
                    return Err(Error::CacheCorruption {
                        sentence: sentence.to_string(),
                        reason,
                    });
                }
                if record.model != self.model {
                    debug!(sentence = %sentence, cached_model = %record.model, "cached entry from another model");
                    return Ok(None);
                }
                Ok(Some(record.vector))
            }
            Ok(None) => Ok(None),
            Err(e @ Error::CacheCorruption { .. }) => {
                CacheCounters::bump(&self.counters.corrupt_entries, 1);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|s| s.load(Ordering::Relaxed))
    }

    fn key_lock(&self, sentence: &Sentence) -> Arc<AsyncMutex<()>> {
        self.in_flight
            .lock()
            .entry(sentence.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drop the in-flight entry once no other caller holds it. Clones only
    /// happen under the map lock, so the count cannot grow while we check.
    fn release_key(&self, sentence: &Sentence, slot: Arc<AsyncMutex<()>>) {
        let mut map = self.in_flight.lock();
        if Arc::strong_count(&slot) == 2 {
            map.remove(sentence);
        }
    }
}

fn provider_error(e: Error) -> Error {
    Error::ProviderUnavailable(provider_reason(e))
}

/// Failure message without the `ProviderUnavailable` prefix.
fn provider_reason(e: Error) -> String {
    match e {
        Error::ProviderUnavailable(reason) => reason,
        other => other.to_string(),
    }
}

fn validate_vector(vector: Vec<f32>) -> Result<Embedding> {
    if vector.is_empty() {
        return Err(Error::ProviderUnavailable("provider returned an empty vector".into()));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(Error::ProviderUnavailable("provider returned a non-finite component".into()));
    }
    Ok(Embedding::new(vector))
}
