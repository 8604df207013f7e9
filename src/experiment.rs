//! # Experiment Orchestration
//!
//! Explicit entry points that wire generation, caching and aggregation
//! together. Nothing runs until one of the `run_*` methods is called.
//!
//! ```text
//! OccupationStudy ─┐
//!                  ├─ TemplateEngine ─► records ─► export (optional)
//!                  │                       │
//!                  │                       ▼
//!                  │              EmbeddingCache (bulk)
//!                  │                       │
//!                  └──────────────► aggregate ─► StudyReport
//! ```
//!
//! Configuration errors abort the run. Per-sentence embedding failures do
//! not: the report is computed from the successful subset and flagged
//! `partial`. A statistic whose preconditions fail is skipped with its
//! reason, never reported as zero.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::{cosine_similarity, group_mean, weat_score, GroupMeans};
use crate::cache::{BulkOutcome, CacheStats, EmbeddingCache};
use crate::catalog::{top_n, AttributeCatalog};
use crate::config::ExperimentConfig;
use crate::export::export_records_csv;
use crate::model::{Group, SentenceRecord, Sentence, StatKey};
use crate::provider::EmbeddingProvider;
use crate::store::EmbeddingStore;
use crate::template::{occupation_templates, SentenceTemplate, TemplateEngine};
use crate::{Error, Result};

// ============================================================================
// Study inputs
// ============================================================================

/// Ranked inputs for the name × occupation study. The lists come from an
/// external demographic source, already ranked; the study only slices them.
#[derive(Debug, Clone)]
pub struct OccupationStudy {
    pub male_names: Vec<String>,
    pub female_names: Vec<String>,
    /// Names used about equally for both sexes.
    pub neutral_names: Vec<String>,
    /// Most male-dominated first.
    pub male_occupations: Vec<String>,
    /// Most female-dominated first.
    pub female_occupations: Vec<String>,
    pub templates: Vec<SentenceTemplate>,
}

impl OccupationStudy {
    pub fn new(
        male_names: Vec<String>,
        female_names: Vec<String>,
        neutral_names: Vec<String>,
        male_occupations: Vec<String>,
        female_occupations: Vec<String>,
    ) -> Result<Self> {
        Ok(Self {
            male_names,
            female_names,
            neutral_names,
            male_occupations,
            female_occupations,
            templates: occupation_templates()?,
        })
    }

    pub fn with_templates(mut self, templates: Vec<SentenceTemplate>) -> Self {
        self.templates = templates;
        self
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedSentence {
    pub sentence: Sentence,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStatistic {
    pub statistic: String,
    pub reason: String,
}

/// Per occupation: similarity of the neutral-name mean to the female-name
/// and male-name means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSimilarity {
    pub attribute: String,
    pub neutral_female: f64,
    pub neutral_male: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyReport {
    pub sentences: usize,
    pub embedded: usize,
    pub partial: bool,
    pub failed: Vec<FailedSentence>,
    pub attribute_similarities: Vec<AttributeSimilarity>,
    /// X = female names, Y = male names, A = female-dominated occupations,
    /// B = male-dominated occupations.
    pub weat_score: Option<f64>,
    pub skipped: Vec<SkippedStatistic>,
    pub cache: CacheStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleSimilarity {
    pub template_id: String,
    pub noun: String,
    pub neutral_male: f64,
    pub neutral_female: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub tuples: Vec<TupleSimilarity>,
    pub mean_neutral_male: Option<f64>,
    pub mean_neutral_female: Option<f64>,
    pub partial: bool,
    pub failed: Vec<FailedSentence>,
    pub skipped: Vec<SkippedStatistic>,
    pub cache: CacheStats,
}

// ============================================================================
// BiasExperiment
// ============================================================================

/// A configured experiment: an embedding cache plus run settings.
pub struct BiasExperiment<S: EmbeddingStore, P: EmbeddingProvider> {
    cache: EmbeddingCache<S, P>,
    config: ExperimentConfig,
}

impl<P: EmbeddingProvider> BiasExperiment<Arc<dyn EmbeddingStore>, P> {
    /// Open the configured store and wrap `provider` with it.
    pub async fn from_config(config: ExperimentConfig, provider: P) -> Result<Self> {
        config.validate()?;
        if provider.model_name() != config.model {
            return Err(Error::Config(format!(
                "provider serves model '{}' but the experiment is configured for '{}'",
                provider.model_name(),
                config.model
            )));
        }
        let store = config.store.open().await?;
        let cache = EmbeddingCache::new(store, provider).with_max_batch_size(config.max_batch_size);
        Ok(Self { cache, config })
    }
}

impl<S: EmbeddingStore, P: EmbeddingProvider> BiasExperiment<S, P> {
    pub fn new(cache: EmbeddingCache<S, P>, config: ExperimentConfig) -> Self {
        Self { cache, config }
    }

    pub fn cache(&self) -> &EmbeddingCache<S, P> {
        &self.cache
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Name × occupation study.
    pub async fn run_occupation_study(&self, study: &OccupationStudy) -> Result<StudyReport> {
        let n_names = self.config.top_names;
        let n_occupations = self.config.top_occupations;
        let male_occupations = top_n(&study.male_occupations, n_occupations);
        let female_occupations = top_n(&study.female_occupations, n_occupations);
        let occupations: Vec<String> = male_occupations
            .iter()
            .chain(&female_occupations)
            .cloned()
            .collect();

        let engine = TemplateEngine::new(AttributeCatalog::default(), study.templates.clone())?;
        let mut records = Vec::new();
        for (group, names) in [
            (Group::Neutral, &study.neutral_names),
            (Group::Female, &study.female_names),
            (Group::Male, &study.male_names),
        ] {
            records.extend(engine.generate_cross(&group, &occupations, &top_n(names, n_names))?);
        }
        info!(records = records.len(), occupations = occupations.len(), "generated occupation study sentences");

        if let Some(path) = &self.config.export_path {
            export_records_csv(&records, path)?;
        }

        let sentences: Vec<Sentence> = records.iter().map(|r| r.sentence.clone()).collect();
        let outcome = self
            .cache
            .get_or_compute_bulk_with(&sentences, self.config.force_recompute)
            .await;
        let failed = failed_sentences(&outcome);

        let embedded: Vec<(&SentenceRecord, &[f32])> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| outcome.get(i).map(|e| (r, e.as_slice())))
            .collect();

        let mut skipped = Vec::new();
        let mut attribute_similarities = Vec::new();

        match group_mean(embedded.iter().map(|&(r, e)| {
            (StatKey::group_attribute(r.group.clone(), r.attribute.clone()), e)
        })) {
            Ok(means) => {
                let mut seen = Vec::new();
                for attribute in &occupations {
                    if seen.contains(&attribute) {
                        continue;
                    }
                    seen.push(attribute);
                    match attribute_similarity(&means, attribute) {
                        Ok(similarity) => attribute_similarities.push(similarity),
                        Err(e) => skip(&mut skipped, format!("similarity[{attribute}]"), e),
                    }
                }
            }
            Err(e) => skip(&mut skipped, "group_means".into(), e),
        }

        let group_x = select(&embedded, |r| r.group == Group::Female);
        let group_y = select(&embedded, |r| r.group == Group::Male);
        let set_a = select(&embedded, |r| female_occupations.contains(&r.attribute));
        let set_b = select(&embedded, |r| male_occupations.contains(&r.attribute));

        let weat = match weat_score(&group_x, &group_y, &set_a, &set_b) {
            Ok(score) => Some(score),
            Err(e) => {
                skip(&mut skipped, "weat_score".into(), e);
                None
            }
        };

        let report = StudyReport {
            sentences: records.len(),
            embedded: embedded.len(),
            partial: outcome.is_partial(),
            failed,
            attribute_similarities,
            weat_score: weat,
            skipped,
            cache: self.cache.stats(),
        };
        info!(
            sentences = report.sentences,
            embedded = report.embedded,
            partial = report.partial,
            weat_score = ?report.weat_score,
            "occupation study finished"
        );
        Ok(report)
    }

    /// Comparison-tuple study: per tuple, similarity of the neutral
    /// sentence to its male and female counterparts.
    pub async fn run_comparison_study<N: AsRef<str>>(
        &self,
        engine: &TemplateEngine,
        nouns: &[N],
    ) -> Result<ComparisonReport> {
        let tuples = engine.generate_comparison_tuples(nouns)?;
        let sentences: Vec<Sentence> = tuples
            .iter()
            .flat_map(|t| t.sentences().map(Clone::clone))
            .collect();

        let outcome = self
            .cache
            .get_or_compute_bulk_with(&sentences, self.config.force_recompute)
            .await;

        let mut skipped = Vec::new();
        let mut similarities = Vec::with_capacity(tuples.len());
        for (i, tuple) in tuples.iter().enumerate() {
            let (Some(male), Some(female), Some(neutral)) =
                (outcome.get(3 * i), outcome.get(3 * i + 1), outcome.get(3 * i + 2))
            else {
                continue;
            };
            let pair = cosine_similarity(neutral.as_slice(), male.as_slice()).and_then(|nm| {
                Ok((nm, cosine_similarity(neutral.as_slice(), female.as_slice())?))
            });
            match pair {
                Ok((neutral_male, neutral_female)) => similarities.push(TupleSimilarity {
                    template_id: tuple.template_id.clone(),
                    noun: tuple.noun.clone(),
                    neutral_male,
                    neutral_female,
                }),
                Err(e) => skip(&mut skipped, format!("tuple[{}:{}]", tuple.template_id, tuple.noun), e),
            }
        }

        let mean = |f: fn(&TupleSimilarity) -> f64| -> Option<f64> {
            (!similarities.is_empty())
                .then(|| similarities.iter().map(f).sum::<f64>() / similarities.len() as f64)
        };
        let mean_neutral_male = mean(|s| s.neutral_male);
        let mean_neutral_female = mean(|s| s.neutral_female);

        Ok(ComparisonReport {
            mean_neutral_male,
            mean_neutral_female,
            tuples: similarities,
            partial: outcome.is_partial(),
            failed: failed_sentences(&outcome),
            skipped,
            cache: self.cache.stats(),
        })
    }
}

fn attribute_similarity(means: &GroupMeans, attribute: &str) -> Result<AttributeSimilarity> {
    let neutral = means.get(&StatKey::group_attribute(Group::Neutral, attribute))?;
    let female = means.get(&StatKey::group_attribute(Group::Female, attribute))?;
    let male = means.get(&StatKey::group_attribute(Group::Male, attribute))?;
    Ok(AttributeSimilarity {
        attribute: attribute.to_string(),
        neutral_female: cosine_similarity(neutral.as_slice(), female.as_slice())?,
        neutral_male: cosine_similarity(neutral.as_slice(), male.as_slice())?,
    })
}

fn select<'a>(
    embedded: &[(&SentenceRecord, &'a [f32])],
    pred: impl Fn(&SentenceRecord) -> bool,
) -> Vec<&'a [f32]> {
    embedded
        .iter()
        .filter(|(r, _)| pred(r))
        .map(|&(_, e)| e)
        .collect()
}

fn failed_sentences(outcome: &BulkOutcome) -> Vec<FailedSentence> {
    outcome
        .failures()
        .iter()
        .map(|f| FailedSentence {
            sentence: f.sentence.clone(),
            reason: f.error.to_string(),
        })
        .collect()
}

fn skip(skipped: &mut Vec<SkippedStatistic>, statistic: String, error: Error) {
    warn!(%statistic, error = %error, "statistic skipped");
    skipped.push(SkippedStatistic {
        statistic,
        reason: error.to_string(),
    });
}
