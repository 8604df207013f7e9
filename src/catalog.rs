//! # Attribute Catalog
//!
//! Index-aligned attribute lists per group, plus the shared noun list.
//!
//! Every template addresses the catalog by `(group, slot index)`. Position
//! `i` must denote the same concept in every group ("man" ~ "woman" ~
//! "person"), so all group lists have the same length. The builder checks
//! this once at load time; a catalog that exists is consistent.

use crate::model::{Agreement, Group};
use crate::{Error, Result};

// ============================================================================
// Canonical experiment vocabulary
// ============================================================================

const MALE_TERMS: [&str; 8] = ["male", "man", "boy", "brother", "he", "him", "his", "son"];

const FEMALE_TERMS: [&str; 8] = [
    "female", "woman", "girl", "sister", "she", "her", "hers", "daughter",
];

const NEUTRAL_TERMS: [&str; 8] = [
    "human", "person", "individual", "sibling", "they", "them", "their", "offspring",
];

/// Gender-neutral occupation nouns used as template subjects.
const NEUTRAL_NOUNS: [&str; 9] = [
    "doctor", "lawyer", "cleaner", "nurse", "teacher", "engineer", "scientist", "artist",
    "musician",
];

// ============================================================================
// AttributeCatalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupEntry {
    group: Group,
    agreement: Agreement,
    attributes: Vec<String>,
}

/// Parallel attribute lists keyed by `(Group, slot index)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeCatalog {
    groups: Vec<GroupEntry>,
    nouns: Vec<String>,
}

impl AttributeCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// The canonical male/female/neutral term lists and occupation nouns.
    pub fn gendered_terms() -> Self {
        Self {
            groups: vec![
                GroupEntry {
                    group: Group::Male,
                    agreement: Agreement::Singular,
                    attributes: to_owned(&MALE_TERMS),
                },
                GroupEntry {
                    group: Group::Female,
                    agreement: Agreement::Singular,
                    attributes: to_owned(&FEMALE_TERMS),
                },
                GroupEntry {
                    group: Group::Neutral,
                    agreement: Agreement::Plural,
                    attributes: to_owned(&NEUTRAL_TERMS),
                },
            ],
            nouns: to_owned(&NEUTRAL_NOUNS),
        }
    }

    fn entry(&self, group: &Group) -> Result<&GroupEntry> {
        self.groups
            .iter()
            .find(|e| &e.group == group)
            .ok_or_else(|| Error::InvalidGroup(group.to_string()))
    }

    /// Attribute list of a registered group.
    pub fn attributes(&self, group: &Group) -> Result<&[String]> {
        Ok(&self.entry(group)?.attributes)
    }

    /// Agreement form ("is" / "are") of a registered group.
    pub fn agreement(&self, group: &Group) -> Result<Agreement> {
        Ok(self.entry(group)?.agreement)
    }

    /// The attribute at `index` in `group`'s list.
    pub fn attribute(&self, group: &Group, index: usize) -> Result<&str> {
        let entry = self.entry(group)?;
        entry
            .attributes
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::TemplateBinding(format!(
                    "attribute index {index} out of bounds for group '{}' ({} attributes)",
                    group,
                    entry.attributes.len()
                ))
            })
    }

    /// Resolve a group by name (`"male"`, `"female"`, `"neutral"`, or a
    /// registered custom name).
    pub fn lookup(&self, name: &str) -> Result<&Group> {
        let group: Group = name.parse()?;
        Ok(&self.entry(&group)?.group)
    }

    pub fn contains(&self, group: &Group) -> bool {
        self.groups.iter().any(|e| &e.group == group)
    }

    /// Registered groups in registration order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter().map(|e| &e.group)
    }

    /// Shared subject nouns.
    pub fn nouns(&self) -> &[String] {
        &self.nouns
    }

    /// Number of aligned slots (the common list length). Zero when no group
    /// is registered.
    pub fn slot_count(&self) -> usize {
        self.groups.first().map_or(0, |e| e.attributes.len())
    }

    /// Verify that all parallel group lists have the same length.
    pub fn check_consistency(&self) -> Result<()> {
        let Some(first) = self.groups.first() else {
            return Ok(());
        };
        for other in &self.groups[1..] {
            if other.attributes.len() != first.attributes.len() {
                return Err(Error::CatalogConsistency(format!(
                    "group '{}' has {} attributes but group '{}' has {}",
                    first.group,
                    first.attributes.len(),
                    other.group,
                    other.attributes.len()
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// CatalogBuilder
// ============================================================================

/// Incremental catalog construction. `build()` runs the consistency check.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    groups: Vec<GroupEntry>,
    nouns: Vec<String>,
}

impl CatalogBuilder {
    /// Register a group with its policy agreement. Canonical groups follow
    /// the fixed single/collective policy; custom groups are treated as a
    /// single referent. Use [`group_with_agreement`](Self::group_with_agreement)
    /// for a collective custom group.
    pub fn group<I, S>(self, group: Group, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agreement = group.default_agreement().unwrap_or(Agreement::Singular);
        self.group_with_agreement(group, agreement, attributes)
    }

    pub fn group_with_agreement<I, S>(mut self, group: Group, agreement: Agreement, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.push(GroupEntry {
            group,
            agreement,
            attributes: attributes.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn nouns<I, S>(mut self, nouns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nouns = nouns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<AttributeCatalog> {
        for (i, entry) in self.groups.iter().enumerate() {
            entry.group.check_label()?;
            if self.groups[..i].iter().any(|e| e.group == entry.group) {
                return Err(Error::CatalogConsistency(format!(
                    "group '{}' registered twice",
                    entry.group
                )));
            }
        }
        let catalog = AttributeCatalog {
            groups: self.groups,
            nouns: self.nouns,
        };
        catalog.check_consistency()?;
        Ok(catalog)
    }
}

// ============================================================================
// Ranked list slicing
// ============================================================================

/// The first `n` entries of an externally ranked list (or all of it when
/// shorter).
pub fn top_n<T: Clone>(ranked: &[T], n: usize) -> Vec<T> {
    ranked[..n.min(ranked.len())].to_vec()
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
