//! # Sentence Templates
//!
//! A template is a sentence skeleton with placeholders and a declared role
//! per placeholder. Placeholders are either positional (`{}`, role taken
//! from the declared role list) or named (`{noun}`, `{attribute}`,
//! `{adjective}`, role implied by the name). `{{` and `}}` escape braces.
//!
//! ```text
//! "The {} said {} {} tired"  roles [Noun, Attribute, Adjective], index 4
//!   male    → "The doctor said he is tired"
//!   neutral → "The doctor said they are tired"
//! ```
//!
//! The engine expands templates against an [`AttributeCatalog`]. Output
//! order is part of the contract: nouns outer, templates inner, both in
//! declaration order. Callers zip these sequences against each other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::AttributeCatalog;
use crate::model::{Agreement, ComparisonTuple, Group, Sentence, SentenceRecord};
use crate::{Error, Result};

// ============================================================================
// Slot roles
// ============================================================================

/// What a placeholder is filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotRole {
    /// The subject noun or name.
    Noun,
    /// The group attribute at the template's attribute index.
    Attribute,
    /// The group's agreement form ("is" / "are").
    Adjective,
}

impl SlotRole {
    /// Role implied by a named placeholder.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "noun" | "name" | "subject" => Some(SlotRole::Noun),
            "attribute" => Some(SlotRole::Attribute),
            "adjective" | "agreement" | "linking-verb" | "verb" => Some(SlotRole::Adjective),
            _ => None,
        }
    }
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SlotRole::Noun => "noun",
            SlotRole::Attribute => "attribute",
            SlotRole::Adjective => "adjective",
        })
    }
}

// ============================================================================
// Template parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// Placeholder ordinal (0-based, left to right).
    Slot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Placeholder {
    /// `None` for `{}`.
    name: Option<String>,
}

fn parse_pattern(id: &str, pattern: &str) -> Result<(Vec<Segment>, Vec<Placeholder>)> {
    let mut segments = Vec::new();
    let mut placeholders = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' if matches!(chars.peek(), Some(&(_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some(&(_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    if c == '{' {
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(Error::TemplateBinding(format!(
                        "template '{id}': unclosed placeholder at position {pos}"
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Slot(placeholders.len()));
                let name = name.trim();
                placeholders.push(Placeholder {
                    name: (!name.is_empty()).then(|| name.to_string()),
                });
            }
            '}' => {
                return Err(Error::TemplateBinding(format!(
                    "template '{id}': unmatched '}}' at position {pos}"
                )));
            }
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok((segments, placeholders))
}

// ============================================================================
// SentenceTemplate
// ============================================================================

/// A parsed template with its slot-to-role mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceTemplate {
    id: String,
    pattern: String,
    segments: Vec<Segment>,
    roles: Vec<SlotRole>,
    attribute_index: Option<usize>,
}

impl SentenceTemplate {
    /// Build a template with an explicit role per placeholder.
    ///
    /// Fails with `TemplateBinding` when the role count differs from the
    /// placeholder count, or when a named placeholder contradicts its
    /// declared role.
    pub fn positional(
        id: impl Into<String>,
        pattern: impl Into<String>,
        roles: Vec<SlotRole>,
        attribute_index: Option<usize>,
    ) -> Result<Self> {
        let id = id.into();
        let pattern = pattern.into();
        let (segments, placeholders) = parse_pattern(&id, &pattern)?;

        if placeholders.len() != roles.len() {
            return Err(Error::TemplateBinding(format!(
                "template '{id}' has {} placeholders but declares {} roles",
                placeholders.len(),
                roles.len()
            )));
        }
        for (slot, (placeholder, role)) in placeholders.iter().zip(&roles).enumerate() {
            if let Some(name) = &placeholder.name {
                match SlotRole::from_name(name) {
                    Some(implied) if implied == *role => {}
                    _ => {
                        return Err(Error::TemplateBinding(format!(
                            "template '{id}': slot {slot} is named '{name}' but declared as {role}"
                        )));
                    }
                }
            }
        }

        Ok(Self { id, pattern, segments, roles, attribute_index })
    }

    /// Build a template whose roles are implied by named placeholders.
    pub fn named(
        id: impl Into<String>,
        pattern: impl Into<String>,
        attribute_index: Option<usize>,
    ) -> Result<Self> {
        let id = id.into();
        let pattern = pattern.into();
        let (segments, placeholders) = parse_pattern(&id, &pattern)?;

        let roles = placeholders
            .iter()
            .enumerate()
            .map(|(slot, p)| match p.name.as_deref() {
                Some(name) => SlotRole::from_name(name).ok_or_else(|| {
                    Error::TemplateBinding(format!(
                        "template '{id}': unknown slot name '{name}'"
                    ))
                }),
                None => Err(Error::TemplateBinding(format!(
                    "template '{id}': slot {slot} is positional but no roles were declared"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { id, pattern, segments, roles, attribute_index })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn roles(&self) -> &[SlotRole] {
        &self.roles
    }

    pub fn attribute_index(&self) -> Option<usize> {
        self.attribute_index
    }

    pub fn placeholder_count(&self) -> usize {
        self.roles.len()
    }

    pub fn uses_attribute(&self) -> bool {
        self.roles.contains(&SlotRole::Attribute)
    }

    /// Format positionally. The argument count must equal the placeholder
    /// count exactly.
    pub fn render(&self, args: &[&str]) -> Result<Sentence> {
        if args.len() != self.placeholder_count() {
            return Err(Error::TemplateBinding(format!(
                "template '{}' has {} placeholders but {} arguments were resolved",
                self.id,
                self.placeholder_count(),
                args.len()
            )));
        }
        let mut out = String::with_capacity(self.pattern.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(i) => out.push_str(args[*i]),
            }
        }
        Ok(Sentence::new(out))
    }

    /// Fill every slot from its role and format.
    pub fn resolve(&self, noun: &str, attribute: &str, agreement: Agreement) -> Result<Sentence> {
        let args: Vec<&str> = self
            .roles
            .iter()
            .map(|role| match role {
                SlotRole::Noun => noun,
                SlotRole::Attribute => attribute,
                SlotRole::Adjective => agreement.as_str(),
            })
            .collect();
        self.render(&args)
    }
}

// ============================================================================
// Built-in template sets
// ============================================================================

/// The eight gendered-term templates. Template `i` uses attribute slot `i`
/// of the gendered-terms catalog.
pub fn default_templates() -> Result<Vec<SentenceTemplate>> {
    use SlotRole::{Adjective, Attribute, Noun};

    let specs: [(&str, Vec<SlotRole>, usize); 8] = [
        ("The {} {} called", vec![Attribute, Noun], 0),
        ("The {} is a {}", vec![Noun, Attribute], 1),
        ("The {} is a {}", vec![Noun, Attribute], 2),
        ("The {} is someone's {}", vec![Noun, Attribute], 3),
        ("The {} said {} {} tired", vec![Noun, Attribute, Adjective], 4),
        ("The {} asked everyone to not interrupt {}", vec![Noun, Attribute], 5),
        ("The {} called {} friend", vec![Noun, Attribute], 6),
        ("The {} is someone's {}", vec![Noun, Attribute], 7),
    ];

    specs
        .into_iter()
        .enumerate()
        .map(|(i, (pattern, roles, index))| {
            SentenceTemplate::positional(format!("t{i}"), pattern, roles, Some(index))
        })
        .collect()
}

/// Name × occupation templates for the occupation study.
pub fn occupation_templates() -> Result<Vec<SentenceTemplate>> {
    [
        "{name} is a {attribute}",
        "{name} works as a {attribute}",
        "{name} retired from being a {attribute}",
    ]
    .into_iter()
    .map(|pattern| SentenceTemplate::named(pattern, pattern, None))
    .collect()
}

// ============================================================================
// TemplateEngine
// ============================================================================

/// Expands templates against a catalog.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    catalog: AttributeCatalog,
    templates: Vec<SentenceTemplate>,
}

impl TemplateEngine {
    /// Bind templates to a catalog. Every declared attribute index must be
    /// in bounds for every registered group.
    pub fn new(catalog: AttributeCatalog, templates: Vec<SentenceTemplate>) -> Result<Self> {
        catalog.check_consistency()?;
        for template in &templates {
            if let Some(index) = template.attribute_index {
                for group in catalog.groups() {
                    catalog.attribute(group, index).map_err(|_| {
                        Error::TemplateBinding(format!(
                            "template '{}' uses attribute index {index} but group '{group}' has {} attributes",
                            template.id,
                            catalog.slot_count()
                        ))
                    })?;
                }
            }
        }
        Ok(Self { catalog, templates })
    }

    /// Gendered-terms catalog with the default templates.
    pub fn gendered_terms() -> Result<Self> {
        Self::new(AttributeCatalog::gendered_terms(), default_templates()?)
    }

    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    pub fn templates(&self) -> &[SentenceTemplate] {
        &self.templates
    }

    /// Sentences for every (noun × template) pair, nouns outer.
    pub fn generate<S: AsRef<str>>(&self, group: &Group, nouns: &[S]) -> Result<Vec<Sentence>> {
        Ok(self
            .generate_records(group, nouns)?
            .into_iter()
            .map(|r| r.sentence)
            .collect())
    }

    /// Record form of [`generate`](Self::generate), same order.
    pub fn generate_records<S: AsRef<str>>(
        &self,
        group: &Group,
        nouns: &[S],
    ) -> Result<Vec<SentenceRecord>> {
        let agreement = self.catalog.agreement(group)?;
        let mut records = Vec::with_capacity(nouns.len() * self.templates.len());

        for noun in nouns {
            let noun = noun.as_ref();
            for template in &self.templates {
                let attribute = self.catalog_attribute(template, group)?;
                let sentence = template.resolve(noun, attribute, agreement)?;
                records.push(SentenceRecord {
                    attribute: attribute.to_string(),
                    noun: noun.to_string(),
                    template_id: template.id.clone(),
                    sentence,
                    group: group.clone(),
                });
            }
        }
        Ok(records)
    }

    /// One (male, female, neutral) tuple per (noun × template) pair, for
    /// templates that declare an attribute index. Each member uses its own
    /// group's attribute and agreement form; noun and skeleton are shared.
    pub fn generate_comparison_tuples<S: AsRef<str>>(
        &self,
        nouns: &[S],
    ) -> Result<Vec<ComparisonTuple>> {
        let [male, female, neutral] = Group::CANONICAL;
        let agreements = [
            self.catalog.agreement(&male)?,
            self.catalog.agreement(&female)?,
            self.catalog.agreement(&neutral)?,
        ];

        let mut tuples = Vec::with_capacity(nouns.len() * self.templates.len());
        for noun in nouns {
            let noun = noun.as_ref();
            for template in self.templates.iter().filter(|t| t.attribute_index.is_some()) {
                let resolve = |group: &Group, agreement: Agreement| -> Result<Sentence> {
                    let attribute = self.catalog_attribute(template, group)?;
                    template.resolve(noun, attribute, agreement)
                };
                tuples.push(ComparisonTuple {
                    template_id: template.id.clone(),
                    noun: noun.to_string(),
                    male: resolve(&male, agreements[0])?,
                    female: resolve(&female, agreements[1])?,
                    neutral: resolve(&neutral, agreements[2])?,
                });
            }
        }
        Ok(tuples)
    }

    /// Cross product of attribute × name × template, in that nesting order.
    /// Attribute values are substituted directly, so template attribute
    /// indices are not consulted.
    pub fn generate_cross<A, N>(
        &self,
        group: &Group,
        attributes: &[A],
        names: &[N],
    ) -> Result<Vec<SentenceRecord>>
    where
        A: AsRef<str>,
        N: AsRef<str>,
    {
        let agreement = if self.catalog.contains(group) {
            self.catalog.agreement(group)?
        } else {
            group
                .default_agreement()
                .ok_or_else(|| Error::InvalidGroup(group.to_string()))?
        };

        let mut records = Vec::with_capacity(attributes.len() * names.len() * self.templates.len());
        for attribute in attributes {
            let attribute = attribute.as_ref();
            for name in names {
                let name = name.as_ref();
                for template in &self.templates {
                    records.push(SentenceRecord {
                        attribute: attribute.to_string(),
                        noun: name.to_string(),
                        template_id: template.id.clone(),
                        sentence: template.resolve(name, attribute, agreement)?,
                        group: group.clone(),
                    });
                }
            }
        }
        Ok(records)
    }

    fn catalog_attribute<'a>(&'a self, template: &SentenceTemplate, group: &Group) -> Result<&'a str> {
        match template.attribute_index {
            Some(index) => self.catalog.attribute(group, index),
            None if template.uses_attribute() => Err(Error::TemplateBinding(format!(
                "template '{}' has an attribute slot but no attribute index",
                template.id
            ))),
            None => Ok(""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single_template_engine() -> TemplateEngine {
        let catalog = AttributeCatalog::builder()
            .group(Group::Male, ["man"])
            .group(Group::Female, ["woman"])
            .group(Group::Neutral, ["person"])
            .nouns(["doctor"])
            .build()
            .unwrap();
        let template = SentenceTemplate::named("is-a", "The {noun} is a {attribute}", Some(0)).unwrap();
        TemplateEngine::new(catalog, vec![template]).unwrap()
    }

    #[test]
    fn test_minimal_scenario_sentences() {
        let engine = single_template_engine();
        let nouns = ["doctor"];
        assert_eq!(engine.generate(&Group::Male, &nouns).unwrap(), vec![Sentence::from("The doctor is a man")]);
        assert_eq!(engine.generate(&Group::Female, &nouns).unwrap(), vec![Sentence::from("The doctor is a woman")]);
        assert_eq!(engine.generate(&Group::Neutral, &nouns).unwrap(), vec![Sentence::from("The doctor is a person")]);
    }

    #[test]
    fn test_minimal_scenario_tuple() {
        let engine = single_template_engine();
        let tuples = engine.generate_comparison_tuples(&["doctor"]).unwrap();
        assert_eq!(tuples.len(), 1);
        assert_eq!(
            tuples[0].as_strs(),
            ("The doctor is a man", "The doctor is a woman", "The doctor is a person")
        );
    }

    #[test]
    fn test_parse_escaped_braces() {
        let t = SentenceTemplate::named("esc", "{{literal}} {noun}", None).unwrap();
        assert_eq!(t.placeholder_count(), 1);
        assert_eq!(t.render(&["x"]).unwrap().as_str(), "{literal} x");
    }

    #[test]
    fn test_unclosed_and_unmatched_braces() {
        assert!(matches!(
            SentenceTemplate::named("bad", "The {noun", None),
            Err(Error::TemplateBinding(_))
        ));
        assert!(matches!(
            SentenceTemplate::named("bad", "The noun}", None),
            Err(Error::TemplateBinding(_))
        ));
    }

    #[test]
    fn test_role_count_mismatch() {
        let err = SentenceTemplate::positional("t", "The {} is a {}", vec![SlotRole::Noun], Some(0))
            .unwrap_err();
        assert!(matches!(err, Error::TemplateBinding(_)));
    }

    #[test]
    fn test_named_role_conflict() {
        let err = SentenceTemplate::positional(
            "t",
            "The {noun} is a {}",
            vec![SlotRole::Attribute, SlotRole::Noun],
            Some(0),
        )
        .unwrap_err();
        assert!(matches!(err, Error::TemplateBinding(_)));
    }

    #[test]
    fn test_unknown_slot_name() {
        assert!(matches!(
            SentenceTemplate::named("t", "The {colour} car", None),
            Err(Error::TemplateBinding(_))
        ));
    }

    #[test]
    fn test_render_argument_count_checked() {
        let t = SentenceTemplate::named("t", "The {noun} is a {attribute}", Some(0)).unwrap();
        assert!(matches!(t.render(&["doctor"]), Err(Error::TemplateBinding(_))));
        assert!(matches!(t.render(&["a", "b", "c"]), Err(Error::TemplateBinding(_))));
    }

    #[test]
    fn test_attribute_index_out_of_bounds_rejected() {
        let template = SentenceTemplate::named("t", "The {noun} is a {attribute}", Some(8)).unwrap();
        let err = TemplateEngine::new(AttributeCatalog::gendered_terms(), vec![template]).unwrap_err();
        assert!(matches!(err, Error::TemplateBinding(_)));
    }

    #[test]
    fn test_attribute_slot_without_index_rejected() {
        let template = SentenceTemplate::named("t", "The {noun} is a {attribute}", None).unwrap();
        let engine = TemplateEngine::new(AttributeCatalog::gendered_terms(), vec![template]).unwrap();
        assert!(matches!(
            engine.generate(&Group::Male, &["doctor"]),
            Err(Error::TemplateBinding(_))
        ));
    }

    #[test]
    fn test_default_templates_placeholder_counts() {
        let templates = default_templates().unwrap();
        assert_eq!(templates.len(), 8);
        let engine = TemplateEngine::gendered_terms().unwrap();
        for group in Group::CANONICAL {
            let sentences = engine.generate(&group, &["doctor"]).unwrap();
            for (template, sentence) in templates.iter().zip(&sentences) {
                let literal_braces = template.pattern().matches("{}").count();
                assert_eq!(literal_braces, template.placeholder_count());
                assert!(!sentence.as_str().contains('{'), "{sentence}");
            }
        }
    }

    #[test]
    fn test_builtin_template_sets_load_fully() {
        let ids: Vec<String> = default_templates()
            .unwrap()
            .iter()
            .map(|t| t.id().to_string())
            .collect();
        assert_eq!(ids, ["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"]);

        let occupation = occupation_templates().unwrap();
        assert_eq!(occupation.len(), 3);
        assert!(occupation.iter().all(|t| t.attribute_index().is_none() && t.uses_attribute()));
    }

    #[test]
    fn test_agreement_slot() {
        let engine = TemplateEngine::gendered_terms().unwrap();
        let male = engine.generate(&Group::Male, &["doctor"]).unwrap();
        let neutral = engine.generate(&Group::Neutral, &["doctor"]).unwrap();
        assert_eq!(male[4].as_str(), "The doctor said he is tired");
        assert_eq!(neutral[4].as_str(), "The doctor said they are tired");
        assert_eq!(male[0].as_str(), "The male doctor called");
    }

    #[test]
    fn test_generate_order_nouns_outer() {
        let engine = TemplateEngine::gendered_terms().unwrap();
        let sentences = engine.generate(&Group::Female, &["doctor", "nurse"]).unwrap();
        assert_eq!(sentences.len(), 16);
        assert!(sentences[..8].iter().all(|s| s.as_str().contains("doctor")));
        assert!(sentences[8..].iter().all(|s| s.as_str().contains("nurse")));
        assert_eq!(sentences[1].as_str(), "The doctor is a woman");
        assert_eq!(sentences[2].as_str(), "The doctor is a girl");
    }

    #[test]
    fn test_generate_is_deterministic() {
        let engine = TemplateEngine::gendered_terms().unwrap();
        let nouns = engine.catalog().nouns().to_vec();
        let a = engine.generate(&Group::Neutral, &nouns).unwrap();
        let b = engine.generate(&Group::Neutral, &nouns).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_group_fails() {
        let engine = TemplateEngine::gendered_terms().unwrap();
        assert!(matches!(
            engine.generate(&Group::Custom("robot".into()), &["doctor"]),
            Err(Error::InvalidGroup(_))
        ));
    }

    #[test]
    fn test_tuples_differ_only_in_attribute_and_agreement() {
        let engine = TemplateEngine::gendered_terms().unwrap();
        let catalog = engine.catalog();
        let nouns = catalog.nouns().to_vec();
        let tuples = engine.generate_comparison_tuples(&nouns).unwrap();
        assert_eq!(tuples.len(), nouns.len() * 8);

        for (tuple, template) in tuples.iter().zip(engine.templates().iter().cycle()) {
            let index = template.attribute_index().unwrap();
            let allowed: Vec<&str> = Group::CANONICAL
                .iter()
                .map(|g| catalog.attribute(g, index).unwrap())
                .chain(["is", "are"])
                .collect();

            let [m, f, n] = tuple.sentences().map(|s| s.as_str().split(' ').collect::<Vec<_>>());
            assert_eq!(m.len(), n.len());
            assert_eq!(f.len(), n.len());
            for ((wm, wf), wn) in m.iter().zip(&f).zip(&n) {
                if wm != wn || wf != wn {
                    assert!(allowed.contains(wm) && allowed.contains(wf) && allowed.contains(wn));
                }
            }
            assert!(tuple.sentences().iter().all(|s| s.as_str().contains(&tuple.noun)));
        }
    }

    #[test]
    fn test_tuples_agree_with_generate() {
        let engine = TemplateEngine::gendered_terms().unwrap();
        let nouns = ["lawyer", "artist"];
        let tuples = engine.generate_comparison_tuples(&nouns).unwrap();
        let male = engine.generate(&Group::Male, &nouns).unwrap();
        let female = engine.generate(&Group::Female, &nouns).unwrap();
        let neutral = engine.generate(&Group::Neutral, &nouns).unwrap();
        for (i, tuple) in tuples.iter().enumerate() {
            assert_eq!(tuple.male, male[i]);
            assert_eq!(tuple.female, female[i]);
            assert_eq!(tuple.neutral, neutral[i]);
        }
    }

    #[test]
    fn test_generate_cross_order() {
        let engine = TemplateEngine::new(AttributeCatalog::default(), occupation_templates().unwrap()).unwrap();
        let records = engine
            .generate_cross(&Group::Female, &["nurse", "pilot"], &["Emma", "Olivia"])
            .unwrap();
        assert_eq!(records.len(), 12);
        assert_eq!(records[0].sentence.as_str(), "Emma is a nurse");
        assert_eq!(records[1].sentence.as_str(), "Emma works as a nurse");
        assert_eq!(records[2].sentence.as_str(), "Emma retired from being a nurse");
        assert_eq!(records[3].sentence.as_str(), "Olivia is a nurse");
        assert_eq!(records[6].sentence.as_str(), "Emma is a pilot");
        assert!(records.iter().all(|r| r.group == Group::Female));
        assert_eq!(records[6].attribute, "pilot");
        assert_eq!(records[6].noun, "Emma");
    }
}
