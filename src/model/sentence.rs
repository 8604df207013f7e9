//! Generated sentences, comparison tuples and export rows.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Group;

/// A fully resolved sentence.
///
/// The surface string is the only identity: two sentences are the same
/// entity exactly when their strings are equal. It is also the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sentence(String);

impl Sentence {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Sentence {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Sentence {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Sentence {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for Sentence {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Sentence {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Matched (male, female, neutral) sentences built from the same template
/// and noun. Only the attribute and agreement words differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonTuple {
    pub template_id: String,
    pub noun: String,
    pub male: Sentence,
    pub female: Sentence,
    pub neutral: Sentence,
}

impl ComparisonTuple {
    /// The three sentences in canonical order.
    pub fn sentences(&self) -> [&Sentence; 3] {
        [&self.male, &self.female, &self.neutral]
    }

    pub fn as_strs(&self) -> (&str, &str, &str) {
        (self.male.as_str(), self.female.as_str(), self.neutral.as_str())
    }
}

/// One exported row per generated sentence.
///
/// Column order matches the delimited export consumed by reporting tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub attribute: String,
    pub noun: String,
    #[serde(rename = "template")]
    pub template_id: String,
    pub sentence: Sentence,
    #[serde(with = "group_label")]
    pub group: Group,
}

/// Serializes a `Group` as its short export label ("M", "F", "X", or the
/// custom name) and parses it back.
mod group_label {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::model::Group;

    pub fn serialize<S: Serializer>(group: &Group, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(group.label())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Group, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(match label.as_str() {
            "M" => Group::Male,
            "F" => Group::Female,
            "X" => Group::Neutral,
            _ => Group::Custom(label),
        })
    }
}
