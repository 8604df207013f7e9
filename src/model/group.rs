//! Groups and their verb agreement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A target group that attributes and sentences belong to.
///
/// The three canonical groups drive the comparison-tuple experiment.
/// `Custom` covers open-ended categories such as occupation buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Male,
    Female,
    Neutral,
    Custom(String),
}

/// Export labels of the canonical groups. A custom group may not use one,
/// or its rows would read back as the canonical group.
const CANONICAL_LABELS: [&str; 3] = ["M", "F", "X"];

impl Group {
    /// The canonical (male, female, neutral) ordering used by comparison tuples.
    pub const CANONICAL: [Group; 3] = [Group::Male, Group::Female, Group::Neutral];

    /// Lookup name, as accepted by `FromStr`.
    pub fn name(&self) -> &str {
        match self {
            Group::Male => "male",
            Group::Female => "female",
            Group::Neutral => "neutral",
            Group::Custom(name) => name,
        }
    }

    /// Short label written to the export's group column.
    pub fn label(&self) -> &str {
        match self {
            Group::Male => "M",
            Group::Female => "F",
            Group::Neutral => "X",
            Group::Custom(name) => name,
        }
    }

    pub fn is_canonical(&self) -> bool {
        !matches!(self, Group::Custom(_))
    }

    /// Reject custom groups whose export label would be ambiguous: empty
    /// names and the canonical labels.
    pub fn check_label(&self) -> Result<()> {
        match self {
            Group::Custom(name) if name.trim().is_empty() => {
                Err(Error::InvalidGroup(format!("empty custom group name {name:?}")))
            }
            Group::Custom(name) if CANONICAL_LABELS.contains(&name.as_str()) => Err(
                Error::InvalidGroup(format!("custom group '{name}' collides with a canonical export label")),
            ),
            _ => Ok(()),
        }
    }

    /// Agreement policy for the canonical groups: a single referent agrees
    /// with "is", the collective neutral referent with "are".
    pub fn default_agreement(&self) -> Option<Agreement> {
        match self {
            Group::Male | Group::Female => Some(Agreement::Singular),
            Group::Neutral => Some(Agreement::Plural),
            Group::Custom(_) => None,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Group {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidGroup(s.to_string()));
        }
        let group = match trimmed.to_ascii_lowercase().as_str() {
            "male" => Group::Male,
            "female" => Group::Female,
            "neutral" => Group::Neutral,
            _ => Group::Custom(trimmed.to_string()),
        };
        group.check_label()?;
        Ok(group)
    }
}

/// Verb agreement form substituted into the `adjective` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Agreement {
    /// Single referent: "is".
    Singular,
    /// Collective or plural referent: "are".
    Plural,
}

impl Agreement {
    pub fn as_str(self) -> &'static str {
        match self {
            Agreement::Singular => "is",
            Agreement::Plural => "are",
        }
    }
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
