//! Closed vocabularies used across the schema.
//!
//! Each vocabulary is a fixed set of lowercase wire tags. Validation rejects
//! any tag outside the set with a shape error that lists the allowed values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A closed set of string tags with a 1:1 mapping onto enum variants.
pub trait TagSet: Sized + Copy + PartialEq + 'static {
    /// Human-readable name of the vocabulary, used in error messages.
    const NAME: &'static str;
    /// Every accepted wire tag paired with its variant.
    const TAGS: &'static [(&'static str, Self)];

    fn from_tag(tag: &str) -> Option<Self> {
        Self::TAGS
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| *v)
    }

    fn tag(self) -> &'static str {
        Self::TAGS
            .iter()
            .find(|(_, v)| *v == self)
            .map(|(t, _)| *t)
            .unwrap_or("?")
    }

    /// Allowed tags joined for display, e.g. `en|id`.
    fn allowed() -> String {
        Self::TAGS
            .iter()
            .map(|(t, _)| *t)
            .collect::<Vec<_>>()
            .join("|")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{found}` is not a valid {vocabulary} (expected one of {allowed})")]
pub struct UnknownTag {
    pub vocabulary: &'static str,
    pub found: String,
    pub allowed: String,
}

fn parse_tag<T: TagSet>(s: &str) -> Result<T, UnknownTag> {
    T::from_tag(s).ok_or_else(|| UnknownTag {
        vocabulary: T::NAME,
        found: s.to_string(),
        allowed: T::allowed(),
    })
}

// ============================================================================
// Language
// ============================================================================

/// Languages the admin panel manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Id,
}

impl TagSet for Language {
    const NAME: &'static str = "language";
    const TAGS: &'static [(&'static str, Self)] = &[("en", Language::En), ("id", Language::Id)];
}

impl FromStr for Language {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_tag(s)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// CEFR level
// ============================================================================

/// Common European Framework proficiency band, used both for sense-level
/// difficulty and for assessed definition difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl TagSet for CefrLevel {
    const NAME: &'static str = "CEFR level";
    const TAGS: &'static [(&'static str, Self)] = &[
        ("A1", CefrLevel::A1),
        ("A2", CefrLevel::A2),
        ("B1", CefrLevel::B1),
        ("B2", CefrLevel::B2),
        ("C1", CefrLevel::C1),
        ("C2", CefrLevel::C2),
    ];
}

impl FromStr for CefrLevel {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_tag(s)
    }
}

// ============================================================================
// Image kind
// ============================================================================

/// Where a link-chain image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Generated,
    Uploaded,
    Stock,
    /// Synthesized stand-in when the producer supplied no usable image.
    Placeholder,
}

impl TagSet for ImageKind {
    const NAME: &'static str = "image type";
    const TAGS: &'static [(&'static str, Self)] = &[
        ("generated", ImageKind::Generated),
        ("uploaded", ImageKind::Uploaded),
        ("stock", ImageKind::Stock),
        ("placeholder", ImageKind::Placeholder),
    ];
}

impl FromStr for ImageKind {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_tag(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_serde() {
        for (tag, lang) in Language::TAGS {
            let json = serde_json::to_value(lang).unwrap();
            assert_eq!(json, serde_json::Value::String(tag.to_string()));
        }
        for (tag, kind) in ImageKind::TAGS {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(tag.to_string()));
        }
        let level: CefrLevel = serde_json::from_str("\"B2\"").unwrap();
        assert_eq!(level, CefrLevel::B2);
    }

    #[test]
    fn unknown_tag_lists_allowed_values() {
        let err = "fr".parse::<Language>().unwrap_err();
        assert_eq!(err.allowed, "en|id");
        assert!(err.to_string().contains("`fr`"));
    }
}
