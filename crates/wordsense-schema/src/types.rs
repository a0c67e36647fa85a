//! Strict entity shapes.
//!
//! These are the types everything outside the enrichment pipeline works
//! with. Every required field is required here; optional fields are optional
//! because the domain allows their absence, not because a producer is
//! unreliable. Producer unreliability lives in [`crate::producer`].

use crate::vocab::{CefrLevel, ImageKind, Language};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier of a [`Word`] aggregate.
pub type WordId = Uuid;

/// Identifier of a [`Sense`].
pub type SenseId = Uuid;

/// Identifier of a [`LinkChain`].
pub type ChainId = Uuid;

// ============================================================================
// Word (aggregate root)
// ============================================================================

/// A headword and everything known about it.
///
/// Invariant: every `senses[i].base_word_id == word_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word_id: WordId,
    pub headword: String,
    pub language: Language,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<Pronunciation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register: Option<String>,
    #[serde(default)]
    pub etymology: BTreeMap<Language, String>,
    #[serde(default)]
    pub collocations: BTreeMap<Language, Vec<String>>,
    #[serde(default)]
    pub usage_notes: BTreeMap<Language, String>,
    #[serde(default)]
    pub senses: Vec<Sense>,
    #[serde(default)]
    pub enrichment_info: Vec<EnrichmentInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Word {
    /// True when every sense points back at this word.
    pub fn is_consistent(&self) -> bool {
        self.senses.iter().all(|s| s.base_word_id == self.word_id)
    }

    pub fn link_chain_count(&self) -> usize {
        self.senses.iter().map(|s| s.link_chain_variations.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pronunciation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic_spelling: Option<String>,
}

/// One entry in a word's append-only enrichment history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentInfo {
    pub batch_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

// ============================================================================
// Sense
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sense {
    pub sense_id: SenseId,
    /// Owning word. Never absent once validated.
    pub base_word_id: WordId,
    pub part_of_speech: String,
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default)]
    pub translations: BTreeMap<Language, Vec<TranslationDetail>>,
    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sense_register: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sense_collocations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sense_semantic_relations: Option<SemanticRelations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_forms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cefr_level: Option<CefrLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<Pronunciation>,
    #[serde(default)]
    pub link_chain_variations: Vec<LinkChain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub language: Language,
    pub text: String,
    /// Assessed difficulty of the definition text itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<CefrLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationDetail {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nuance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub text: String,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SemanticRelations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synonyms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antonyms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_concepts: Option<Vec<String>>,
}

// ============================================================================
// LinkChain (mnemonic)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkChain {
    pub chain_id: ChainId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllables: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllable_links: Option<Vec<SyllableLink>>,
    pub narrative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhyme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub image_data: ImageData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_used: Option<String>,
    #[serde(default)]
    pub feedback: BTreeMap<Language, FeedbackCounts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllableLink {
    pub syllable: String,
    /// Should be concrete and imageable.
    pub keyword_noun: String,
    pub keyword_language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(rename = "type")]
    pub kind: ImageKind,
    pub url: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_attribution: Option<String>,
}

impl ImageData {
    pub fn is_placeholder(&self) -> bool {
        self.kind == ImageKind::Placeholder
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedbackCounts {
    #[serde(default)]
    pub helpful: u32,
    #[serde(default)]
    pub not_helpful: u32,
}
