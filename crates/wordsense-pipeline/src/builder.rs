//! Two-phase construction of a [`Word`] aggregate.
//!
//! ```text
//!   WordBuilder (Collecting) ──finalize()──► Finalized ──validate()──► Ok(Word)
//!        push_sense(..)                        word_id assigned         │
//!        (no validation)                       base_word_id injected    └──► Err(ValidationReport)
//! ```
//!
//! A sense cannot be validated while collecting because its `base_word_id`
//! does not exist yet. Senses stay plain mappings until [`WordBuilder::finalize`]
//! has fixed the word id and written it into every one of them; only then does
//! a single recursive pass type-check the whole aggregate.
//!
//! `finalize` consumes the builder, so nothing can be added after the id is
//! injected.

use crate::config::PipelineConfig;
use crate::error::ValidationReport;
use crate::reconcile::Mapping;
use crate::validate::Validator;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wordsense_schema::{EnrichmentInfo, Word, WordId};

/// Keys the builder owns on the word mapping. Caller-supplied values for
/// these are overwritten at finalize time.
const BUILDER_OWNED: &[&str] = &[
    "word_id",
    "senses",
    "enrichment_info",
    "created_at",
    "updated_at",
];

/// How an amendment treats the senses already on the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseMerge {
    /// New senses supersede all existing ones.
    Replace,
    /// New senses are added after the existing ones.
    Append,
}

#[derive(Debug, Clone, PartialEq)]
enum Identity {
    Fresh,
    Assigned(WordId),
    Existing {
        word_id: WordId,
        created_at: DateTime<Utc>,
        history: Vec<EnrichmentInfo>,
    },
}

/// Collecting phase.
#[derive(Debug, Clone)]
pub struct WordBuilder {
    fields: Mapping,
    senses: Vec<Mapping>,
    identity: Identity,
    batch: Option<EnrichmentInfo>,
    stamped_at: DateTime<Utc>,
    /// Seeds derived child ids; fresh per builder so ids never repeat across
    /// finalizes of the same word.
    episode: Uuid,
    validator: Validator,
}

impl WordBuilder {
    /// Start a new word from word-level scalar fields (headword, language,
    /// categories, ...).
    pub fn new(fields: Mapping, config: &PipelineConfig) -> Self {
        Self {
            fields,
            senses: Vec::new(),
            identity: Identity::Fresh,
            batch: None,
            stamped_at: Utc::now(),
            episode: Uuid::new_v4(),
            validator: Validator::new(config),
        }
    }

    /// Start an amendment of an existing, already validated word.
    ///
    /// The word id, `created_at` and enrichment history are kept. With
    /// [`SenseMerge::Append`] the existing senses are collected again as
    /// mappings and re-validated alongside the new ones.
    pub fn amend(
        existing: &Word,
        merge: SenseMerge,
        config: &PipelineConfig,
    ) -> Result<Self, serde_json::Error> {
        let mut fields = match serde_json::to_value(existing)? {
            Value::Object(map) => map,
            _ => Mapping::new(),
        };
        let prior_senses = fields.remove("senses");
        for key in BUILDER_OWNED {
            fields.remove(*key);
        }

        let senses = match (merge, prior_senses) {
            (SenseMerge::Append, Some(Value::Array(items))) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(m) => Some(m),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            fields,
            senses,
            identity: Identity::Existing {
                word_id: existing.word_id,
                created_at: existing.created_at,
                history: existing.enrichment_info.clone(),
            },
            batch: None,
            stamped_at: Utc::now(),
            episode: Uuid::new_v4(),
            validator: Validator::new(config),
        })
    }

    /// Use a caller-chosen id instead of generating one.
    pub fn with_word_id(mut self, word_id: WordId) -> Self {
        self.identity = match self.identity {
            Identity::Existing {
                created_at,
                history,
                ..
            } => Identity::Existing {
                word_id,
                created_at,
                history,
            },
            _ => Identity::Assigned(word_id),
        };
        self
    }

    /// Fix the timestamp used for `updated_at` (and `created_at` on new words).
    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.stamped_at = when;
        self
    }

    /// Record this episode in the word's enrichment history.
    pub fn record_batch(mut self, batch_id: impl Into<String>, tags: Option<Vec<String>>) -> Self {
        self.batch = Some(EnrichmentInfo {
            batch_id: batch_id.into(),
            timestamp: self.stamped_at,
            tags,
        });
        self
    }

    /// Override or add a word-level field.
    pub fn set_field(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// Collect a reconciled sense. Not validated here.
    pub fn push_sense(&mut self, sense: Mapping) {
        self.senses.push(sense);
    }

    pub fn extend_senses(&mut self, senses: impl IntoIterator<Item = Mapping>) {
        self.senses.extend(senses);
    }

    /// Assign the word id and inject it into every collected sense.
    pub fn finalize(self) -> Finalized {
        let (word_id, created_at, mut history) = match self.identity {
            Identity::Fresh => (Uuid::new_v4(), self.stamped_at, Vec::new()),
            Identity::Assigned(id) => (id, self.stamped_at, Vec::new()),
            Identity::Existing {
                word_id,
                created_at,
                history,
            } => (word_id, created_at, history),
        };
        if let Some(mut batch) = self.batch {
            batch.timestamp = self.stamped_at;
            history.push(batch);
        }

        let mut senses = self.senses;
        inject_parent(&mut senses, word_id, &self.episode.to_string());

        if senses.is_empty() {
            tracing::warn!(%word_id, "finalizing word with no senses");
        }
        tracing::debug!(%word_id, senses = senses.len(), "finalized word");

        let mut word = self.fields;
        for key in BUILDER_OWNED {
            if word.remove(*key).is_some() {
                tracing::debug!(field = *key, "overriding caller-supplied builder field");
            }
        }
        word.insert("word_id".to_string(), json!(word_id));
        word.insert(
            "senses".to_string(),
            Value::Array(senses.into_iter().map(Value::Object).collect()),
        );
        word.insert(
            "enrichment_info".to_string(),
            Value::Array(history.iter().map(history_entry).collect()),
        );
        word.insert("created_at".to_string(), json!(timestamp(created_at)));
        word.insert("updated_at".to_string(), json!(timestamp(self.stamped_at)));

        Finalized {
            word_id,
            word,
            validator: self.validator,
        }
    }

    /// Finalize then validate.
    pub fn build(self) -> Result<Word, ValidationReport> {
        self.finalize().validate()
    }
}

/// Finalized, not yet validated. Validation may be repeated and always
/// yields the same result.
#[derive(Debug, Clone)]
pub struct Finalized {
    word_id: WordId,
    word: Mapping,
    validator: Validator,
}

impl Finalized {
    pub fn word_id(&self) -> WordId {
        self.word_id
    }

    /// The complete word mapping that [`validate`](Self::validate) checks.
    pub fn mapping(&self) -> &Mapping {
        &self.word
    }

    pub fn senses(&self) -> impl Iterator<Item = &Mapping> {
        self.word
            .get("senses")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
    }

    pub fn validate(&self) -> Result<Word, ValidationReport> {
        let result = self.validator.word(&Value::Object(self.word.clone()));
        if let Err(report) = &result {
            tracing::warn!(
                word_id = %self.word_id,
                issues = report.len(),
                disposition = ?report.disposition(),
                "word failed validation"
            );
        }
        result
    }
}

/// Write `word_id` into every sense as `base_word_id`, and give senses and
/// link chains that lack one a deterministic id derived from the word id and
/// `seed`.
///
/// Idempotent: running it twice with the same id and seed changes nothing the
/// second time.
pub fn inject_parent(senses: &mut [Mapping], word_id: WordId, seed: &str) {
    for (i, sense) in senses.iter_mut().enumerate() {
        sense.insert("base_word_id".to_string(), json!(word_id));
        let sense_label = format!("{seed}/sense/{i}");
        fill_id(sense, "sense_id", word_id, &sense_label);

        if let Some(Value::Array(chains)) = sense.get_mut("link_chain_variations") {
            for (j, chain) in chains.iter_mut().enumerate() {
                if let Value::Object(chain) = chain {
                    fill_id(chain, "chain_id", word_id, &format!("{sense_label}/chain/{j}"));
                }
            }
        }
    }
}

fn fill_id(map: &mut Mapping, key: &str, word_id: WordId, label: &str) {
    if matches!(map.get(key), None | Some(Value::Null)) {
        let id = Uuid::new_v5(&word_id, label.as_bytes());
        map.insert(key.to_string(), json!(id));
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn history_entry(info: &EnrichmentInfo) -> Value {
    let mut entry = json!({
        "batch_id": info.batch_id,
        "timestamp": timestamp(info.timestamp),
    });
    if let (Some(tags), Value::Object(map)) = (&info.tags, &mut entry) {
        map.insert("tags".to_string(), json!(tags));
    }
    entry
}
