//! Strict-shape validation of plain mappings.
//!
//! One recursive pass over a `serde_json::Value` builds the typed record
//! bottom-up. Every problem is recorded with its path and the walk keeps
//! going, so sibling senses and chains are all reported in the same pass.
//! A typed value is only returned when the whole tree was clean.
//!
//! A sense mapping validated on its own must already carry `base_word_id`.
//! Inside the pipeline that is only true after
//! [`Finalized`](crate::builder::Finalized) has injected it; validating a
//! collected sense earlier reports `RequiredFieldMissing` for that field.

use crate::config::{PipelineConfig, UnknownFieldPolicy};
use crate::error::{FieldError, FieldPath, ValidationReport};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;
use wordsense_schema::{
    CefrLevel, Definition, EnrichmentInfo, Example, FeedbackCounts, ImageData, ImageKind,
    Language, LinkChain, Pronunciation, SemanticRelations, Sense, SyllableLink, TagSet,
    TranslationDetail, Word,
};

// ============================================================================
// Public entry points
// ============================================================================

#[derive(Debug, Clone)]
pub struct Validator {
    unknown_fields: UnknownFieldPolicy,
    max_link_chains: Option<usize>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl Validator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            unknown_fields: config.unknown_fields,
            max_link_chains: config.max_link_chains_per_sense,
        }
    }

    /// Validate a complete word mapping, including every sense it owns.
    pub fn word(&self, value: &Value) -> Result<Word, ValidationReport> {
        let label = match value.get("headword").and_then(Value::as_str) {
            Some(h) => format!("word {h:?}"),
            None => "word".to_string(),
        };
        self.run(label, value)
    }

    pub fn sense(&self, value: &Value) -> Result<Sense, ValidationReport> {
        self.run("sense".to_string(), value)
    }

    pub fn link_chain(&self, value: &Value) -> Result<LinkChain, ValidationReport> {
        self.run("link chain".to_string(), value)
    }

    fn run<T: Validate>(&self, label: String, value: &Value) -> Result<T, ValidationReport> {
        let mut cx = Cx {
            unknown_fields: self.unknown_fields,
            max_link_chains: self.max_link_chains,
            report: ValidationReport::new(label),
        };
        let typed = T::validate(value, &FieldPath::root(), &mut cx);
        match typed {
            Some(t) if cx.report.is_empty() => Ok(t),
            _ => Err(cx.report),
        }
    }
}

// ============================================================================
// Machinery
// ============================================================================

pub(crate) struct Cx {
    unknown_fields: UnknownFieldPolicy,
    max_link_chains: Option<usize>,
    report: ValidationReport,
}

impl Cx {
    fn fail(&mut self, path: FieldPath, error: FieldError) {
        self.report.push(path, error);
    }
}

/// Build `Self` from a mapping value, recording every problem found.
///
/// Returns `None` iff at least one issue was recorded for this subtree.
pub(crate) trait Validate: Sized {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self>;
}

fn kind_of(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(_) => "boolean".into(),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "array".into(),
        Value::Object(_) => "object".into(),
    }
}

/// Field reader over one object, tracking which keys were consumed.
struct Record<'v, 'c> {
    entity: &'static str,
    map: &'v Map<String, Value>,
    path: FieldPath,
    cx: &'c mut Cx,
    seen: Vec<&'static str>,
    ok: bool,
}

impl<'v, 'c> Record<'v, 'c> {
    fn open(
        entity: &'static str,
        value: &'v Value,
        path: &FieldPath,
        cx: &'c mut Cx,
    ) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self {
                entity,
                map,
                path: path.clone(),
                cx,
                seen: Vec::new(),
                ok: true,
            }),
            other => {
                cx.fail(
                    path.clone(),
                    FieldError::shape(format!("object ({entity})"), kind_of(other)),
                );
                None
            }
        }
    }

    fn present(&mut self, key: &'static str) -> Option<&'v Value> {
        self.seen.push(key);
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }

    fn nested<T: Validate>(&mut self, key: &'static str, value: &Value) -> Option<T> {
        let typed = T::validate(value, &self.path.field(key), self.cx);
        if typed.is_none() {
            self.ok = false;
        }
        typed
    }

    fn required<T: Validate>(&mut self, key: &'static str) -> Option<T> {
        match self.present(key) {
            Some(v) => self.nested(key, v),
            None => {
                self.cx.fail(
                    self.path.field(key),
                    FieldError::RequiredFieldMissing {
                        field: key.to_string(),
                    },
                );
                self.ok = false;
                None
            }
        }
    }

    fn optional<T: Validate>(&mut self, key: &'static str) -> Option<T> {
        let v = self.present(key)?;
        self.nested(key, v)
    }

    fn or_default<T: Validate + Default>(&mut self, key: &'static str) -> T {
        self.optional(key).unwrap_or_default()
    }

    fn check_url(&mut self, key: &'static str, url: &str) {
        if url::Url::parse(url).is_err() {
            self.cx.fail(
                self.path.field(key),
                FieldError::shape("absolute URL", format!("string {url:?}")),
            );
            self.ok = false;
        }
    }

    /// Close the record. `Some(())` iff every read succeeded and no
    /// undeclared field is present (under the reject policy).
    fn finish(self) -> Option<()> {
        let mut ok = self.ok;
        for key in self.map.keys() {
            if self.seen.iter().any(|s| *s == key.as_str()) {
                continue;
            }
            match self.cx.unknown_fields {
                UnknownFieldPolicy::Reject => {
                    self.cx.fail(
                        self.path.field(key),
                        FieldError::UnexpectedField {
                            entity: self.entity,
                            field: key.clone(),
                        },
                    );
                    ok = false;
                }
                UnknownFieldPolicy::Ignore => {
                    tracing::debug!(entity = self.entity, field = %key, "ignoring undeclared field");
                }
            }
        }
        ok.then_some(())
    }
}

// ============================================================================
// Primitives
// ============================================================================

impl Validate for String {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            other => {
                cx.fail(path.clone(), FieldError::shape("string", kind_of(other)));
                None
            }
        }
    }
}

impl Validate for u32 {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        match value.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                cx.fail(
                    path.clone(),
                    FieldError::shape("non-negative integer", kind_of(value)),
                );
                None
            }
        }
    }
}

impl Validate for f64 {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        match value.as_f64() {
            Some(n) => Some(n),
            None => {
                cx.fail(path.clone(), FieldError::shape("number", kind_of(value)));
                None
            }
        }
    }
}

impl Validate for Uuid {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        match value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => Some(id),
            None => {
                cx.fail(path.clone(), FieldError::shape("UUID string", kind_of(value)));
                None
            }
        }
    }
}

impl Validate for DateTime<Utc> {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let parsed = value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        if parsed.is_none() {
            cx.fail(
                path.clone(),
                FieldError::shape("RFC 3339 timestamp", kind_of(value)),
            );
        }
        parsed
    }
}

fn validate_tag<T: TagSet>(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<T> {
    match value.as_str().and_then(T::from_tag) {
        Some(t) => Some(t),
        None => {
            cx.fail(
                path.clone(),
                FieldError::shape(
                    format!("{} (one of {})", T::NAME, T::allowed()),
                    kind_of(value),
                ),
            );
            None
        }
    }
}

macro_rules! tag_validate {
    ($($ty:ty),* $(,)?) => {$(
        impl Validate for $ty {
            fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
                validate_tag(value, path, cx)
            }
        }
    )*};
}

tag_validate!(Language, CefrLevel, ImageKind);

impl<T: Validate> Validate for Vec<T> {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let Value::Array(items) = value else {
            cx.fail(path.clone(), FieldError::shape("array", kind_of(value)));
            return None;
        };
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match T::validate(item, &path.index(i), cx) {
                Some(t) => out.push(t),
                None => ok = false,
            }
        }
        ok.then_some(out)
    }
}

impl<T: Validate> Validate for BTreeMap<Language, T> {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let Value::Object(entries) = value else {
            cx.fail(
                path.clone(),
                FieldError::shape("object keyed by language", kind_of(value)),
            );
            return None;
        };
        let mut out = BTreeMap::new();
        let mut ok = true;
        for (key, item) in entries {
            let entry_path = path.field(key);
            let Some(lang) = Language::from_tag(key) else {
                cx.fail(
                    entry_path,
                    FieldError::shape(
                        format!("language key (one of {})", Language::allowed()),
                        format!("key {key:?}"),
                    ),
                );
                ok = false;
                continue;
            };
            match T::validate(item, &entry_path, cx) {
                Some(t) => {
                    out.insert(lang, t);
                }
                None => ok = false,
            }
        }
        ok.then_some(out)
    }
}

// ============================================================================
// Entities
// ============================================================================

impl Validate for Word {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("Word", value, path, cx)?;
        let word_id = r.required::<Uuid>("word_id");
        let headword = r.required::<String>("headword");
        let language = r.required::<Language>("language");
        let categories = r.or_default::<Vec<String>>("categories");
        let pronunciation = r.optional::<Pronunciation>("pronunciation");
        let frequency_rank = r.optional::<u32>("frequency_rank");
        let register = r.optional::<String>("register");
        let etymology = r.or_default::<BTreeMap<Language, String>>("etymology");
        let collocations = r.or_default::<BTreeMap<Language, Vec<String>>>("collocations");
        let usage_notes = r.or_default::<BTreeMap<Language, String>>("usage_notes");
        let senses = r.or_default::<Vec<Sense>>("senses");
        let enrichment_info = r.or_default::<Vec<EnrichmentInfo>>("enrichment_info");
        let created_at = r.required::<DateTime<Utc>>("created_at");
        let updated_at = r.required::<DateTime<Utc>>("updated_at");
        let clean = r.finish();

        // Parent/child consistency can only be judged once both sides parsed.
        let mut consistent = true;
        if let Some(word_id) = word_id {
            for (i, sense) in senses.iter().enumerate() {
                if sense.base_word_id != word_id {
                    cx.fail(
                        path.field("senses").index(i).field("base_word_id"),
                        FieldError::ParentMismatch {
                            expected: word_id,
                            found: sense.base_word_id,
                        },
                    );
                    consistent = false;
                }
            }
        }
        clean?;
        if !consistent {
            return None;
        }

        Some(Word {
            word_id: word_id?,
            headword: headword?,
            language: language?,
            categories,
            pronunciation,
            frequency_rank,
            register,
            etymology,
            collocations,
            usage_notes,
            senses,
            enrichment_info,
            created_at: created_at?,
            updated_at: updated_at?,
        })
    }
}

impl Validate for Pronunciation {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("Pronunciation", value, path, cx)?;
        let ipa = r.optional::<String>("ipa");
        let audio_url = r.optional::<String>("audio_url");
        let phonetic_spelling = r.optional::<String>("phonetic_spelling");
        if let Some(url) = &audio_url {
            r.check_url("audio_url", url);
        }
        r.finish()?;
        Some(Pronunciation {
            ipa,
            audio_url,
            phonetic_spelling,
        })
    }
}

impl Validate for EnrichmentInfo {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("EnrichmentInfo", value, path, cx)?;
        let batch_id = r.required::<String>("batch_id");
        let timestamp = r.required::<DateTime<Utc>>("timestamp");
        let tags = r.optional::<Vec<String>>("tags");
        r.finish()?;
        Some(EnrichmentInfo {
            batch_id: batch_id?,
            timestamp: timestamp?,
            tags,
        })
    }
}

impl Validate for Sense {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let max_chains = cx.max_link_chains;
        let mut r = Record::open("Sense", value, path, cx)?;
        let sense_id = r.required::<Uuid>("sense_id");
        let base_word_id = r.required::<Uuid>("base_word_id");
        let part_of_speech = r.required::<String>("part_of_speech");
        let definitions = r.or_default::<Vec<Definition>>("definitions");
        let translations =
            r.or_default::<BTreeMap<Language, Vec<TranslationDetail>>>("translations");
        let examples = r.or_default::<Vec<Example>>("examples");
        let sense_register = r.optional::<String>("sense_register");
        let sense_collocations = r.optional::<Vec<String>>("sense_collocations");
        let sense_semantic_relations =
            r.optional::<SemanticRelations>("sense_semantic_relations");
        let related_forms = r.optional::<Vec<String>>("related_forms");
        let cefr_level = r.optional::<CefrLevel>("cefr_level");
        let usage_frequency = r.optional::<String>("usage_frequency");
        let pronunciation = r.optional::<Pronunciation>("pronunciation");
        let link_chain_variations = r.or_default::<Vec<LinkChain>>("link_chain_variations");

        if let (Some(max), Some(Value::Array(chains))) =
            (max_chains, r.map.get("link_chain_variations"))
        {
            if chains.len() > max {
                r.cx.fail(
                    r.path.field("link_chain_variations"),
                    FieldError::shape(
                        format!("at most {max} link chains"),
                        format!("{} link chains", chains.len()),
                    ),
                );
                r.ok = false;
            }
        }
        r.finish()?;

        Some(Sense {
            sense_id: sense_id?,
            base_word_id: base_word_id?,
            part_of_speech: part_of_speech?,
            definitions,
            translations,
            examples,
            sense_register,
            sense_collocations,
            sense_semantic_relations,
            related_forms,
            cefr_level,
            usage_frequency,
            pronunciation,
            link_chain_variations,
        })
    }
}

impl Validate for Definition {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("Definition", value, path, cx)?;
        let language = r.required::<Language>("language");
        let text = r.required::<String>("text");
        let difficulty_level = r.optional::<CefrLevel>("difficulty_level");
        r.finish()?;
        Some(Definition {
            language: language?,
            text: text?,
            difficulty_level,
        })
    }
}

impl Validate for TranslationDetail {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("TranslationDetail", value, path, cx)?;
        let text = r.required::<String>("text");
        let nuance = r.optional::<String>("nuance");
        r.finish()?;
        Some(TranslationDetail {
            text: text?,
            nuance,
        })
    }
}

impl Validate for Example {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("Example", value, path, cx)?;
        let text = r.required::<String>("text");
        let language = r.required::<Language>("language");
        let translation = r.optional::<String>("translation");
        r.finish()?;
        Some(Example {
            text: text?,
            language: language?,
            translation,
        })
    }
}

impl Validate for SemanticRelations {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("SemanticRelations", value, path, cx)?;
        let synonyms = r.optional::<Vec<String>>("synonyms");
        let antonyms = r.optional::<Vec<String>>("antonyms");
        let related_concepts = r.optional::<Vec<String>>("related_concepts");
        r.finish()?;
        Some(SemanticRelations {
            synonyms,
            antonyms,
            related_concepts,
        })
    }
}

impl Validate for LinkChain {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("LinkChain", value, path, cx)?;
        let chain_id = r.required::<Uuid>("chain_id");
        let target_language = r.optional::<Language>("target_language");
        let syllables = r.optional::<Vec<String>>("syllables");
        let syllable_links = r.optional::<Vec<SyllableLink>>("syllable_links");
        let narrative = r.required::<String>("narrative");
        let rhyme = r.optional::<String>("rhyme");
        let explanation = r.optional::<String>("explanation");
        let image_data = r.required::<ImageData>("image_data");
        let validation_score = r.optional::<f64>("validation_score");
        let prompt_used = r.optional::<String>("prompt_used");
        let feedback = r.or_default::<BTreeMap<Language, FeedbackCounts>>("feedback");
        r.finish()?;
        Some(LinkChain {
            chain_id: chain_id?,
            target_language,
            syllables,
            syllable_links,
            narrative: narrative?,
            rhyme,
            explanation,
            image_data: image_data?,
            validation_score,
            prompt_used,
            feedback,
        })
    }
}

impl Validate for SyllableLink {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("SyllableLink", value, path, cx)?;
        let syllable = r.required::<String>("syllable");
        let keyword_noun = r.required::<String>("keyword_noun");
        let keyword_language = r.required::<Language>("keyword_language");
        r.finish()?;
        Some(SyllableLink {
            syllable: syllable?,
            keyword_noun: keyword_noun?,
            keyword_language: keyword_language?,
        })
    }
}

impl Validate for ImageData {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("ImageData", value, path, cx)?;
        let kind = r.required::<ImageKind>("type");
        let url = r.required::<String>("url");
        if let Some(url) = &url {
            r.check_url("url", url);
        }
        let prompt = r.optional::<String>("prompt");
        let source_model = r.optional::<String>("source_model");
        let source_attribution = r.optional::<String>("source_attribution");
        r.finish()?;
        Some(ImageData {
            kind: kind?,
            url: url?,
            prompt,
            source_model,
            source_attribution,
        })
    }
}

impl Validate for FeedbackCounts {
    fn validate(value: &Value, path: &FieldPath, cx: &mut Cx) -> Option<Self> {
        let mut r = Record::open("FeedbackCounts", value, path, cx)?;
        let helpful = r.or_default::<u32>("helpful");
        let not_helpful = r.or_default::<u32>("not_helpful");
        r.finish()?;
        Some(FeedbackCounts {
            helpful,
            not_helpful,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain() -> Value {
        json!({
            "chain_id": "6a1f8a4e-5b7c-4d8e-9f00-112233445566",
            "narrative": "A cat eats mackerel.",
            "image_data": {"type": "placeholder", "url": "https://placehold.co/1", "prompt": null}
        })
    }

    #[test]
    fn link_chain_feedback_defaults_to_zero_counts() {
        let mut raw = chain();
        raw["feedback"] = json!({"en": {}, "id": {"helpful": 3}});
        let chain = Validator::default().link_chain(&raw).unwrap();
        assert_eq!(chain.feedback[&Language::En], FeedbackCounts::default());
        assert_eq!(chain.feedback[&Language::Id].helpful, 3);
        assert_eq!(chain.feedback[&Language::Id].not_helpful, 0);
        assert!(chain.image_data.is_placeholder());
    }

    #[test]
    fn collects_sibling_errors_in_one_pass() {
        let mut raw = chain();
        raw["syllables"] = json!("ma-kan");
        raw["image_data"]["type"] = json!("sketch");
        raw.as_object_mut().unwrap().remove("narrative");

        let report = Validator::default().link_chain(&raw).unwrap_err();
        assert_eq!(report.len(), 3, "{report}");
        assert!(matches!(
            report.at("syllables").unwrap().error,
            FieldError::Shape { .. }
        ));
        assert!(matches!(
            report.at("narrative").unwrap().error,
            FieldError::RequiredFieldMissing { .. }
        ));
        assert!(report.at("image_data.type").is_some());
    }

    #[test]
    fn image_url_must_be_absolute() {
        for bad in ["", "cat.png"] {
            let mut raw = chain();
            raw["image_data"] = json!({"type": "generated", "url": bad});
            let report = Validator::default().link_chain(&raw).unwrap_err();
            assert_eq!(report.len(), 1, "{report}");
            assert!(matches!(
                report.at("image_data.url").unwrap().error,
                FieldError::Shape { .. }
            ));
        }
    }

    #[test]
    fn unknown_fields_follow_policy() {
        let mut raw = chain();
        raw["mood"] = json!("whimsical");

        let report = Validator::default().link_chain(&raw).unwrap_err();
        assert!(matches!(
            report.at("mood").unwrap().error,
            FieldError::UnexpectedField { entity: "LinkChain", .. }
        ));

        let lenient = Validator::new(&PipelineConfig {
            unknown_fields: UnknownFieldPolicy::Ignore,
            ..PipelineConfig::default()
        });
        assert!(lenient.link_chain(&raw).is_ok());
    }

    #[test]
    fn null_counts_as_missing_for_required_fields() {
        let mut raw = chain();
        raw["narrative"] = Value::Null;
        let report = Validator::default().link_chain(&raw).unwrap_err();
        assert_eq!(
            report.at("narrative").unwrap().error,
            FieldError::RequiredFieldMissing {
                field: "narrative".into()
            }
        );
    }

    #[test]
    fn language_keyed_maps_reject_unknown_keys() {
        let raw = json!({
            "sense_id": Uuid::nil(),
            "base_word_id": Uuid::nil(),
            "part_of_speech": "verb",
            "translations": {"en": [{"text": "to eat"}], "fr": [{"text": "manger"}]}
        });
        let report = Validator::default().sense(&raw).unwrap_err();
        assert_eq!(report.len(), 1);
        assert!(report.at("translations.fr").is_some());
    }

    #[test]
    fn too_many_link_chains_is_a_shape_error() {
        let raw = json!({
            "sense_id": Uuid::nil(),
            "base_word_id": Uuid::nil(),
            "part_of_speech": "verb",
            "link_chain_variations": [chain(), chain(), chain()]
        });
        let report = Validator::default().sense(&raw).unwrap_err();
        assert!(matches!(
            report.at("link_chain_variations").unwrap().error,
            FieldError::Shape { .. }
        ));
    }

    #[test]
    fn non_object_root_is_a_shape_error() {
        let report = Validator::default().sense(&json!([1, 2])).unwrap_err();
        assert_eq!(report.at("$").unwrap().error, FieldError::shape("object (Sense)", "array"));
    }
}
