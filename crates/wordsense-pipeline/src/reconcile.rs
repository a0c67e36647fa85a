//! Producer-shape → mapping reconciliation.
//!
//! Every function here is total: given any mapping it returns a mapping.
//! The only field synthesized is image data, which the producer routinely
//! omits. Everything else is either normalized from a known producer variant
//! or left exactly as received for validation to judge.
//!
//! `base_word_id` is never set here. The producer cannot know it and the
//! builder owns it.

use crate::config::PipelineConfig;
use rayon::prelude::*;
use serde_json::{json, Map, Value};
use wordsense_schema::{ImageData, ImageDescriptor, ImageKind, ProducerImageData, TagSet};

pub type Mapping = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct Reconciler {
    placeholder_url: String,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl Reconciler {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            placeholder_url: config.placeholder_url.clone(),
        }
    }

    pub fn placeholder_url(&self) -> &str {
        &self.placeholder_url
    }

    // ------------------------------------------------------------------
    // Image data
    // ------------------------------------------------------------------

    /// Always yields a structurally valid [`ImageData`].
    ///
    /// Passes through unchanged when both `type` and `url` are present and
    /// well-formed; otherwise a placeholder carrying over any prompt.
    pub fn reconcile_image_data(&self, raw: Option<&Value>) -> ImageData {
        self.reconcile_descriptor(ImageDescriptor::from_value(raw), None)
    }

    fn reconcile_descriptor(
        &self,
        descriptor: ImageDescriptor,
        fallback_prompt: Option<String>,
    ) -> ImageData {
        if let ImageDescriptor::Partial(data) = &descriptor {
            if let Some(image) = well_formed(data) {
                return image;
            }
        }
        let prompt = descriptor.prompt().map(str::to_string).or(fallback_prompt);
        tracing::debug!(has_prompt = prompt.is_some(), "synthesizing placeholder image");
        ImageData {
            kind: ImageKind::Placeholder,
            url: self.placeholder_url.clone(),
            prompt,
            source_model: None,
            source_attribution: None,
        }
    }

    // ------------------------------------------------------------------
    // Link chains
    // ------------------------------------------------------------------

    /// Reconcile the nested image field; every other field is left as
    /// received.
    ///
    /// A legacy top-level `image_prompt` string is folded into the image
    /// prompt when the image itself carries none.
    pub fn reconcile_link_chain(&self, mut raw: Mapping) -> Mapping {
        let legacy_prompt = match raw.remove("image_prompt") {
            Some(Value::String(prompt)) => Some(prompt),
            Some(Value::Null) | None => None,
            Some(other) => {
                raw.insert("image_prompt".to_string(), other);
                None
            }
        };
        let descriptor = ImageDescriptor::from_value(raw.get("image_data"));
        let image = self.reconcile_descriptor(descriptor, legacy_prompt);
        raw.insert("image_data".to_string(), image_to_value(&image));
        raw
    }

    // ------------------------------------------------------------------
    // Senses
    // ------------------------------------------------------------------

    /// Reconcile every link chain and normalize known producer variants.
    ///
    /// The returned mapping never contains `base_word_id`.
    pub fn reconcile_sense(&self, mut raw: Mapping) -> Mapping {
        if raw.remove("base_word_id").is_some() {
            tracing::debug!("dropping producer-supplied base_word_id");
        }

        normalize_pronunciation(&mut raw);

        if !raw.contains_key("definitions") && matches!(raw.get("definition"), Some(Value::Object(_))) {
            if let Some(def) = raw.remove("definition") {
                raw.insert("definitions".to_string(), Value::Array(vec![def]));
            }
        }

        if let Some(grouped) = raw.get("translations").and_then(group_translations) {
            raw.insert("translations".to_string(), grouped);
        }

        if !raw.contains_key("link_chain_variations") {
            if let Some(chains) = raw.remove("link_chains") {
                raw.insert("link_chain_variations".to_string(), chains);
            }
        }

        if let Some(Value::Array(chains)) = raw.get_mut("link_chain_variations") {
            for chain in chains.iter_mut() {
                if let Value::Object(map) = chain {
                    *map = self.reconcile_link_chain(std::mem::take(map));
                }
            }
        }

        raw
    }

    /// Reconcile a batch of senses in parallel; order is preserved and the
    /// call returns only once every sense is done.
    pub fn reconcile_senses_par(&self, raws: Vec<Mapping>) -> Vec<Mapping> {
        raws.into_par_iter()
            .map(|raw| self.reconcile_sense(raw))
            .collect()
    }

    /// Normalize word-level scalar fields.
    pub fn reconcile_word_fields(&self, mut raw: Mapping) -> Mapping {
        normalize_pronunciation(&mut raw);
        raw
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn well_formed(data: &ProducerImageData) -> Option<ImageData> {
    let kind = ImageKind::from_tag(data.kind.as_deref()?)?;
    let url = data.url.as_deref()?;
    url::Url::parse(url).ok()?;
    Some(ImageData {
        kind,
        url: url.to_string(),
        prompt: data.prompt.clone(),
        source_model: data.source_model.clone(),
        source_attribution: data.source_attribution.clone(),
    })
}

fn image_to_value(image: &ImageData) -> Value {
    let mut v = json!({
        "type": image.kind.tag(),
        "url": image.url,
        "prompt": image.prompt,
    });
    if let Value::Object(map) = &mut v {
        if let Some(model) = &image.source_model {
            map.insert("source_model".to_string(), json!(model));
        }
        if let Some(attribution) = &image.source_attribution {
            map.insert("source_attribution".to_string(), json!(attribution));
        }
    }
    v
}

/// Producers echo the IPA field name in upper case.
fn normalize_pronunciation(raw: &mut Mapping) {
    if let Some(Value::Object(p)) = raw.get_mut("pronunciation") {
        if !p.contains_key("ipa") {
            if let Some(ipa) = p.remove("IPA") {
                p.insert("ipa".to_string(), ipa);
            }
        }
    }
}

/// `[{text, language, nuance?}, ...]` → `{language: [{text, nuance?}, ...]}`.
///
/// Returns `None` (leave untouched) unless every element is an object with a
/// string `language`.
fn group_translations(value: &Value) -> Option<Value> {
    let items = value.as_array()?;
    let mut grouped = Mapping::new();
    for item in items {
        let mut entry = item.as_object()?.clone();
        let language = match entry.remove("language")? {
            Value::String(lang) => lang,
            _ => return None,
        };
        let slot = grouped
            .entry(language)
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = slot {
            list.push(Value::Object(entry));
        }
    }
    Some(Value::Object(grouped))
}
