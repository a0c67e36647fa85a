//! Relaxed producer shapes.
//!
//! What an upstream generator is allowed to hand us immediately after
//! generation. These differ from [`crate::types`] only where the generator is
//! known to be unreliable: image data may arrive without `type`/`url`, or as a
//! bare prompt string. They are transient; nothing outside reconciliation
//! should hold one.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Image data as a producer may emit it. Every field is optional, and a field
/// holding anything but a string reads as absent without affecting the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerImageData {
    #[serde(default, rename = "type", deserialize_with = "string_or_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub prompt: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub source_model: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub source_attribution: Option<String>,
}

fn string_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Any image descriptor a producer might put in a link chain's `image_data`.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageDescriptor {
    /// Field absent or `null`.
    Missing,
    /// A bare string, read as a generation prompt.
    PromptOnly(String),
    /// An object with whatever subset of image fields the producer filled in.
    Partial(ProducerImageData),
    /// Something else entirely (a number, a list, a boolean). Nothing is
    /// salvageable beyond a prompt.
    Unusable { prompt: Option<String> },
}

impl ImageDescriptor {
    pub fn from_value(raw: Option<&Value>) -> Self {
        match raw {
            None | Some(Value::Null) => ImageDescriptor::Missing,
            Some(Value::String(s)) => ImageDescriptor::PromptOnly(s.clone()),
            Some(v @ Value::Object(map)) => match serde_json::from_value(v.clone()) {
                Ok(data) => ImageDescriptor::Partial(data),
                Err(_) => ImageDescriptor::Unusable {
                    prompt: map.get("prompt").and_then(Value::as_str).map(str::to_string),
                },
            },
            Some(_) => ImageDescriptor::Unusable { prompt: None },
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        match self {
            ImageDescriptor::Missing => None,
            ImageDescriptor::PromptOnly(p) => Some(p),
            ImageDescriptor::Partial(d) => d.prompt.as_deref(),
            ImageDescriptor::Unusable { prompt } => prompt.as_deref(),
        }
    }
}

/// One sense as identified in a core-details response, before its details
/// are generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenseBrief {
    pub part_of_speech: String,
    pub brief_description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_classifies_raw_values() {
        assert_eq!(ImageDescriptor::from_value(None), ImageDescriptor::Missing);
        assert_eq!(
            ImageDescriptor::from_value(Some(&Value::Null)),
            ImageDescriptor::Missing
        );
        assert_eq!(
            ImageDescriptor::from_value(Some(&json!("a cat"))),
            ImageDescriptor::PromptOnly("a cat".into())
        );

        let partial = ImageDescriptor::from_value(Some(&json!({"prompt": "a cat"})));
        assert_eq!(partial.prompt(), Some("a cat"));
        assert!(matches!(partial, ImageDescriptor::Partial(ref d) if d.url.is_none()));

        let mistyped = ImageDescriptor::from_value(Some(&json!({"url": 7, "prompt": "dog"})));
        assert_eq!(
            mistyped,
            ImageDescriptor::Partial(ProducerImageData {
                prompt: Some("dog".into()),
                ..ProducerImageData::default()
            })
        );
        assert_eq!(
            ImageDescriptor::from_value(Some(&json!([1, 2]))),
            ImageDescriptor::Unusable { prompt: None }
        );
    }

    #[test]
    fn mistyped_optional_field_does_not_hide_the_rest() {
        let data: ProducerImageData = serde_json::from_value(json!({
            "type": "generated",
            "url": "https://cdn.example/cat.png",
            "prompt": 42,
            "source_model": ["imagen"]
        }))
        .unwrap();
        assert_eq!(data.kind.as_deref(), Some("generated"));
        assert_eq!(data.url.as_deref(), Some("https://cdn.example/cat.png"));
        assert_eq!(data.prompt, None);
        assert_eq!(data.source_model, None);
    }
}
