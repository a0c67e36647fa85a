//! Turning producer text into plain mappings.
//!
//! Producers wrap JSON in markdown fences, prepend prose, or trail off after
//! the closing brace. Everything here is lenient about framing and strict
//! about the result being a JSON object; structural checks beyond that are
//! left to reconciliation and validation.

use crate::error::EnrichError;
use serde_json::Value;
use wordsense_pipeline::Mapping;
use wordsense_schema::{Language, SenseBrief};

/// Parse the first JSON object out of producer text.
pub fn parse_producer_object(text: &str) -> Result<Mapping, EnrichError> {
    let trimmed = strip_fence(text.trim());

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(v) => v,
        Err(_) => {
            let candidate = first_object(trimmed)?;
            serde_json::from_str(candidate).map_err(|e| {
                EnrichError::unparseable(format!("producer returned invalid JSON: {e}"))
            })?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(EnrichError::unparseable(format!(
            "expected a JSON object, got {}",
            match other {
                Value::Array(_) => "an array",
                Value::String(_) => "a string",
                Value::Number(_) => "a number",
                Value::Bool(_) => "a boolean",
                _ => "null",
            }
        ))),
    }
}

fn strip_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string (`json`, `JSON`, ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// The first brace-balanced `{...}` substring. Braces inside double-quoted
/// strings, in the surrounding prose or in the object, are skipped.
fn first_object(s: &str) -> Result<&str, EnrichError> {
    let mut start = None;
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escape = false;

    for (idx, ch) in s.char_indices() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if let (0, Some(start)) = (depth, start) {
                    return Ok(&s[start..=idx]);
                }
            }
            _ => {}
        }
    }

    match start {
        None => Err(EnrichError::unparseable(
            "producer did not return JSON (no '{' found)",
        )),
        Some(_) => Err(EnrichError::unparseable(
            "producer returned an unterminated JSON object",
        )),
    }
}

// ============================================================================
// Response shapes
// ============================================================================

/// Word-level fields plus the senses the producer identified.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreDetails {
    pub fields: Mapping,
    pub senses: Vec<SenseBrief>,
}

impl CoreDetails {
    /// Split a core-details response. `Err` carries a reason suitable for a
    /// retry.
    ///
    /// Free-text etymology and usage notes and a flat collocation list are
    /// keyed by the headword's language; word-level semantic relations have
    /// no place on a word and are dropped.
    pub fn from_mapping(mut map: Mapping, language: Language) -> Result<Self, String> {
        let senses = match map.remove("senses") {
            Some(raw @ Value::Array(_)) => serde_json::from_value::<Vec<SenseBrief>>(raw)
                .map_err(|e| format!("core details: malformed sense list: {e}"))?,
            Some(_) => return Err("core details: `senses` is not a list".to_string()),
            None => return Err("core details: missing `senses`".to_string()),
        };

        for key in ["etymology", "usage_notes", "collocations"] {
            let keyed = match map.remove(key) {
                Some(v @ (Value::String(_) | Value::Array(_))) => keyed_by(language, v),
                Some(other) => other,
                None => continue,
            };
            map.insert(key.to_string(), keyed);
        }
        if map.remove("semantic_relations").is_some() {
            tracing::debug!("dropping word-level semantic_relations");
        }

        Ok(Self {
            fields: map,
            senses,
        })
    }
}

fn keyed_by(language: Language, value: Value) -> Value {
    let mut keyed = Mapping::new();
    keyed.insert(language.to_string(), value);
    Value::Object(keyed)
}

/// The `link_chains` list of a link-chain response. Absent means none.
pub fn link_chains_from_mapping(
    mut map: Mapping,
    max: Option<usize>,
) -> Result<Vec<Value>, String> {
    let chains = match map.remove("link_chains") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => return Err("link chains: `link_chains` is not a list".to_string()),
    };
    match max {
        Some(max) if chains.len() > max => Err(format!(
            "link chains: asked for at most {max}, got {}",
            chains.len()
        )),
        _ => Ok(chains),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fenced_objects() {
        let plain = parse_producer_object(r#"{"a": 1}"#).unwrap();
        assert_eq!(plain["a"], 1);

        let fenced = parse_producer_object("```json\n{\"a\": 2}\n```").unwrap();
        assert_eq!(fenced["a"], 2);

        let bare_fence = parse_producer_object("```\n{\"a\": 3}\n```\n").unwrap();
        assert_eq!(bare_fence["a"], 3);
    }

    #[test]
    fn extracts_first_object_from_prose() {
        let text = r#"Sure! Here it is: {"narrative": "a } in a string", "n": {"x": 1}} and {"b": 2}"#;
        let map = parse_producer_object(text).unwrap();
        assert_eq!(map["narrative"], "a } in a string");
        assert_eq!(map["n"]["x"], 1);
        assert!(!map.contains_key("b"));
    }

    #[test]
    fn braces_quoted_in_prose_are_skipped() {
        let text = r#"The field "{braces}" is quoted, so here is the answer: {"a": 1}"#;
        let map = parse_producer_object(text).unwrap();
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn rejects_non_objects() {
        for text in ["[1, 2]", "\"hello\"", "no json here", "{\"a\": ", ""] {
            let err = parse_producer_object(text).unwrap_err();
            assert!(
                matches!(err, EnrichError::UnparseableInput { .. }),
                "{text}: {err}"
            );
        }
    }

    #[test]
    fn core_details_split_and_keyed() {
        let map = parse_producer_object(
            r#"{
                "headword": "makan",
                "language": "id",
                "etymology": "From Proto-Malayic *makan.",
                "collocations": ["makan siang", "makan malam"],
                "semantic_relations": {"synonyms": ["santap"]},
                "senses": [{"part_of_speech": "verb", "brief_description": "to eat"}]
            }"#,
        )
        .unwrap();
        let core = CoreDetails::from_mapping(map, Language::Id).unwrap();
        assert_eq!(core.senses.len(), 1);
        assert_eq!(core.senses[0].part_of_speech, "verb");
        assert_eq!(core.fields["etymology"]["id"], "From Proto-Malayic *makan.");
        assert_eq!(core.fields["collocations"]["id"][1], "makan malam");
        assert!(!core.fields.contains_key("semantic_relations"));
        assert!(!core.fields.contains_key("senses"));
    }

    #[test]
    fn core_details_without_senses_is_retryable() {
        let map = parse_producer_object(r#"{"headword": "makan"}"#).unwrap();
        assert!(CoreDetails::from_mapping(map, Language::Id).is_err());
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_text_never_panics(text in ".{0,200}") {
            let _ = parse_producer_object(&text);
        }

        #[test]
        fn object_is_recovered_from_prose_and_fences(
            key in "[a-z_]{1,12}",
            n in proptest::prelude::any::<i64>(),
            prose in "[A-Za-z ,.!:]{0,40}",
            fenced in proptest::prelude::any::<bool>(),
        ) {
            let mut object = Mapping::new();
            object.insert(key.clone(), Value::from(n));
            let body = Value::Object(object).to_string();
            let text = if fenced {
                format!("{prose}\n```json\n{body}\n```")
            } else {
                format!("{prose} {body} Hope this helps!")
            };
            let map = parse_producer_object(&text).unwrap();
            proptest::prop_assert_eq!(&map[key.as_str()], &Value::from(n));
        }
    }

    #[test]
    fn link_chain_count_is_bounded() {
        let map = parse_producer_object(r#"{"link_chains": [{}, {}, {}]}"#).unwrap();
        assert!(link_chains_from_mapping(map.clone(), Some(2)).is_err());
        assert_eq!(link_chains_from_mapping(map, None).unwrap().len(), 3);
        assert!(link_chains_from_mapping(Mapping::new(), Some(2))
            .unwrap()
            .is_empty());
    }
}
