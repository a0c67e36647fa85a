//! The generation seam.
//!
//! A [`Producer`] returns raw text for each step of an enrichment episode.
//! It does no parsing; the enricher owns turning text into mappings and
//! deciding whether to ask again.

use crate::error::ProducerError;
use crate::response::{parse_producer_object, CoreDetails};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use wordsense_schema::{Language, SenseBrief};

/// What one enrichment episode is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub headword: String,
    pub language: Language,
    /// Language translations and mnemonics are aimed at.
    pub target_language: Language,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "fresh_batch_id")]
    pub batch_id: String,
}

fn fresh_batch_id() -> String {
    Uuid::new_v4().to_string()
}

impl EnrichmentRequest {
    pub fn new(headword: impl Into<String>, language: Language, target_language: Language) -> Self {
        Self {
            headword: headword.into(),
            language,
            target_language,
            categories: Vec::new(),
            batch_id: fresh_batch_id(),
        }
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = batch_id.into();
        self
    }
}

#[async_trait]
pub trait Producer: Send + Sync {
    /// Word-level fields and a `senses` list of `{part_of_speech, brief_description}`.
    async fn core_details(&self, request: &EnrichmentRequest) -> Result<String, ProducerError>;

    /// One sense in detail. `ordinal` is the brief's position in the
    /// core-details `senses` list; briefs themselves need not be distinct.
    async fn sense_details(
        &self,
        request: &EnrichmentRequest,
        ordinal: usize,
        brief: &SenseBrief,
    ) -> Result<String, ProducerError>;

    /// `{"link_chains": [...]}` with zero, one or two mnemonic chains.
    async fn link_chains(
        &self,
        request: &EnrichmentRequest,
        ordinal: usize,
        brief: &SenseBrief,
    ) -> Result<String, ProducerError>;
}

// ============================================================================
// Recorded responses
// ============================================================================

/// Replays producer responses recorded on disk.
///
/// ```text
/// <dir>/core.json        core details
/// <dir>/sense-<i>.json   details for the brief at position i in core.json
/// <dir>/chains-<i>.json  link chains for the brief at position i (optional)
/// ```
///
/// Files are re-read on every call so a retry sees the same text again.
#[derive(Debug, Clone)]
pub struct RecordedProducer {
    dir: PathBuf,
    briefs: Vec<SenseBrief>,
}

impl RecordedProducer {
    pub async fn open(dir: impl AsRef<Path>, language: Language) -> Result<Self, ProducerError> {
        let dir = dir.as_ref().to_path_buf();
        let core = read(&dir.join("core.json")).await?;
        // Brief order fixes the file index; a core file that cannot be split
        // is still replayed as-is so the enricher can report it.
        let briefs = parse_producer_object(&core)
            .ok()
            .and_then(|map| CoreDetails::from_mapping(map, language).ok())
            .map(|core| core.senses)
            .unwrap_or_default();
        Ok(Self { dir, briefs })
    }

    pub fn briefs(&self) -> &[SenseBrief] {
        &self.briefs
    }

    fn check_ordinal(&self, ordinal: usize, brief: &SenseBrief) -> Result<(), ProducerError> {
        match self.briefs.get(ordinal) {
            Some(recorded) if recorded == brief => Ok(()),
            _ => Err(ProducerError::Rejected(format!(
                "no recording for sense #{ordinal} {:?} ({})",
                brief.brief_description, brief.part_of_speech
            ))),
        }
    }
}

async fn read(path: &Path) -> Result<String, ProducerError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        ProducerError::Rejected(format!("cannot read {}: {e}", path.display()))
    })
}

#[async_trait]
impl Producer for RecordedProducer {
    async fn core_details(&self, _request: &EnrichmentRequest) -> Result<String, ProducerError> {
        read(&self.dir.join("core.json")).await
    }

    async fn sense_details(
        &self,
        _request: &EnrichmentRequest,
        ordinal: usize,
        brief: &SenseBrief,
    ) -> Result<String, ProducerError> {
        self.check_ordinal(ordinal, brief)?;
        read(&self.dir.join(format!("sense-{ordinal}.json"))).await
    }

    async fn link_chains(
        &self,
        _request: &EnrichmentRequest,
        ordinal: usize,
        brief: &SenseBrief,
    ) -> Result<String, ProducerError> {
        self.check_ordinal(ordinal, brief)?;
        let path = self.dir.join(format!("chains-{ordinal}.json"));
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(r#"{"link_chains": []}"#.to_string());
        }
        read(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_by_brief_position() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("core.json"),
            r#"{"headword": "bisa", "senses": [
                {"part_of_speech": "verb", "brief_description": "can"},
                {"part_of_speech": "noun", "brief_description": "venom"}
            ]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("sense-1.json"), r#"{"definition": "venom"}"#).unwrap();

        let producer = RecordedProducer::open(dir.path(), Language::Id).await.unwrap();
        let request = EnrichmentRequest::new("bisa", Language::Id, Language::En);
        assert_eq!(producer.briefs().len(), 2);

        let venom = producer.briefs()[1].clone();
        let text = producer.sense_details(&request, 1, &venom).await.unwrap();
        assert!(text.contains("venom"));

        let chains = producer.link_chains(&request, 1, &venom).await.unwrap();
        assert_eq!(chains, r#"{"link_chains": []}"#);

        let can = producer.briefs()[0].clone();
        let err = producer.sense_details(&request, 0, &can).await.unwrap_err();
        assert!(!err.is_transient());

        let err = producer.sense_details(&request, 0, &venom).await.unwrap_err();
        assert!(err.to_string().contains("no recording"));
    }

    #[tokio::test]
    async fn identical_briefs_replay_their_own_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("core.json"),
            r#"{"senses": [
                {"part_of_speech": "noun", "brief_description": "x"},
                {"part_of_speech": "noun", "brief_description": "x"}
            ]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("sense-0.json"), r#"{"tag": "ZERO"}"#).unwrap();
        std::fs::write(dir.path().join("sense-1.json"), r#"{"tag": "ONE"}"#).unwrap();

        let producer = RecordedProducer::open(dir.path(), Language::Id).await.unwrap();
        let request = EnrichmentRequest::new("x", Language::Id, Language::En);
        let briefs = producer.briefs().to_vec();
        assert_eq!(briefs[0], briefs[1]);

        let first = producer.sense_details(&request, 0, &briefs[0]).await.unwrap();
        let second = producer.sense_details(&request, 1, &briefs[1]).await.unwrap();
        assert!(first.contains("ZERO"));
        assert!(second.contains("ONE"));
    }

    #[tokio::test]
    async fn missing_core_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = RecordedProducer::open(dir.path(), Language::Id)
            .await
            .unwrap_err();
        assert!(matches!(err, ProducerError::Rejected(_)));
    }
}
