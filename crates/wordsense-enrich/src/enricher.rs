//! One enrichment episode, end to end.
//!
//! ```text
//!  core_details ──► briefs ──┬─► sense_details(brief) ─┐
//!   (abort on failure)       │   link_chains(brief)    ├─► reconcile (parallel) ─► WordBuilder
//!                            └─► ... per brief ...     ┘      finalize ─► validate ─► store.save
//!                                (skip sense on failure)
//! ```
//!
//! Every producer call goes through the retry policy. Nothing is saved
//! unless the whole word validates.

use crate::config::EnrichConfig;
use crate::error::EnrichError;
use crate::producer::{EnrichmentRequest, Producer};
use crate::response::{link_chains_from_mapping, parse_producer_object, CoreDetails};
use crate::retry::{Attempt, RetryPolicy};
use crate::store::WordStore;
use crate::ProducerError;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use wordsense_pipeline::{Mapping, Reconciler, SenseMerge, WordBuilder};
use wordsense_schema::{SenseBrief, Word, WordId};

pub struct Enricher<P> {
    producer: P,
    store: Arc<dyn WordStore>,
    config: EnrichConfig,
    retry: RetryPolicy,
    reconciler: Reconciler,
}

impl<P: Producer> Enricher<P> {
    pub fn new(producer: P, store: Arc<dyn WordStore>, config: EnrichConfig) -> Self {
        Self {
            producer,
            store,
            retry: config.retry_policy(),
            reconciler: Reconciler::new(&config.pipeline),
            config,
        }
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Enrich a new word and save it.
    pub async fn run(&self, request: &EnrichmentRequest) -> Result<Word, EnrichError> {
        tracing::info!(
            headword = %request.headword,
            language = %request.language,
            target = %request.target_language,
            batch_id = %request.batch_id,
            "starting enrichment"
        );

        let core = self.core_details(request).await?;
        let mut fields = self.reconciler.reconcile_word_fields(core.fields);
        fill_missing(&mut fields, "headword", Value::String(request.headword.clone()));
        fill_missing(&mut fields, "language", Value::String(request.language.to_string()));
        if !request.categories.is_empty() {
            fill_missing(&mut fields, "categories", serde_json::json!(request.categories));
        }

        let senses = self.collect_senses(request, &core.senses).await;
        let mut builder = WordBuilder::new(fields, &self.config.pipeline)
            .record_batch(request.batch_id.clone(), None);
        builder.extend_senses(senses);

        self.finish(builder).await
    }

    /// Add senses to an existing word and save it under the same id.
    ///
    /// Word-level fields are kept from `existing`; only the sense briefs of
    /// the core-details response are used.
    pub async fn amend(
        &self,
        existing: &Word,
        request: &EnrichmentRequest,
        merge: SenseMerge,
    ) -> Result<Word, EnrichError> {
        tracing::info!(
            word_id = %existing.word_id,
            headword = %existing.headword,
            ?merge,
            batch_id = %request.batch_id,
            "amending word"
        );

        let core = self.core_details(request).await?;
        let senses = self.collect_senses(request, &core.senses).await;
        let mut builder = WordBuilder::amend(existing, merge, &self.config.pipeline)?
            .record_batch(request.batch_id.clone(), None);
        builder.extend_senses(senses);

        self.finish(builder).await
    }

    /// [`amend`](Self::amend) a word loaded from the store.
    pub async fn amend_stored(
        &self,
        word_id: WordId,
        request: &EnrichmentRequest,
        merge: SenseMerge,
    ) -> Result<Word, EnrichError> {
        let existing = self
            .store
            .get(word_id)
            .await?
            .ok_or(crate::StoreError::NotFound(word_id))?;
        self.amend(&existing, request, merge).await
    }

    async fn finish(&self, builder: WordBuilder) -> Result<Word, EnrichError> {
        let word = builder.build()?;
        self.store.save(&word).await?;
        tracing::info!(
            word_id = %word.word_id,
            senses = word.senses.len(),
            link_chains = word.link_chain_count(),
            "enrichment complete"
        );
        Ok(word)
    }

    // ------------------------------------------------------------------
    // Producer steps
    // ------------------------------------------------------------------

    async fn core_details(&self, request: &EnrichmentRequest) -> Result<CoreDetails, EnrichError> {
        self.ask(
            "core details",
            || self.producer.core_details(request),
            |map| CoreDetails::from_mapping(map, request.language),
        )
        .await
    }

    /// Raw (unreconciled) details for each brief, then reconciled together.
    /// A brief whose details cannot be obtained is skipped.
    async fn collect_senses(
        &self,
        request: &EnrichmentRequest,
        briefs: &[SenseBrief],
    ) -> Vec<Mapping> {
        if briefs.is_empty() {
            tracing::warn!(headword = %request.headword, "producer identified no senses");
        }
        let max_chains = self.config.pipeline.max_link_chains_per_sense;
        let mut raw = Vec::with_capacity(briefs.len());

        for (ordinal, brief) in briefs.iter().enumerate() {
            let details = self
                .ask(
                    "sense details",
                    || self.producer.sense_details(request, ordinal, brief),
                    |map| Ok(map),
                )
                .await;
            let mut sense = match details {
                Ok(sense) => sense,
                Err(err) => {
                    tracing::warn!(
                        sense = %brief.brief_description,
                        error = %err,
                        "skipping sense"
                    );
                    continue;
                }
            };
            fill_missing(
                &mut sense,
                "part_of_speech",
                Value::String(brief.part_of_speech.clone()),
            );

            let chains = self
                .ask(
                    "link chains",
                    || self.producer.link_chains(request, ordinal, brief),
                    |map| link_chains_from_mapping(map, max_chains),
                )
                .await;
            match chains {
                Ok(chains) if chains.is_empty() => {}
                Ok(chains) => {
                    if sense.contains_key("link_chain_variations") || sense.contains_key("link_chains") {
                        tracing::debug!(sense = %brief.brief_description, "sense already carries link chains");
                    } else {
                        sense.insert("link_chain_variations".to_string(), Value::Array(chains));
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        sense = %brief.brief_description,
                        error = %err,
                        "no link chains for sense"
                    );
                }
            }
            raw.push(sense);
        }

        // Joins before returning; finalize must only see reconciled senses.
        self.reconciler.reconcile_senses_par(raw)
    }

    /// One producer call under the retry policy. Transport errors and
    /// unparseable text are retried; `accept` may ask for a retry too.
    async fn ask<T, C, Fut>(
        &self,
        what: &str,
        call: C,
        accept: impl Fn(Mapping) -> Result<T, String>,
    ) -> Result<T, EnrichError>
    where
        C: Fn() -> Fut,
        Fut: Future<Output = Result<String, ProducerError>>,
    {
        self.retry
            .run(what, |attempt| {
                let pending = call();
                let accept = &accept;
                async move {
                    let text = match pending.await {
                        Ok(text) => text,
                        Err(err) if err.is_transient() => return Attempt::Retry(err.to_string()),
                        Err(err) => {
                            return Attempt::Abort(EnrichError::Producer {
                                attempts: attempt,
                                last: err.to_string(),
                            })
                        }
                    };
                    let accepted = parse_producer_object(&text)
                        .map_err(|e| e.to_string())
                        .and_then(accept);
                    match accepted {
                        Ok(value) => Attempt::Accepted(value),
                        Err(reason) => Attempt::Retry(reason),
                    }
                }
            })
            .await
    }
}

fn fill_missing(map: &mut Mapping, key: &str, value: Value) {
    if matches!(map.get(key), None | Some(Value::Null)) {
        map.insert(key.to_string(), value);
    }
}
