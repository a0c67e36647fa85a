//! WordSense enrichment episodes.
//!
//! Drives a [`Producer`] through core details, per-sense details and link
//! chains, retrying malformed output, then hands the collected senses to the
//! pipeline's two-phase builder and saves the validated word.
//!
//! - [`response`]: producer text → JSON object mapping.
//! - [`retry`]: explicit per-attempt outcomes and exponential backoff.
//! - [`enricher`]: the episode itself, new words and amendments.
//! - [`store`]: the persistence seam.

pub mod config;
pub mod enricher;
pub mod error;
pub mod producer;
pub mod response;
pub mod retry;
pub mod store;

pub use config::EnrichConfig;
pub use enricher::Enricher;
pub use error::{EnrichError, ProducerError, StoreError};
pub use producer::{EnrichmentRequest, Producer, RecordedProducer};
pub use response::{parse_producer_object, CoreDetails};
pub use retry::{Attempt, RetryPolicy};
pub use store::{InMemoryWordStore, WordStore};
