//! WordSense schema: entity shapes for the word-enrichment pipeline.
//!
//! ## Two shapes per unreliable entity
//!
//! ```text
//!   producer (LLM) ──► producer shape ──reconcile──► mapping ──validate──► strict shape
//!                      (relaxed, transient)                                (everywhere else)
//! ```
//!
//! - [`types`]: the strict aggregate (`Word` → `Sense` → `LinkChain` → `ImageData`).
//! - [`producer`]: the relaxed shapes accepted straight out of generation.
//! - [`vocab`]: closed tag sets (languages, CEFR levels, image kinds).

pub mod producer;
pub mod types;
pub mod vocab;

pub use producer::{ImageDescriptor, ProducerImageData, SenseBrief};
pub use types::{
    ChainId, Definition, EnrichmentInfo, Example, FeedbackCounts, ImageData, LinkChain,
    Pronunciation, SemanticRelations, Sense, SenseId, SyllableLink, TranslationDetail, Word,
    WordId,
};
pub use vocab::{CefrLevel, ImageKind, Language, TagSet, UnknownTag};
