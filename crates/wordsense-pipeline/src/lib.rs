//! WordSense pipeline: producer output in, validated `Word` aggregates out.
//!
//! ```text
//!  raw sense ──► Reconciler::reconcile_sense ──► mapping ──┐
//!  raw sense ──► Reconciler::reconcile_sense ──► mapping ──┼──► WordBuilder (Collecting)
//!  ...                                                      │         │ finalize()
//!                                                           │         ▼
//!                                                           │    Finalized { word_id injected }
//!                                                           │         │ validate()
//!                                                           │         ▼
//!                                                           └──► Word  |  ValidationReport
//! ```
//!
//! Reconciliation is total and never validates. Validation runs exactly once
//! per build, over the whole aggregate, after the parent id exists.

pub mod builder;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod validate;

pub use builder::{inject_parent, Finalized, SenseMerge, WordBuilder};
pub use config::{ConfigError, PipelineConfig, UnknownFieldPolicy, DEFAULT_PLACEHOLDER_URL};
pub use error::{Disposition, EntityPathError, FieldError, FieldPath, ValidationReport};
pub use reconcile::{Mapping, Reconciler};
pub use validate::Validator;
