use wordsense_pipeline::{Disposition, ValidationReport};

/// Failure of a producer call itself, before any output is inspected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProducerError {
    #[error("producer unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    /// The producer refused the request; asking again will not help.
    #[error("producer rejected request: {0}")]
    Rejected(String),
}

impl ProducerError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProducerError::Rejected(_))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("word {0} not found")]
    NotFound(uuid::Uuid),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// Producer text that is not a JSON object at all.
    #[error("unparseable producer output: {reason}")]
    UnparseableInput { reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationReport),

    #[error("producer gave no usable output after {attempts} attempt(s): {last}")]
    Producer { attempts: u32, last: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored word could not be turned back into a mapping for amendment.
    #[error("failed to re-encode stored word: {0}")]
    Encode(#[from] serde_json::Error),
}

impl EnrichError {
    pub fn unparseable(reason: impl Into<String>) -> Self {
        EnrichError::UnparseableInput {
            reason: reason.into(),
        }
    }

    /// Whether re-running the episode could succeed.
    pub fn disposition(&self) -> Disposition {
        match self {
            EnrichError::UnparseableInput { .. } | EnrichError::Producer { .. } => {
                Disposition::Retry
            }
            EnrichError::Validation(report) => report.disposition(),
            EnrichError::Store(_) | EnrichError::Encode(_) => Disposition::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordsense_pipeline::{FieldError, FieldPath};

    #[test]
    fn disposition_follows_the_underlying_failure() {
        assert_eq!(
            EnrichError::unparseable("no object").disposition(),
            Disposition::Retry
        );

        let mut report = ValidationReport::new("word");
        report.push(
            FieldPath::root().field("senses").index(0).field("base_word_id"),
            FieldError::RequiredFieldMissing {
                field: "base_word_id".into(),
            },
        );
        assert_eq!(EnrichError::from(report).disposition(), Disposition::Fatal);

        let missing = StoreError::NotFound(uuid::Uuid::nil());
        assert_eq!(EnrichError::from(missing).disposition(), Disposition::Fatal);
    }

    #[test]
    fn only_rejections_are_permanent() {
        assert!(ProducerError::Unavailable("503".into()).is_transient());
        assert!(ProducerError::RateLimited { retry_after_ms: 10 }.is_transient());
        assert!(!ProducerError::Rejected("policy".into()).is_transient());
    }
}
