//! Validation outcomes: which field, at which nesting path, and whether the
//! caller should retry the producer or treat the failure as a bug.

use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Paths
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum PathSegment {
    Field(String),
    Index(usize),
}

/// Dotted/indexed location of a value inside a record, e.g.
/// `senses[2].link_chain_variations[0].image_data.url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Field(name.to_string()));
        next
    }

    pub fn index(&self, i: usize) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Index(i));
        next
    }

    /// Name of the innermost field, skipping trailing indices.
    pub fn last_field(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|s| match s {
            PathSegment::Field(f) => Some(f.as_str()),
            PathSegment::Index(_) => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                PathSegment::Field(name) if i == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Field errors
// ============================================================================

/// What the caller should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The producer emitted something malformed; asking again may help.
    Retry,
    /// The orchestration is wrong; asking again will fail the same way.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldError {
    /// Wrong primitive type, enum tag outside its set, or a collection of the
    /// wrong size.
    #[error("expected {expected}, found {found}")]
    Shape { expected: String, found: String },

    #[error("required field `{field}` is missing")]
    RequiredFieldMissing { field: String },

    #[error("unexpected field `{field}` in {entity}")]
    UnexpectedField { entity: &'static str, field: String },

    /// A child names a different parent than the aggregate that owns it.
    #[error("belongs to word {expected} but references word {found}")]
    ParentMismatch { expected: Uuid, found: Uuid },
}

impl FieldError {
    pub fn shape(expected: impl Into<String>, found: impl Into<String>) -> Self {
        FieldError::Shape {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            FieldError::RequiredFieldMissing { field } if field == "base_word_id" => {
                Disposition::Fatal
            }
            FieldError::ParentMismatch { .. } => Disposition::Fatal,
            _ => Disposition::Retry,
        }
    }
}

/// A [`FieldError`] located inside a nested record.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[error("{path}: {error}")]
pub struct EntityPathError {
    pub path: FieldPath,
    #[source]
    pub error: FieldError,
}

impl EntityPathError {
    pub fn new(path: FieldPath, error: FieldError) -> Self {
        Self { path, error }
    }
}

// ============================================================================
// Aggregated report
// ============================================================================

/// Every issue found in one validation pass over one entity.
///
/// A build either yields a complete record or one of these; never both and
/// never a partially populated record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Which entity instance was being validated, e.g. `word "makan"`.
    pub entity: String,
    pub issues: Vec<EntityPathError>,
}

impl ValidationReport {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            issues: Vec::new(),
        }
    }

    pub fn push(&mut self, path: FieldPath, error: FieldError) {
        self.issues.push(EntityPathError::new(path, error));
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Issue at an exact rendered path, if any.
    pub fn at(&self, path: &str) -> Option<&EntityPathError> {
        self.issues.iter().find(|i| i.path.to_string() == path)
    }

    /// Fatal if any single issue is fatal.
    pub fn disposition(&self) -> Disposition {
        if self
            .issues
            .iter()
            .any(|i| i.error.disposition() == Disposition::Fatal)
        {
            Disposition::Fatal
        } else {
            Disposition::Retry
        }
    }

    /// True when some issue points at the orchestration rather than the
    /// producer, e.g. a child validated before its parent assigned an id.
    pub fn is_orchestration_bug(&self) -> bool {
        self.disposition() == Disposition::Fatal
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed validation with {} issue(s)",
            self.entity,
            self.issues.len()
        )?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}
