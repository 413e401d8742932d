use chrono::NaiveDateTime;
use thiserror::Error;

use crate::types::Label;

/// Domain-level failures that do not involve the graph store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid range: start {start} is not before stop {stop}")]
    InvalidRange {
        start: NaiveDateTime,
        stop: NaiveDateTime,
    },

    #[error("validation failed: argument group '{group}' is missing required key '{key}'")]
    MissingKey { group: String, key: String },

    #[error("validation failed: argument group '{group}' must reference a {expected} entity")]
    LabelMismatch { group: String, expected: Label },
}

impl DomainError {
    pub fn missing_key(group: &str, key: &str) -> Self {
        Self::MissingKey {
            group: group.to_string(),
            key: key.to_string(),
        }
    }

    pub fn label_mismatch(group: &str, expected: Label) -> Self {
        Self::LabelMismatch {
            group: group.to_string(),
            expected,
        }
    }
}
