//! Decode errors.

use thiserror::Error;

/// Failure to decode an import document.
///
/// Every structural variant carries the JSON path of the offending node,
/// rooted at `$` (e.g. `$[0].threads[1].emails[2].from`).
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input bytes are not valid JSON.
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    /// A required key is absent (or null).
    #[error("{path}: missing required field `{field}`")]
    MissingField { path: String, field: &'static str },

    /// A node is present but has the wrong JSON type.
    #[error("{path}: expected {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
    },
}

impl ParseError {
    /// JSON path of the offending node, if the error is structural.
    pub fn path(&self) -> Option<&str> {
        match self {
            ParseError::Syntax(_) => None,
            ParseError::MissingField { path, .. } | ParseError::WrongType { path, .. } => {
                Some(path)
            }
        }
    }
}
