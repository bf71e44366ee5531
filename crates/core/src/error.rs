use std::fmt;

use serde::{Deserialize, Serialize};

/// A string that did not name any variant of a closed vocabulary.
///
/// `kind` names the vocabulary ("grant status", "reason operation", ...)
/// so callers can surface the message to clients unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseError {
    pub kind: String,
    pub value: String,
    pub expected: Vec<String>,
}

impl ParseError {
    pub fn new(kind: &str, value: &str, expected: &[&str]) -> Self {
        ParseError {
            kind: kind.to_owned(),
            value: value.to_owned(),
            expected: expected.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} '{}' (expected one of: {})",
            self.kind,
            self.value,
            self.expected.join(", ")
        )
    }
}

impl std::error::Error for ParseError {}
