// promptmap/src/record.rs
//! Declaration record: one item on its way into the tree.
//!
//! A record names the container chain (`["ProjectA", "My.Namespace", "MyType"]`)
//! and optionally carries one formatted member line for the last container.
//! Records with no line only establish containers.
//!
//! JSONL shape (one per line):
//! `{"path": ["P", "NS", "T"], "line": "Method void Foo() [public]", "sort_key": "Foo"}`

use serde::{Deserialize, Serialize};

use crate::error::AggregateError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    /// Secondary ordering key, used only when lines are rendered in stable order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
}

impl Record {
    /// Container-only record.
    pub fn container<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            line: None,
            sort_key: None,
        }
    }

    /// Record carrying one member line.
    pub fn member<I, S>(path: I, line: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            line: Some(line.into()),
            ..Self::container(path)
        }
    }

    pub fn with_sort_key(mut self, key: impl Into<String>) -> Self {
        self.sort_key = Some(key.into());
        self
    }

    /// Reject empty paths and empty segments. Nothing is coerced.
    pub fn validate(&self) -> Result<(), AggregateError> {
        validate_segments(&self.path)
    }
}

pub(crate) fn validate_segments<S: AsRef<str>>(segments: &[S]) -> Result<(), AggregateError> {
    if segments.is_empty() {
        return Err(AggregateError::EmptyPath);
    }
    match segments.iter().position(|s| s.as_ref().is_empty()) {
        Some(index) => Err(AggregateError::EmptySegment { index }),
        None => Ok(()),
    }
}
