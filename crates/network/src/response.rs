use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One response payload of an operation.
///
/// Incremental delivery (`@defer`, `@stream`) produces several payloads for a
/// single operation; `label`, `path` and `has_next` describe their position.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlResponse {
    /// Result data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Field errors reported alongside (or instead of) the data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<PayloadError>>,
    /// Server extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
    /// Label of the deferred fragment or streamed field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Path of the incremental payload within the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    /// Whether more payloads follow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_next: Option<bool>,
}

impl GraphQlResponse {
    /// A payload carrying only `data`.
    #[must_use]
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Whether the payload reports any error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}

/// An error entry of a response payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayloadError {
    /// Human readable description.
    pub message: String,
    /// Locations in the request document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<SourceLocation>>,
    /// Path of the failing field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    /// Server-specific details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl PayloadError {
    /// An error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }
}

/// Line and column in a request document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// One-based line.
    pub line: u32,
    /// One-based column.
    pub column: u32,
}
