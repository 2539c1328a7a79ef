//! Operation descriptors and request identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Variables of an operation.
pub type Variables = Map<String, Value>;

/// Kind of a declared operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Read-only request.
    Query,
    /// Request with side effects.
    Mutation,
    /// Long-lived stream of server events.
    Subscription,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => f.write_str("query"),
            Self::Mutation => f.write_str("mutation"),
            Self::Subscription => f.write_str("subscription"),
        }
    }
}

/// Immutable descriptor of a compiled operation.
///
/// Either `id` (a persisted query) or `text` identifies the document sent to
/// the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    /// Persisted query id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Identity used when no persisted id exists.
    pub cache_id: String,
    /// Operation name.
    pub name: String,
    /// Document text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Kind of the operation.
    pub operation_kind: OperationKind,
    /// Free-form metadata attached at compile time.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RequestParameters {
    /// Descriptor for a document sent as text; `cache_id` is the name.
    pub fn new(
        name: impl Into<String>,
        operation_kind: OperationKind,
        text: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: None,
            cache_id: name.clone(),
            name,
            text: Some(text.into()),
            operation_kind,
            metadata: Map::new(),
        }
    }

    /// Descriptor for a persisted document.
    pub fn persisted(
        name: impl Into<String>,
        operation_kind: OperationKind,
        id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            cache_id: id.clone(),
            id: Some(id),
            name: name.into(),
            text: None,
            operation_kind,
            metadata: Map::new(),
        }
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// The operation kind.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.operation_kind
    }

    /// Stable identity: the persisted id when present, otherwise `cache_id`.
    #[must_use]
    pub fn identifier(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.cache_id)
    }
}

/// Identity of an operation executed with `variables`.
///
/// Object keys are sorted so that equal variables always produce the same
/// identifier regardless of insertion order.
#[must_use]
pub fn request_identifier(params: &RequestParameters, variables: &Variables) -> String {
    let mut out = String::from(params.identifier());
    out.push_str(&stable_variables(variables));
    out
}

/// `variables` as JSON with object keys sorted at every level.
pub(crate) fn stable_variables(variables: &Variables) -> String {
    let mut out = String::new();
    write_stable(&mut out, &Value::Object(variables.clone()));
    out
}

fn write_stable(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_stable(out, inner);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_stable(out, item);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
