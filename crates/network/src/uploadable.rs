use std::collections::HashMap;

use bytes::Bytes;

/// Files attached to a request, keyed by the variable they bind to.
pub type UploadableMap = HashMap<String, Uploadable>;

/// A file attached to a mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Uploadable {
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type, if known.
    pub content_type: Option<String>,
    /// File contents.
    pub data: Bytes,
}

impl Uploadable {
    /// A file with unknown content type.
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Whether `uploadables` carries at least one file. An empty map counts as
/// absent.
#[must_use]
pub fn has_uploadables(uploadables: Option<&UploadableMap>) -> bool {
    uploadables.is_some_and(|map| !map.is_empty())
}
