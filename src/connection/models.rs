use crate::range::ByteRange;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ObjectMetadata: Represents an object as returned by the store.
/// Which fields are filled depends on the selector sent with the request.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    #[serde(default)]
    pub name: String,
    pub bucket: Option<String>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub generation: Option<i64>,
    pub updated: Option<String>,
    /// User-defined key/value properties
    pub metadata: Option<HashMap<String, String>>,
}

impl ObjectMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Copy of this record restricted to the fields named by `selector`.
    ///
    /// `selector` is a comma separated list of field names, or `*` for all
    /// fields. The object name is always kept.
    pub fn select(&self, selector: Option<&str>) -> Self {
        let selector = match selector {
            None => return self.clone(),
            Some(s) if s.trim() == "*" => return self.clone(),
            Some(s) => s,
        };
        let wanted: Vec<&str> = selector.split(',').map(str::trim).collect();
        let keep = |field: &str| wanted.contains(&field);

        Self {
            name: self.name.clone(),
            bucket: self.bucket.clone().filter(|_| keep("bucket")),
            size: self.size.filter(|_| keep("size")),
            content_type: self.content_type.clone().filter(|_| keep("contentType")),
            etag: self.etag.clone().filter(|_| keep("etag")),
            generation: self.generation.filter(|_| keep("generation")),
            updated: self.updated.clone().filter(|_| keep("updated")),
            metadata: self.metadata.clone().filter(|_| keep("metadata")),
        }
    }

    /// User properties, empty when none were returned.
    pub fn properties(&self) -> HashMap<String, String> {
        self.metadata.clone().unwrap_or_default()
    }
}

/// One element of a delimiter-grouped prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItem {
    /// Keys sharing a prefix up to the next delimiter, including that delimiter
    Prefix(String),
    /// A leaf object directly under the listed prefix
    Object(ObjectMetadata),
}

/// Server-side state of a resumable upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// Bytes acknowledged so far; `None` when nothing has been persisted
    InProgress { persisted: Option<ByteRange> },
    Complete(ObjectMetadata),
}
