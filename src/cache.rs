use log::debug;
use std::collections::HashMap;

/// Metadata cache owned by a single entry.
///
/// The cache is either empty (never fetched, or invalidated) or holds the
/// complete metadata map from the last fetch. It is only ever replaced as a
/// whole; there are no per-key writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryCache {
    values: Option<HashMap<String, String>>,
}

impl EntryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a metadata map has been fetched since the last invalidation.
    pub fn is_populated(&self) -> bool {
        self.values.is_some()
    }

    /// Cached value for `key`.
    ///
    /// `None` means the cache must be fetched; `Some(None)` means the cache is
    /// populated and the key is absent.
    pub fn lookup(&self, key: &str) -> Option<Option<&String>> {
        self.values.as_ref().map(|values| values.get(key))
    }

    pub fn values(&self) -> Option<&HashMap<String, String>> {
        self.values.as_ref()
    }

    /// Replace the whole cache with a freshly fetched metadata map.
    pub fn replace(&mut self, values: HashMap<String, String>) {
        debug!("Replacing entry cache with {} keys", values.len());
        self.values = Some(values);
    }

    pub fn invalidate(&mut self) {
        self.values = None;
    }
}
