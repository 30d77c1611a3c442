use crate::config::Settings;
use crate::connection::Connection;
use crate::entry::{RemoteEntry, RemoteFile, RemoteFolder};
use crate::error::Result;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Root of a path-addressed tree stored in one bucket.
///
/// Cheap to clone; clones share the connection and settings. Two filesystems
/// are equal when they address the same bucket.
#[derive(Clone)]
pub struct RemoteFilesystem {
    connection: Arc<dyn Connection>,
    settings: Arc<Settings>,
}

impl RemoteFilesystem {
    pub fn new(connection: Arc<dyn Connection>, bucket: impl Into<String>) -> Self {
        Self::with_settings(connection, Settings::for_bucket(bucket))
    }

    pub fn with_settings(connection: Arc<dyn Connection>, settings: Settings) -> Self {
        Self {
            connection,
            settings: Arc::new(settings),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.settings.bucket
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    pub fn root(&self) -> RemoteFolder {
        RemoteFolder::root(self)
    }

    /// Entry for `path`: a folder if it ends with `/`, a file otherwise.
    pub fn entry(&self, path: &str) -> Result<RemoteEntry> {
        RemoteEntry::new(self, path)
    }

    pub fn folder(&self, path: &str) -> Result<RemoteFolder> {
        RemoteFolder::new(self, path)
    }

    pub fn file(&self, path: &str) -> Result<RemoteFile> {
        RemoteFile::new(self, path)
    }
}

impl PartialEq for RemoteFilesystem {
    fn eq(&self, other: &Self) -> bool {
        self.bucket() == other.bucket()
    }
}

impl Eq for RemoteFilesystem {}

impl Hash for RemoteFilesystem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bucket().hash(state);
    }
}

impl fmt::Debug for RemoteFilesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFilesystem")
            .field("bucket", &self.bucket())
            .finish()
    }
}
