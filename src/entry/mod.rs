//! Folder and file entries addressed by path
//!
//! An entry is identified by its filesystem (bucket) and path alone. Each
//! entry instance owns a private metadata cache; entries built independently
//! for the same path compare equal but never share cached values.

mod file;
mod folder;

pub use file::{ContentStream, RemoteFile};
pub use folder::{EntryStream, RemoteFolder};

use crate::cache::EntryCache;
use crate::connection::{MetadataMutator, ObjectMetadata};
use crate::error::{Error, Result};
use crate::filesystem::RemoteFilesystem;
use crate::path;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// State shared by folders and files: where the entry lives and its cache.
pub(crate) struct EntryCore {
    fs: RemoteFilesystem,
    path: String,
    cache: EntryCache,
}

impl EntryCore {
    /// Caller must have validated `path`.
    fn new(fs: &RemoteFilesystem, path: String) -> Self {
        Self {
            fs: fs.clone(),
            path,
            cache: EntryCache::new(),
        }
    }

    fn key(&self) -> &str {
        path::object_key(&self.path)
    }

    /// Lightweight existence check; not-found maps to `false`.
    async fn probe(&self) -> Result<bool> {
        let selector = self.fs.settings().selectors.probe.as_str();
        match self
            .fs
            .connection()
            .get_object(self.fs.bucket(), self.key(), Some(selector))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let e = Error::from(e);
                if e.is_not_found() {
                    debug!("{} does not exist", self.path);
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn fetch_properties(&mut self) -> Result<HashMap<String, String>> {
        let selector = self.fs.settings().selectors.metadata.as_str();
        let metadata = self
            .fs
            .connection()
            .get_object(self.fs.bucket(), self.key(), Some(selector))
            .await?;
        let properties = metadata.properties();
        self.cache.replace(properties.clone());
        Ok(properties)
    }

    async fn get_property(&mut self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.cache.lookup(key) {
            return Ok(value.cloned());
        }
        debug!("Cache miss for {} on {}", key, self.path);
        Ok(self.fetch_properties().await?.remove(key))
    }

    async fn set_property(&mut self, key: &str, value: &str) -> Result<()> {
        let (k, v) = (key.to_string(), value.to_string());
        let mutator: MetadataMutator = Box::new(move |metadata: &mut ObjectMetadata| {
            metadata.metadata.get_or_insert_with(HashMap::new).insert(k, v);
        });
        let selector = self.fs.settings().selectors.metadata.as_str();
        let metadata = self
            .fs
            .connection()
            .update_object(
                self.fs.bucket(),
                self.key(),
                mutator,
                Some(selector),
                Some(selector),
            )
            .await?;
        self.cache.replace(metadata.properties());
        Ok(())
    }

    async fn properties(&mut self) -> Result<HashMap<String, String>> {
        if let Some(values) = self.cache.values() {
            return Ok(values.clone());
        }
        self.fetch_properties().await
    }

    async fn metadata(&mut self) -> Result<ObjectMetadata> {
        let selector = self.fs.settings().selectors.default.as_str();
        let metadata = self
            .fs
            .connection()
            .get_object(self.fs.bucket(), self.key(), Some(selector))
            .await?;
        self.cache.replace(metadata.properties());
        Ok(metadata)
    }
}

/// Clones address the same path but start with an empty cache.
impl Clone for EntryCore {
    fn clone(&self) -> Self {
        Self::new(&self.fs, self.path.clone())
    }
}

impl PartialEq for EntryCore {
    fn eq(&self, other: &Self) -> bool {
        self.fs == other.fs && self.path == other.path
    }
}

impl Eq for EntryCore {}

impl Hash for EntryCore {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fs.hash(state);
        self.path.hash(state);
    }
}

impl fmt::Debug for EntryCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("bucket", &self.fs.bucket())
            .field("path", &self.path)
            .field("cached", &self.cache.is_populated())
            .finish()
    }
}

/// Operations every entry supports, implemented once over [`EntryCore`].
macro_rules! impl_entry_common {
    ($ty:ty) => {
        impl $ty {
            pub fn path(&self) -> &str {
                &self.core.path
            }

            pub fn filesystem(&self) -> &crate::filesystem::RemoteFilesystem {
                &self.core.fs
            }

            /// Final path component.
            pub fn name(&self) -> &str {
                crate::path::name(&self.core.path)
            }

            /// Object key backing this entry.
            pub fn key(&self) -> &str {
                self.core.key()
            }

            pub fn parent(&self) -> crate::entry::RemoteFolder {
                crate::entry::RemoteFolder::from_validated(
                    &self.core.fs,
                    crate::path::parent_path(&self.core.path),
                )
            }

            /// Value of a user property, served from the cache when populated.
            pub async fn get_property(&mut self, key: &str) -> crate::error::Result<Option<String>> {
                self.core.get_property(key).await
            }

            /// Write a user property remotely and refresh the cache from the
            /// server's answer.
            pub async fn set_property(&mut self, key: &str, value: &str) -> crate::error::Result<()> {
                self.core.set_property(key, value).await
            }

            pub async fn properties(
                &mut self,
            ) -> crate::error::Result<std::collections::HashMap<String, String>> {
                self.core.properties().await
            }

            pub async fn metadata(&mut self) -> crate::error::Result<crate::connection::ObjectMetadata> {
                self.core.metadata().await
            }

            pub fn invalidate_cache(&mut self) {
                self.core.cache.invalidate();
            }

            pub fn cache(&self) -> &crate::cache::EntryCache {
                &self.core.cache
            }
        }
    };
}

pub(crate) use impl_entry_common;

/// A path in the tree: either a folder or a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteEntry {
    Folder(RemoteFolder),
    File(RemoteFile),
}

impl RemoteEntry {
    /// The one place that decides folder versus file, from the trailing delimiter.
    pub fn new(fs: &RemoteFilesystem, path: &str) -> Result<Self> {
        if path::is_folder_path(path) {
            Ok(Self::Folder(RemoteFolder::new(fs, path)?))
        } else {
            Ok(Self::File(RemoteFile::new(fs, path)?))
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Folder(folder) => folder.path(),
            Self::File(file) => file.path(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Folder(folder) => folder.name(),
            Self::File(file) => file.name(),
        }
    }

    pub fn filesystem(&self) -> &RemoteFilesystem {
        match self {
            Self::Folder(folder) => folder.filesystem(),
            Self::File(file) => file.filesystem(),
        }
    }

    pub fn parent(&self) -> RemoteFolder {
        match self {
            Self::Folder(folder) => folder.parent(),
            Self::File(file) => file.parent(),
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }

    pub fn as_folder(&self) -> Option<&RemoteFolder> {
        match self {
            Self::Folder(folder) => Some(folder),
            Self::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&RemoteFile> {
        match self {
            Self::File(file) => Some(file),
            Self::Folder(_) => None,
        }
    }

    pub fn into_folder(self) -> Option<RemoteFolder> {
        match self {
            Self::Folder(folder) => Some(folder),
            Self::File(_) => None,
        }
    }

    pub fn into_file(self) -> Option<RemoteFile> {
        match self {
            Self::File(file) => Some(file),
            Self::Folder(_) => None,
        }
    }

    pub async fn exists(&self) -> Result<bool> {
        match self {
            Self::Folder(folder) => folder.exists().await,
            Self::File(file) => file.exists().await,
        }
    }

    pub async fn get_property(&mut self, key: &str) -> Result<Option<String>> {
        match self {
            Self::Folder(folder) => folder.get_property(key).await,
            Self::File(file) => file.get_property(key).await,
        }
    }

    pub async fn set_property(&mut self, key: &str, value: &str) -> Result<()> {
        match self {
            Self::Folder(folder) => folder.set_property(key, value).await,
            Self::File(file) => file.set_property(key, value).await,
        }
    }

    pub async fn properties(&mut self) -> Result<HashMap<String, String>> {
        match self {
            Self::Folder(folder) => folder.properties().await,
            Self::File(file) => file.properties().await,
        }
    }

    pub async fn metadata(&mut self) -> Result<ObjectMetadata> {
        match self {
            Self::Folder(folder) => folder.metadata().await,
            Self::File(file) => file.metadata().await,
        }
    }

    /// Delete the entry. `recursive` only matters for folders.
    pub async fn delete(self, recursive: bool) -> Result<Self> {
        match self {
            Self::Folder(folder) => Ok(Self::Folder(folder.delete(recursive).await?)),
            Self::File(file) => Ok(Self::File(file.delete().await?)),
        }
    }
}

impl From<RemoteFolder> for RemoteEntry {
    fn from(folder: RemoteFolder) -> Self {
        Self::Folder(folder)
    }
}

impl From<RemoteFile> for RemoteEntry {
    fn from(file: RemoteFile) -> Self {
        Self::File(file)
    }
}
