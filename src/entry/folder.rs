use super::{impl_entry_common, EntryCore, RemoteEntry, RemoteFile};
use crate::connection::ListItem;
use crate::error::{FilesystemError, Result};
use crate::filesystem::RemoteFilesystem;
use crate::path::{self, DELIMITER, ROOT_PATH};
use async_recursion::async_recursion;
use bytes::Bytes;
use futures::future;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use log::{debug, info, warn};

/// Lazily produced children of a folder.
pub type EntryStream = BoxStream<'static, Result<RemoteEntry>>;

/// Container entry. A folder is backed by a zero-length marker object whose
/// key ends with the delimiter; the root has no marker and always exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteFolder {
    core: EntryCore,
}

impl_entry_common!(RemoteFolder);

impl RemoteFolder {
    pub fn new(fs: &RemoteFilesystem, path: &str) -> Result<Self> {
        path::validate(path, true)?;
        Ok(Self::from_validated(fs, path.to_string()))
    }

    pub fn root(fs: &RemoteFilesystem) -> Self {
        Self::from_validated(fs, ROOT_PATH.to_string())
    }

    pub(crate) fn from_validated(fs: &RemoteFilesystem, path: String) -> Self {
        Self {
            core: EntryCore::new(fs, path),
        }
    }

    pub fn is_root(&self) -> bool {
        self.path() == ROOT_PATH
    }

    /// Child folder named `name` (a trailing delimiter is optional).
    pub fn folder(&self, name: &str) -> Result<RemoteFolder> {
        let child = path::join(self.path(), name.trim_end_matches(DELIMITER));
        RemoteFolder::new(self.filesystem(), &format!("{}{}", child, DELIMITER))
    }

    /// Child file named `name`.
    pub fn file(&self, name: &str) -> Result<RemoteFile> {
        RemoteFile::new(self.filesystem(), &path::join(self.path(), name))
    }

    pub async fn exists(&self) -> Result<bool> {
        if self.is_root() {
            return Ok(true);
        }
        self.core.probe().await
    }

    /// Direct children in listing order. The folder's own marker is skipped,
    /// as are store keys that do not form valid paths.
    pub fn list(&self) -> EntryStream {
        let fs = self.filesystem().clone();
        let own_key = self.key().to_string();
        let items = fs.connection().list_bucket(
            fs.bucket(),
            &own_key,
            DELIMITER,
            Some(fs.settings().selectors.probe.as_str()),
        );

        items
            .filter_map(move |item| {
                let entry = match item {
                    Ok(ListItem::Prefix(key)) => child_entry(&fs, &own_key, &key),
                    Ok(ListItem::Object(object)) => child_entry(&fs, &own_key, &object.name),
                    Err(e) => Some(Err(e.into())),
                };
                future::ready(entry)
            })
            .boxed()
    }

    /// True when nothing but the folder's own marker lives under its prefix.
    /// Keys that `list` skips still count.
    pub async fn is_empty(&self) -> Result<bool> {
        let fs = self.filesystem();
        let own_key = self.key();
        let mut items = fs.connection().list_bucket(
            fs.bucket(),
            own_key,
            DELIMITER,
            Some(fs.settings().selectors.probe.as_str()),
        );

        while let Some(item) = items.try_next().await? {
            let key = match &item {
                ListItem::Prefix(key) => key.as_str(),
                ListItem::Object(object) => object.name.as_str(),
            };
            if key != own_key {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Create the marker object for this folder.
    ///
    /// Returns the folder untouched if it already exists. A missing parent is
    /// an error unless `recursive` is set, in which case the parent chain is
    /// created first, one level at a time.
    #[async_recursion]
    pub async fn create(self, recursive: bool) -> Result<Self> {
        if self.exists().await? {
            debug!("Folder {} already exists", self.path());
            return Ok(self);
        }

        let parent = self.parent();
        if !parent.exists().await? {
            if !recursive {
                return Err(FilesystemError::NoSuchFolderOrFile(parent.path().to_string()).into());
            }
            parent.create(true).await?;
        }

        let fs = self.filesystem();
        fs.connection()
            .upload_object(
                fs.bucket(),
                self.key(),
                &mime::APPLICATION_OCTET_STREAM,
                Bytes::new(),
                Some(fs.settings().selectors.probe.as_str()),
            )
            .await?;
        info!("Created folder {} in {}", self.path(), fs.bucket());
        Ok(self)
    }

    /// Delete the folder's marker, after its children when `recursive` is set.
    ///
    /// Children are deleted one at a time in listing order. The first failure
    /// stops the walk; children already deleted stay deleted and the marker is
    /// kept. A folder still holding objects after its children are gone, such
    /// as objects under keys that are not valid paths, keeps its marker too.
    #[async_recursion]
    pub async fn delete(self, recursive: bool) -> Result<Self> {
        if !self.is_empty().await? {
            if !recursive {
                return Err(FilesystemError::FolderNotEmpty(self.path().to_string()).into());
            }
            let children: Vec<RemoteEntry> = self.list().try_collect().await?;
            for child in children {
                let child_path = child.path().to_string();
                if let Err(e) = child.delete(true).await {
                    warn!(
                        "Aborting delete of {}: failed to delete {}: {}",
                        self.path(),
                        child_path,
                        e
                    );
                    return Err(e);
                }
            }
            if !self.is_empty().await? {
                warn!("Objects left under {} that are not valid paths", self.path());
                return Err(FilesystemError::FolderNotEmpty(self.path().to_string()).into());
            }
        }

        if self.is_root() {
            debug!("Root folder has no marker to delete");
            return Ok(self);
        }

        let fs = self.filesystem();
        fs.connection().delete_object(fs.bucket(), self.key()).await?;
        info!("Deleted folder {} in {}", self.path(), fs.bucket());
        Ok(self)
    }
}

fn child_entry(fs: &RemoteFilesystem, own_key: &str, key: &str) -> Option<Result<RemoteEntry>> {
    if key == own_key {
        return None;
    }
    match RemoteEntry::new(fs, &path::path_from_key(key)) {
        Ok(entry) => Some(Ok(entry)),
        Err(e) => {
            warn!("Skipping listed key {:?}: {}", key, e);
            None
        }
    }
}
