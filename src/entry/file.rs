use super::{impl_entry_common, EntryCore};
use crate::error::{Error, FilesystemError, Result};
use crate::filesystem::RemoteFilesystem;
use crate::path;
use crate::range::ByteRange;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use log::{debug, info};
use mime::Mime;

/// Streamed file content.
pub type ContentStream = BoxStream<'static, Result<Bytes>>;

/// Leaf entry backed by a single object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteFile {
    core: EntryCore,
}

impl_entry_common!(RemoteFile);

impl RemoteFile {
    pub fn new(fs: &RemoteFilesystem, path: &str) -> Result<Self> {
        path::validate(path, false)?;
        Ok(Self {
            core: EntryCore::new(fs, path.to_string()),
        })
    }

    pub async fn exists(&self) -> Result<bool> {
        self.core.probe().await
    }

    /// Upload `content` to this path, replacing any existing object.
    ///
    /// The returned file is built from the name the server confirmed.
    pub async fn write(&self, content: impl Into<Bytes>, content_type: &Mime) -> Result<RemoteFile> {
        let fs = self.filesystem();
        let content = content.into();
        let size = content.len();
        let metadata = fs
            .connection()
            .upload_object(
                fs.bucket(),
                self.key(),
                content_type,
                content,
                Some(fs.settings().selectors.default.as_str()),
            )
            .await?;
        info!("Uploaded {} bytes to {} in {}", size, self.path(), fs.bucket());
        RemoteFile::new(fs, &path::path_from_key(&metadata.name))
    }

    /// Stream the file's content.
    ///
    /// No arguments reads everything. A single bound `n` reads the first `n`
    /// bytes. Two bounds `(start, end)` read `[start, end)`. Bad bounds fail
    /// before anything is sent to the store.
    pub async fn read(&self, start_or_end: Option<i64>, end: Option<i64>) -> Result<ContentStream> {
        let range = match (start_or_end, end) {
            (None, None) => None,
            (Some(start), Some(end)) => Some(ByteRange::from_half_open(start, end)?),
            (Some(n), None) | (None, Some(n)) => Some(ByteRange::from_half_open(0, n)?),
        };
        if let Some(range) = &range {
            debug!("Reading {} of {}", range, self.path());
        }

        let fs = self.filesystem();
        let stream = fs
            .connection()
            .download_object(fs.bucket(), self.key(), range)
            .await?;
        Ok(stream.map_err(Error::from).boxed())
    }

    /// Collect a [`read`](Self::read) into one buffer.
    pub async fn read_to_bytes(&self, start_or_end: Option<i64>, end: Option<i64>) -> Result<Bytes> {
        let buffer = self
            .read(start_or_end, end)
            .await?
            .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
                buffer.extend_from_slice(&chunk);
                Ok::<_, Error>(buffer)
            })
            .await?;
        Ok(buffer.freeze())
    }

    /// Copy this file to `destination`, which may live in another bucket.
    pub async fn copy_to(&self, destination: &RemoteFile) -> Result<RemoteFile> {
        if destination.exists().await? {
            return Err(FilesystemError::DestinationExists(destination.path().to_string()).into());
        }

        let src = self.filesystem();
        let dst = destination.filesystem();
        let metadata = src
            .connection()
            .copy_object(
                src.bucket(),
                self.key(),
                dst.bucket(),
                destination.key(),
                Some(dst.settings().selectors.probe.as_str()),
            )
            .await?;
        info!(
            "Copied {}:{} to {}:{}",
            src.bucket(),
            self.path(),
            dst.bucket(),
            destination.path()
        );
        RemoteFile::new(dst, &path::path_from_key(&metadata.name))
    }

    /// Copy, then delete the source. The two steps are not atomic: when the
    /// delete fails the copy at `destination` is left in place.
    pub async fn move_to(self, destination: &RemoteFile) -> Result<RemoteFile> {
        let moved = self.copy_to(destination).await?;
        let source = self.path().to_string();
        self.delete().await?;
        info!("Moved {} to {}", source, moved.path());
        Ok(moved)
    }

    pub async fn delete(self) -> Result<Self> {
        let fs = self.filesystem();
        fs.connection().delete_object(fs.bucket(), self.key()).await?;
        info!("Deleted file {} in {}", self.path(), fs.bucket());
        Ok(self)
    }

    /// Size of the object in bytes, fetched from the store on every call.
    pub async fn length(&self) -> Result<u64> {
        let fs = self.filesystem();
        let metadata = fs
            .connection()
            .get_object(
                fs.bucket(),
                self.key(),
                Some(fs.settings().selectors.length.as_str()),
            )
            .await?;
        Ok(metadata.size.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryConnection;
    use crate::error::{PathError, RangeError};
    use std::sync::Arc;

    fn filesystem() -> (Arc<MemoryConnection>, RemoteFilesystem) {
        let conn = Arc::new(MemoryConnection::new());
        let fs = RemoteFilesystem::new(conn.clone(), "bucket");
        (conn, fs)
    }

    #[test]
    fn test_new_rejects_folder_path() {
        let (_, fs) = filesystem();
        assert!(matches!(
            RemoteFile::new(&fs, "/docs/"),
            Err(Error::Path(PathError::InvalidFile(_)))
        ));
    }

    #[tokio::test]
    async fn test_bad_ranges_fail_before_download() {
        let (conn, fs) = filesystem();
        let file = fs.file("/a.txt").unwrap();

        for (start, end) in [(5, 5), (5, 3)] {
            let err = file.read(Some(start), Some(end)).await.err().unwrap();
            assert!(matches!(err, Error::Range(RangeError::EndNotAfterStart { .. })));
        }
        let err = file.read(Some(-1), Some(4)).await.err().unwrap();
        assert!(matches!(err, Error::Range(RangeError::NegativeStart(-1))));
        assert!(file.read(Some(0), None).await.is_err());

        assert_eq!(conn.get_call_count("download_object"), 0);
    }

    #[tokio::test]
    async fn test_length_reads_size() {
        let (conn, fs) = filesystem();
        conn.insert_object("bucket", "a.txt", Bytes::from_static(b"hello"), &mime::TEXT_PLAIN);
        assert_eq!(fs.file("/a.txt").unwrap().length().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_write_returns_fresh_entry() {
        let (conn, fs) = filesystem();
        let file = fs.file("/notes.txt").unwrap();

        let written = file.write("hi", &mime::TEXT_PLAIN).await.unwrap();
        assert_eq!(written, file);
        assert!(!written.cache().is_populated());
        assert_eq!(conn.contents("bucket", "notes.txt").unwrap(), Bytes::from_static(b"hi"));
    }
}
