//! Contract between the entry hierarchy and the object store
//!
//! Everything network related (transport, authentication, retries, JSON wire
//! format) lives behind [`Connection`]. The entry layer only ever talks to the
//! store through this trait.

pub mod memory;
pub mod models;

use crate::error::ConnectionError;
use crate::range::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use mime::Mime;
use url::Url;

pub use memory::MemoryConnection;
pub use models::{ListItem, ObjectMetadata, UploadStatus};

pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// Streamed object content.
pub type ByteStream = BoxStream<'static, ConnectionResult<Bytes>>;

/// Streamed prefix listing.
pub type ListStream = BoxStream<'static, ConnectionResult<ListItem>>;

/// Read-modify-write callback applied to an object's current metadata.
pub type MetadataMutator = Box<dyn FnOnce(&mut ObjectMetadata) + Send>;

/// Trait defining the object store operations the filesystem layer needs
#[async_trait]
pub trait Connection: Send + Sync {
    /// Fetch object metadata. Fails with [`ConnectionError::NotFound`] when
    /// the object does not exist.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        selector: Option<&str>,
    ) -> ConnectionResult<ObjectMetadata>;

    /// Read the current metadata, apply `mutator`, write it back.
    async fn update_object(
        &self,
        bucket: &str,
        key: &str,
        mutator: MetadataMutator,
        read_selector: Option<&str>,
        result_selector: Option<&str>,
    ) -> ConnectionResult<ObjectMetadata>;

    /// Upload the full content of an object, replacing any existing one.
    /// Zero-length content is valid.
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &Mime,
        content: Bytes,
        selector: Option<&str>,
    ) -> ConnectionResult<ObjectMetadata>;

    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> ConnectionResult<ByteStream>;

    /// List keys under `prefix`, grouping anything past the next `delimiter`
    /// into [`ListItem::Prefix`] entries.
    fn list_bucket(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: char,
        selector: Option<&str>,
    ) -> ListStream;

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        selector: Option<&str>,
    ) -> ConnectionResult<ObjectMetadata>;

    async fn delete_object(&self, bucket: &str, key: &str) -> ConnectionResult<()>;

    // Resumable upload sessions

    /// Open an upload session and return the endpoint that identifies it.
    async fn create_resumable_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &Mime,
        selector: Option<&str>,
    ) -> ConnectionResult<Url>;

    /// Send `data` starting at byte `offset` of an object of `total_size` bytes.
    async fn upload_chunk(
        &self,
        upload_uri: &Url,
        offset: u64,
        data: Bytes,
        total_size: u64,
    ) -> ConnectionResult<UploadStatus>;

    /// Ask the server how much of the session it has persisted.
    async fn query_upload(&self, upload_uri: &Url) -> ConnectionResult<UploadStatus>;
}
