//! In-process object store implementing [`Connection`]
//!
//! Objects live in a sorted map keyed by `(bucket, key)`, so listings come back
//! in key order like a real store. Every call is counted per operation name and
//! individual operations (optionally restricted to one key) can be made to fail.

use super::{
    ByteStream, Connection, ConnectionResult, ListItem, ListStream, MetadataMutator,
    ObjectMetadata, UploadStatus,
};
use crate::error::ConnectionError;
use crate::range::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use log::debug;
use mime::Mime;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

const UPLOAD_ENDPOINT: &str = "https://upload.memory.invalid/session/";

#[derive(Debug, Clone)]
struct StoredObject {
    metadata: ObjectMetadata,
    content: Bytes,
}

#[derive(Debug)]
enum UploadSession {
    Open {
        bucket: String,
        key: String,
        content_type: Mime,
        selector: Option<String>,
        received: Vec<u8>,
    },
    Finished(ObjectMetadata),
}

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<(String, String), StoredObject>,
    sessions: HashMap<String, UploadSession>,
    next_session: u64,
    next_generation: i64,
}

/// Operation (and optional key) that should fail on the next calls
#[derive(Debug, Clone, PartialEq, Eq)]
struct FailureRule {
    operation: String,
    key: Option<String>,
}

#[derive(Clone, Default)]
pub struct MemoryConnection {
    state: Arc<Mutex<StoreState>>,
    call_counter: Arc<Mutex<HashMap<String, usize>>>,
    failures: Arc<Mutex<Vec<FailureRule>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object directly, bypassing call counting and failure rules.
    pub fn insert_object(&self, bucket: &str, key: &str, content: impl Into<Bytes>, content_type: &Mime) {
        let mut state = lock(&self.state);
        let content = content.into();
        let metadata = state.new_metadata(bucket, key, content.len() as u64, content_type, None);
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject { metadata, content },
        );
    }

    /// Keys currently stored in `bucket`, in order.
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        lock(&self.state)
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn contents(&self, bucket: &str, key: &str) -> Option<Bytes> {
        lock(&self.state)
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.content.clone())
    }

    /// Make every call of `operation` fail
    pub fn make_operation_fail(&self, operation: &str) {
        self.add_failure(FailureRule {
            operation: operation.to_string(),
            key: None,
        });
    }

    /// Make calls of `operation` on `key` fail
    pub fn make_operation_fail_for(&self, operation: &str, key: &str) {
        self.add_failure(FailureRule {
            operation: operation.to_string(),
            key: Some(key.to_string()),
        });
    }

    pub fn clear_operation_failures(&self) {
        lock(&self.failures).clear();
    }

    pub fn get_call_count(&self, operation: &str) -> usize {
        lock(&self.call_counter).get(operation).copied().unwrap_or(0)
    }

    pub fn get_all_call_counts(&self) -> HashMap<String, usize> {
        lock(&self.call_counter).clone()
    }

    pub fn reset_call_counters(&self) {
        lock(&self.call_counter).clear();
    }

    fn add_failure(&self, rule: FailureRule) {
        let mut failures = lock(&self.failures);
        if !failures.contains(&rule) {
            failures.push(rule);
        }
    }

    /// Count the call, then fail it if a matching rule exists.
    fn check_operation(&self, operation: &str, key: &str) -> ConnectionResult<()> {
        *lock(&self.call_counter)
            .entry(operation.to_string())
            .or_insert(0) += 1;

        let failing = lock(&self.failures).iter().any(|rule| {
            rule.operation == operation && rule.key.as_deref().map_or(true, |k| k == key)
        });
        if failing {
            debug!("Injected failure for {} on {}", operation, key);
            return Err(ConnectionError::Status {
                code: 503,
                message: format!("Injected {} failure for {}", operation, key),
            });
        }
        Ok(())
    }
}

impl StoreState {
    fn new_metadata(
        &mut self,
        bucket: &str,
        key: &str,
        size: u64,
        content_type: &Mime,
        properties: Option<HashMap<String, String>>,
    ) -> ObjectMetadata {
        self.next_generation += 1;
        ObjectMetadata {
            name: key.to_string(),
            bucket: Some(bucket.to_string()),
            size: Some(size),
            content_type: Some(content_type.to_string()),
            etag: Some(format!("etag-{}", self.next_generation)),
            generation: Some(self.next_generation),
            updated: None,
            metadata: properties,
        }
    }

    fn get(&self, bucket: &str, key: &str) -> ConnectionResult<&StoredObject> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| not_found(bucket, key))
    }

    fn store(&mut self, bucket: &str, key: &str, content: Bytes, content_type: &Mime) -> ObjectMetadata {
        let metadata = self.new_metadata(bucket, key, content.len() as u64, content_type, None);
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                metadata: metadata.clone(),
                content,
            },
        );
        metadata
    }
}

fn not_found(bucket: &str, key: &str) -> ConnectionError {
    ConnectionError::NotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

fn persisted_range(received: u64) -> Option<ByteRange> {
    match received {
        0 => None,
        n => ByteRange::new(0, n - 1).ok(),
    }
}

fn parse_content_type(value: Option<&String>) -> Mime {
    value
        .and_then(|v| v.parse().ok())
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        selector: Option<&str>,
    ) -> ConnectionResult<ObjectMetadata> {
        self.check_operation("get_object", key)?;
        let state = lock(&self.state);
        Ok(state.get(bucket, key)?.metadata.select(selector))
    }

    async fn update_object(
        &self,
        bucket: &str,
        key: &str,
        mutator: MetadataMutator,
        read_selector: Option<&str>,
        result_selector: Option<&str>,
    ) -> ConnectionResult<ObjectMetadata> {
        self.check_operation("update_object", key)?;
        let mut state = lock(&self.state);
        state.next_generation += 1;
        let generation = state.next_generation;
        let object = state
            .objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| not_found(bucket, key))?;

        let mut current = object.metadata.select(read_selector);
        mutator(&mut current);
        if read_selector.map_or(true, |s| s.trim() == "*" || s.contains("metadata")) {
            object.metadata.metadata = current.metadata;
        }
        object.metadata.generation = Some(generation);
        object.metadata.etag = Some(format!("etag-{}", generation));
        Ok(object.metadata.select(result_selector))
    }

    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &Mime,
        content: Bytes,
        selector: Option<&str>,
    ) -> ConnectionResult<ObjectMetadata> {
        self.check_operation("upload_object", key)?;
        let mut state = lock(&self.state);
        let metadata = state.store(bucket, key, content, content_type);
        Ok(metadata.select(selector))
    }

    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> ConnectionResult<ByteStream> {
        self.check_operation("download_object", key)?;
        let content = lock(&self.state).get(bucket, key)?.content.clone();

        let content = match range {
            None => content,
            Some(range) => {
                let len = content.len() as u64;
                if range.start() >= len && len > 0 {
                    return Err(ConnectionError::Status {
                        code: 416,
                        message: format!("Range {} not satisfiable for {} bytes", range, len),
                    });
                }
                let end = range.next_offset().min(len);
                content.slice(range.start().min(len) as usize..end as usize)
            }
        };

        // Hand the content out in a few pieces so callers really stream it.
        let chunks: Vec<ConnectionResult<Bytes>> = content
            .chunks(4096)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }

    fn list_bucket(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: char,
        selector: Option<&str>,
    ) -> ListStream {
        if let Err(e) = self.check_operation("list_bucket", prefix) {
            return stream::once(async move { Err::<ListItem, _>(e) }).boxed();
        }

        let state = lock(&self.state);
        let mut items = Vec::new();
        let mut last_prefix: Option<String> = None;
        for ((b, key), object) in state.objects.iter() {
            if b != bucket || !key.starts_with(prefix) {
                continue;
            }
            let rest = &key[prefix.len()..];
            match rest.find(delimiter) {
                Some(idx) => {
                    let group = format!("{}{}", prefix, &rest[..=idx]);
                    if last_prefix.as_deref() != Some(group.as_str()) {
                        items.push(Ok(ListItem::Prefix(group.clone())));
                        last_prefix = Some(group);
                    }
                }
                None => items.push(Ok(ListItem::Object(object.metadata.select(selector)))),
            }
        }
        debug!("Listed {} items under {}/{}", items.len(), bucket, prefix);
        stream::iter(items).boxed()
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        selector: Option<&str>,
    ) -> ConnectionResult<ObjectMetadata> {
        self.check_operation("copy_object", src_key)?;
        let mut state = lock(&self.state);
        let source = state.get(src_bucket, src_key)?.clone();
        let content_type = parse_content_type(source.metadata.content_type.as_ref());
        let metadata = state.new_metadata(
            dst_bucket,
            dst_key,
            source.content.len() as u64,
            &content_type,
            source.metadata.metadata.clone(),
        );
        state.objects.insert(
            (dst_bucket.to_string(), dst_key.to_string()),
            StoredObject {
                metadata: metadata.clone(),
                content: source.content,
            },
        );
        Ok(metadata.select(selector))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ConnectionResult<()> {
        self.check_operation("delete_object", key)?;
        lock(&self.state)
            .objects
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(bucket, key))
    }

    async fn create_resumable_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &Mime,
        selector: Option<&str>,
    ) -> ConnectionResult<Url> {
        self.check_operation("create_resumable_upload", key)?;
        let mut state = lock(&self.state);
        state.next_session += 1;
        let session_id = format!("{}-{}", bucket, state.next_session);
        let uri = Url::parse(UPLOAD_ENDPOINT)
            .and_then(|base| base.join(&session_id))
            .map_err(|e| ConnectionError::Other(e.into()))?;
        state.sessions.insert(
            uri.to_string(),
            UploadSession::Open {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.clone(),
                selector: selector.map(str::to_string),
                received: Vec::new(),
            },
        );
        Ok(uri)
    }

    async fn upload_chunk(
        &self,
        upload_uri: &Url,
        offset: u64,
        data: Bytes,
        total_size: u64,
    ) -> ConnectionResult<UploadStatus> {
        self.check_operation("upload_chunk", upload_uri.as_str())?;
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let session = state
            .sessions
            .get_mut(upload_uri.as_str())
            .ok_or_else(|| ConnectionError::UnknownUploadSession(upload_uri.to_string()))?;

        let (bucket, key, content_type, selector, received) = match session {
            UploadSession::Finished(metadata) => return Ok(UploadStatus::Complete(metadata.clone())),
            UploadSession::Open {
                bucket,
                key,
                content_type,
                selector,
                received,
            } => (bucket, key, content_type, selector, received),
        };

        if offset > received.len() as u64 {
            return Err(ConnectionError::Status {
                code: 400,
                message: format!(
                    "Chunk at offset {} leaves a gap after {} persisted bytes",
                    offset,
                    received.len()
                ),
            });
        }
        received.truncate(offset as usize);
        received.extend_from_slice(&data);

        if (received.len() as u64) < total_size {
            return Ok(UploadStatus::InProgress {
                persisted: persisted_range(received.len() as u64),
            });
        }

        let content = Bytes::from(std::mem::take(received));
        let (bucket, key, content_type, selector) =
            (bucket.clone(), key.clone(), content_type.clone(), selector.clone());
        let metadata = state.store(&bucket, &key, content, &content_type);
        let result = metadata.select(selector.as_deref());
        state
            .sessions
            .insert(upload_uri.to_string(), UploadSession::Finished(result.clone()));
        Ok(UploadStatus::Complete(result))
    }

    async fn query_upload(&self, upload_uri: &Url) -> ConnectionResult<UploadStatus> {
        self.check_operation("query_upload", upload_uri.as_str())?;
        let state = lock(&self.state);
        match state.sessions.get(upload_uri.as_str()) {
            Some(UploadSession::Finished(metadata)) => Ok(UploadStatus::Complete(metadata.clone())),
            Some(UploadSession::Open { received, .. }) => Ok(UploadStatus::InProgress {
                persisted: persisted_range(received.len() as u64),
            }),
            None => Err(ConnectionError::UnknownUploadSession(upload_uri.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    const BUCKET: &str = "bucket";

    #[tokio::test]
    async fn test_list_groups_by_delimiter() {
        let conn = MemoryConnection::new();
        for key in ["a/", "a/b/", "a/b/c.txt", "a/d.txt", "e.txt"] {
            conn.insert_object(BUCKET, key, Bytes::new(), &mime::TEXT_PLAIN);
        }

        let items: Vec<ListItem> = conn.list_bucket(BUCKET, "a/", '/', None).try_collect().await.unwrap();
        let names: Vec<String> = items
            .iter()
            .map(|item| match item {
                ListItem::Prefix(p) => format!("prefix:{}", p),
                ListItem::Object(o) => format!("object:{}", o.name),
            })
            .collect();
        assert_eq!(names, vec!["object:a/", "prefix:a/b/", "object:a/d.txt"]);
    }

    #[tokio::test]
    async fn test_ranged_download() {
        let conn = MemoryConnection::new();
        conn.insert_object(BUCKET, "f", Bytes::from_static(b"0123456789"), &mime::TEXT_PLAIN);

        let range = ByteRange::new(2, 4).unwrap();
        let chunks: Vec<Bytes> = conn
            .download_object(BUCKET, "f", Some(range))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"234");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let conn = MemoryConnection::new();
        let err = conn.get_object(BUCKET, "missing", None).await.unwrap_err();
        assert!(matches!(err, ConnectionError::NotFound { .. }));
        assert_eq!(conn.get_call_count("get_object"), 1);
    }

    #[tokio::test]
    async fn test_failure_injection_by_key() {
        let conn = MemoryConnection::new();
        conn.insert_object(BUCKET, "x", Bytes::new(), &mime::TEXT_PLAIN);
        conn.insert_object(BUCKET, "y", Bytes::new(), &mime::TEXT_PLAIN);
        conn.make_operation_fail_for("delete_object", "y");

        assert!(conn.delete_object(BUCKET, "x").await.is_ok());
        assert!(conn.delete_object(BUCKET, "y").await.is_err());

        conn.clear_operation_failures();
        assert!(conn.delete_object(BUCKET, "y").await.is_ok());
    }

    #[tokio::test]
    async fn test_resumable_session_lifecycle() {
        let conn = MemoryConnection::new();
        let uri = conn
            .create_resumable_upload(BUCKET, "big.bin", &mime::APPLICATION_OCTET_STREAM, None)
            .await
            .unwrap();

        let status = conn.upload_chunk(&uri, 0, Bytes::from_static(b"abc"), 6).await.unwrap();
        assert_eq!(
            status,
            UploadStatus::InProgress {
                persisted: Some(ByteRange::new(0, 2).unwrap())
            }
        );
        assert_eq!(conn.query_upload(&uri).await.unwrap(), status);

        let status = conn.upload_chunk(&uri, 3, Bytes::from_static(b"def"), 6).await.unwrap();
        assert!(matches!(status, UploadStatus::Complete(ref m) if m.size == Some(6)));
        assert_eq!(conn.contents(BUCKET, "big.bin").unwrap(), Bytes::from_static(b"abcdef"));
    }
}
