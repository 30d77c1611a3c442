//! Checkpoint of a resumable upload
//!
//! A [`ResumeToken`] names the upload session, the selector used to shape
//! the final object record, and the byte range the server has acknowledged.
//! Tokens are values: progress produces a new token. The only live part is
//! the optional completion signal, which never leaves the process.

use crate::entry::RemoteFile;
use crate::error::{Error, Result, TokenSerializationError};
use crate::range::ByteRange;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::RangeInclusive;
use tokio::sync::oneshot;
use url::Url;

/// Record discriminant written by this version.
pub const TOKEN_TYPE: i64 = 0;

/// Discriminants accepted when reading a record back.
pub const SUPPORTED_TOKEN_TYPES: RangeInclusive<i64> = 0..=2;

pub const DEFAULT_SELECTOR: &str = "*";

const FIELD_TYPE: &str = "type";
const FIELD_UPLOAD_URI: &str = "uploadUri";
const FIELD_SELECTOR: &str = "selector";
const FIELD_RANGE: &str = "range";
const FIELD_DONE: &str = "done";

/// Receiving end of an upload's completion signal. Resolves exactly once.
pub type Completion = oneshot::Receiver<Result<RemoteFile>>;

/// Serialized form of a [`ResumeToken`].
///
/// `upload_uri` is written in the normalized form produced by [`Url`], so a
/// record read back and written again may differ from the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    #[serde(rename = "type")]
    pub kind: i64,
    pub upload_uri: String,
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<ByteRange>,
}

pub struct ResumeToken {
    upload_uri: Url,
    selector: String,
    range: Option<ByteRange>,
    done: Option<Completion>,
}

impl ResumeToken {
    pub fn new(
        upload_uri: Url,
        selector: Option<String>,
        range: Option<ByteRange>,
        done: Option<Completion>,
    ) -> Self {
        Self {
            upload_uri,
            selector: selector.unwrap_or_else(|| DEFAULT_SELECTOR.to_string()),
            range,
            done,
        }
    }

    /// Token for a session with nothing uploaded yet.
    pub fn from_uri(upload_uri: Url) -> Self {
        Self::new(upload_uri, None, None, None)
    }

    /// New token for the same session with `range` and `done` replaced.
    pub fn derive_with_progress(&self, range: Option<ByteRange>, done: Option<Completion>) -> Self {
        Self {
            upload_uri: self.upload_uri.clone(),
            selector: self.selector.clone(),
            range,
            done,
        }
    }

    pub fn upload_uri(&self) -> &Url {
        &self.upload_uri
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Bytes acknowledged by the server; `None` means nothing yet.
    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    /// Offset of the next byte to send.
    pub fn next_offset(&self) -> u64 {
        self.range.map_or(0, |r| r.next_offset())
    }

    pub fn has_completion(&self) -> bool {
        self.done.is_some()
    }

    /// Detach the completion signal, leaving a plain checkpoint behind.
    pub fn take_completion(&mut self) -> Option<Completion> {
        self.done.take()
    }

    /// Wait for the upload behind this token to finish.
    ///
    /// Returns `None` for tokens without a completion signal, which includes
    /// every deserialized token.
    pub async fn completion(self) -> Option<Result<RemoteFile>> {
        let done = self.done?;
        Some(done.await.unwrap_or(Err(Error::UploadInterrupted)))
    }

    pub fn to_record(&self) -> TokenRecord {
        TokenRecord {
            kind: TOKEN_TYPE,
            upload_uri: self.upload_uri.to_string(),
            selector: self.selector.clone(),
            range: self.range,
        }
    }

    pub fn to_value(&self) -> std::result::Result<Value, TokenSerializationError> {
        Ok(serde_json::to_value(self.to_record())?)
    }

    pub fn to_json(&self) -> std::result::Result<String, TokenSerializationError> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    /// Rebuild a token from its record. The result never carries a
    /// completion signal.
    pub fn from_value(value: &Value) -> std::result::Result<Self, TokenSerializationError> {
        let record = value
            .as_object()
            .ok_or_else(|| TokenSerializationError::Malformed("expected an object".to_string()))?;

        if record.contains_key(FIELD_DONE) {
            return Err(TokenSerializationError::CompletionNotSerializable);
        }

        let kind = field(record, FIELD_TYPE)
            .ok_or(TokenSerializationError::MissingType)?
            .as_i64()
            .ok_or_else(|| malformed(FIELD_TYPE, "an integer"))?;
        if !SUPPORTED_TOKEN_TYPES.contains(&kind) {
            return Err(TokenSerializationError::UnsupportedType(kind));
        }

        let upload_uri = field(record, FIELD_UPLOAD_URI)
            .ok_or(TokenSerializationError::MissingUploadUri)?
            .as_str()
            .ok_or_else(|| malformed(FIELD_UPLOAD_URI, "a string"))?;
        let upload_uri = Url::parse(upload_uri)?;

        let selector = match field(record, FIELD_SELECTOR) {
            None => None,
            Some(v) => Some(
                v.as_str()
                    .ok_or_else(|| malformed(FIELD_SELECTOR, "a string"))?
                    .to_string(),
            ),
        };

        let range = match field(record, FIELD_RANGE) {
            None => None,
            Some(v) => Some(
                v.as_str()
                    .ok_or_else(|| malformed(FIELD_RANGE, "a string"))?
                    .parse::<ByteRange>()?,
            ),
        };

        Ok(Self::new(upload_uri, selector, range, None))
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, TokenSerializationError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }
}

/// A present, non-null field.
fn field<'a>(record: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    record.get(name).filter(|v| !v.is_null())
}

fn malformed(name: &str, expected: &str) -> TokenSerializationError {
    TokenSerializationError::Malformed(format!("'{}' must be {}", name, expected))
}

impl Serialize for ResumeToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl TryFrom<&Value> for ResumeToken {
    type Error = TokenSerializationError;

    fn try_from(value: &Value) -> std::result::Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Tokens compare by session, selector and range. The completion signal is
/// not part of a token's identity.
impl PartialEq for ResumeToken {
    fn eq(&self, other: &Self) -> bool {
        self.upload_uri == other.upload_uri
            && self.selector == other.selector
            && self.range == other.range
    }
}

impl Eq for ResumeToken {}

impl fmt::Debug for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeToken")
            .field("upload_uri", &self.upload_uri.as_str())
            .field("selector", &self.selector)
            .field("range", &self.range)
            .field("has_completion", &self.done.is_some())
            .finish()
    }
}
