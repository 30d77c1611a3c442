//! Chunked upload driver built on resumable upload sessions
//!
//! Each acknowledged chunk yields a new [`ResumeToken`]. Callers that persist
//! those checkpoints can pick the transfer up again with
//! [`ResumableUpload::resume`] after the process dies.

use crate::config::UploadConfig;
use crate::connection::UploadStatus;
use crate::entry::RemoteFile;
use crate::error::{Error, RangeError, Result};
use crate::filesystem::RemoteFilesystem;
use crate::path;
use crate::token::ResumeToken;
use bytes::Bytes;
use log::{debug, info, warn};
use mime::Mime;
use tokio::sync::oneshot;

/// Outcome of sending one chunk.
#[derive(Debug)]
pub enum UploadStep {
    Progress(ResumeToken),
    Complete(RemoteFile),
}

#[derive(Debug, Clone)]
pub struct ResumableUpload {
    fs: RemoteFilesystem,
    chunk_size: u64,
}

impl ResumableUpload {
    pub fn new(fs: &RemoteFilesystem) -> Self {
        Self {
            fs: fs.clone(),
            chunk_size: fs.settings().upload.effective_chunk_size(),
        }
    }

    /// Override the configured chunk size. The same rounding applies.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = UploadConfig { chunk_size }.effective_chunk_size();
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Open an upload session for `file` and return its first checkpoint.
    pub async fn begin(&self, file: &RemoteFile, content_type: &Mime) -> Result<ResumeToken> {
        let selector = self.fs.settings().selectors.default.clone();
        let upload_uri = self
            .fs
            .connection()
            .create_resumable_upload(self.fs.bucket(), file.key(), content_type, Some(selector.as_str()))
            .await?;
        info!("Started resumable upload of {} at {}", file.path(), upload_uri);
        Ok(ResumeToken::new(upload_uri, Some(selector), None, None))
    }

    /// Send the chunk following the token's acknowledged range.
    pub async fn send_chunk(&self, token: &ResumeToken, content: &Bytes) -> Result<UploadStep> {
        let total = content.len() as u64;
        let offset = token.next_offset();
        if offset > total {
            return Err(RangeError::BeyondContent { offset, len: total }.into());
        }

        let end = offset.saturating_add(self.chunk_size).min(total);
        let chunk = content.slice(offset as usize..end as usize);
        let status = self
            .fs
            .connection()
            .upload_chunk(token.upload_uri(), offset, chunk, total)
            .await?;
        self.step(token, status)
    }

    /// Send chunks until the server reports the object complete, handing
    /// every new checkpoint to `on_checkpoint`.
    pub async fn run<F>(&self, token: ResumeToken, content: &Bytes, mut on_checkpoint: F) -> Result<RemoteFile>
    where
        F: FnMut(&ResumeToken) + Send,
    {
        let mut token = token;
        loop {
            let offset = token.next_offset();
            match self.send_chunk(&token, content).await? {
                UploadStep::Complete(file) => return Ok(file),
                UploadStep::Progress(next) => {
                    if next.next_offset() <= offset {
                        warn!("Upload at {} stalled at byte {}", token.upload_uri(), offset);
                        return Err(Error::UploadStalled { offset });
                    }
                    on_checkpoint(&next);
                    token = next;
                }
            }
        }
    }

    /// Continue an upload from a saved checkpoint.
    ///
    /// The server's persisted range wins over the token's, since the token
    /// may predate the last acknowledged chunk.
    pub async fn resume<F>(&self, token: &ResumeToken, content: &Bytes, mut on_checkpoint: F) -> Result<RemoteFile>
    where
        F: FnMut(&ResumeToken) + Send,
    {
        let status = self.fs.connection().query_upload(token.upload_uri()).await?;
        match self.step(token, status)? {
            UploadStep::Complete(file) => Ok(file),
            UploadStep::Progress(current) => {
                info!(
                    "Resuming upload at {} from byte {}",
                    current.upload_uri(),
                    current.next_offset()
                );
                on_checkpoint(&current);
                self.run(current, content, on_checkpoint).await
            }
        }
    }

    /// Run the whole upload on a background task.
    ///
    /// The returned token carries the completion signal; checkpoints reach
    /// `on_checkpoint` from the task as chunks are acknowledged.
    pub async fn spawn<F>(
        self,
        file: &RemoteFile,
        content: Bytes,
        content_type: &Mime,
        on_checkpoint: F,
    ) -> Result<ResumeToken>
    where
        F: FnMut(&ResumeToken) + Send + 'static,
    {
        let token = self.begin(file, content_type).await?;
        let start = token.derive_with_progress(None, None);
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = self.run(start, &content, on_checkpoint).await;
            if let Err(e) = &result {
                warn!("Background upload failed: {}", e);
            }
            if done_tx.send(result).is_err() {
                debug!("Upload finished with nobody waiting for it");
            }
        });

        Ok(token.derive_with_progress(None, Some(done_rx)))
    }

    fn step(&self, token: &ResumeToken, status: UploadStatus) -> Result<UploadStep> {
        match status {
            UploadStatus::InProgress { persisted } => {
                debug!(
                    "Upload at {} acknowledged {:?}",
                    token.upload_uri(),
                    persisted.map(|r| r.to_string())
                );
                Ok(UploadStep::Progress(token.derive_with_progress(persisted, None)))
            }
            UploadStatus::Complete(metadata) => {
                info!("Completed upload of {} in {}", metadata.name, self.fs.bucket());
                Ok(UploadStep::Complete(RemoteFile::new(
                    &self.fs,
                    &path::path_from_key(&metadata.name),
                )?))
            }
        }
    }
}
