//! Media uploads with progress and cancellation.

use std::sync::Arc;

use bytes::Bytes;
use fun_common::{AppError, AppResult, StorageBackend, generate_storage_key};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::media::{MediaKind, MediaReference};

/// Largest accepted file, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Upload progress as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadProgress {
    Queued,
    Uploading { bytes_sent: u64, total_bytes: u64 },
    Completed { url: String },
    Failed { message: String },
    Cancelled,
}

impl UploadProgress {
    /// Whether the upload has finished one way or another.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }
}

/// A file to upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// A running upload.
pub struct UploadTask {
    key: String,
    kind: MediaKind,
    progress: watch::Receiver<UploadProgress>,
    progress_tx: watch::Sender<UploadProgress>,
    handle: JoinHandle<AppResult<String>>,
    storage: Arc<dyn StorageBackend>,
}

impl UploadTask {
    /// Storage key the file is written to.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current progress.
    #[must_use]
    pub fn progress(&self) -> UploadProgress {
        self.progress.borrow().clone()
    }

    /// Receiver that sees every progress change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<UploadProgress> {
        self.progress.clone()
    }

    /// Stop the upload and remove anything already written.
    pub async fn cancel(self) -> AppResult<()> {
        self.handle.abort();
        // The write may have finished before the abort landed.
        self.storage.delete(&self.key).await?;
        self.progress_tx.send_replace(UploadProgress::Cancelled);
        info!(key = %self.key, "Upload cancelled");
        Ok(())
    }

    /// Wait for the upload to finish.
    pub async fn wait(self) -> AppResult<MediaReference> {
        match self.handle.await {
            Ok(Ok(url)) => Ok(MediaReference {
                url,
                kind: self.kind,
            }),
            Ok(Err(e)) => Err(e),
            Err(e) if e.is_cancelled() => Err(AppError::UploadCancelled),
            Err(e) => Err(AppError::Internal(format!("Upload task failed: {e}"))),
        }
    }
}

/// Uploads post and comment media to the storage backend.
#[derive(Clone)]
pub struct MediaUploader {
    storage: Arc<dyn StorageBackend>,
}

impl MediaUploader {
    /// Create an uploader over a storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Start uploading one file for `user_id`.
    ///
    /// Only images and videos are accepted. Must be called from within a
    /// tokio runtime.
    pub fn start(&self, user_id: &str, request: UploadRequest) -> AppResult<UploadTask> {
        let content_type = request.content_type.to_lowercase();
        if !content_type.starts_with("image/") && !content_type.starts_with("video/") {
            return Err(AppError::BadRequest(format!(
                "Unsupported media type: {content_type}"
            )));
        }
        if request.data.is_empty() {
            return Err(AppError::BadRequest("Empty file".to_string()));
        }
        if request.data.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::BadRequest(format!(
                "File too large: {} bytes",
                request.data.len()
            )));
        }

        let key = generate_storage_key(user_id, &request.file_name);
        let kind = MediaKind::from_content_type(&content_type);
        let (progress_tx, progress) = watch::channel(UploadProgress::Queued);

        let handle = {
            let storage = Arc::clone(&self.storage);
            let key = key.clone();
            let tx = progress_tx.clone();
            tokio::spawn(async move {
                let total_bytes = request.data.len() as u64;
                tx.send_replace(UploadProgress::Uploading {
                    bytes_sent: 0,
                    total_bytes,
                });
                debug!(key = %key, bytes = total_bytes, "Uploading media");

                let report = {
                    let tx = tx.clone();
                    move |bytes_sent: u64| {
                        tx.send_replace(UploadProgress::Uploading {
                            bytes_sent,
                            total_bytes,
                        });
                    }
                };
                let uploaded = storage
                    .upload_with_progress(&key, &request.data, &content_type, &report)
                    .await;

                match uploaded {
                    Ok(file) => {
                        tx.send_replace(UploadProgress::Completed {
                            url: file.url.clone(),
                        });
                        Ok(file.url)
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Media upload failed");
                        tx.send_replace(UploadProgress::Failed {
                            message: e.to_string(),
                        });
                        Err(e)
                    }
                }
            })
        };

        Ok(UploadTask {
            key,
            kind,
            progress,
            progress_tx,
            handle,
            storage: Arc::clone(&self.storage),
        })
    }

    /// Upload several files concurrently.
    ///
    /// Each file succeeds or fails on its own; results are in input order.
    pub async fn upload_all(
        &self,
        user_id: &str,
        requests: Vec<UploadRequest>,
    ) -> Vec<AppResult<MediaReference>> {
        let tasks: Vec<AppResult<UploadTask>> = requests
            .into_iter()
            .map(|request| self.start(user_id, request))
            .collect();

        futures::future::join_all(tasks.into_iter().map(|task| async move {
            match task {
                Ok(task) => task.wait().await,
                Err(e) => Err(e),
            }
        }))
        .await
    }
}
