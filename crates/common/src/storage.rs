//! Object storage abstraction for media uploads.

use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::{AppError, AppResult, IdGenerator};

/// Bytes written per chunk by chunked uploads.
pub const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Callback receiving the running byte count of an upload.
pub type ProgressFn = dyn Fn(u64) + Send + Sync;

/// Whether `key` is a relative path of plain segments.
///
/// Rejects empty keys, absolute paths, backslashes, and empty, `.` or `..`
/// segments.
#[must_use]
pub fn is_valid_storage_key(key: &str) -> bool {
    !key.is_empty()
        && !key.contains('\\')
        && !Path::new(key).is_absolute()
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Uploaded file metadata.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Storage key (path within the bucket).
    pub key: String,
    /// Public URL to access the file.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
    /// MD5 hash of the file.
    pub md5: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload a file.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str)
    -> AppResult<UploadedFile>;

    /// Upload a file, calling `progress` with the bytes written so far.
    ///
    /// Backends that cannot stream report once, after the whole file.
    async fn upload_with_progress(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        progress: &ProgressFn,
    ) -> AppResult<UploadedFile> {
        let file = self.upload(key, data, content_type).await?;
        progress(file.size);
        Ok(file)
    }

    /// Delete a file. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public URL for a key.
    fn public_url(&self, key: &str) -> String;

    /// Recover the storage key from a public URL issued by this backend.
    ///
    /// Returns `None` for URLs that point somewhere else or that do not
    /// carry a valid key.
    fn key_from_url(&self, url: &str) -> Option<String>;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Delete every object behind the given public URLs, skipping foreign URLs.
    ///
    /// Returns the number of objects removed.
    async fn remove_urls(&self, urls: &[String]) -> AppResult<usize> {
        let mut removed = 0;
        for url in urls {
            if let Some(key) = self.key_from_url(url) {
                self.delete(&key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    chunk_bytes: usize,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
            chunk_bytes: UPLOAD_CHUNK_BYTES,
        }
    }

    /// Override the write chunk size used by chunked uploads.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    /// Resolve a key to a path that stays under `base_path`.
    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        if !is_valid_storage_key(key) {
            return Err(AppError::BadRequest(format!("Invalid storage key: {key}")));
        }
        let path = self.base_path.join(key);
        if !path.starts_with(&self.base_path) {
            return Err(AppError::BadRequest(format!("Invalid storage key: {key}")));
        }
        Ok(path)
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<UploadedFile> {
        self.upload_with_progress(key, data, content_type, &|_| {})
            .await
    }

    async fn upload_with_progress(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        progress: &ProgressFn,
    ) -> AppResult<UploadedFile> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Upload(format!("Failed to create directory: {e}")))?;
        }

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| AppError::Upload(format!("Failed to create file: {e}")))?;

        let mut written = 0u64;
        for chunk in data.chunks(self.chunk_bytes) {
            file.write_all(chunk)
                .await
                .map_err(|e| AppError::Upload(format!("Failed to write file: {e}")))?;
            written += chunk.len() as u64;
            progress(written);
        }
        file.flush()
            .await
            .map_err(|e| AppError::Upload(format!("Failed to write file: {e}")))?;

        let md5 = format!("{:x}", md5::compute(data));

        Ok(UploadedFile {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5,
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to delete file: {e}")))?;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let prefix = format!("{}/", self.base_url.trim_end_matches('/'));
        url.strip_prefix(&prefix)
            .map(|rest| rest.split(['?', '#']).next().unwrap_or(rest))
            .filter(|key| is_valid_storage_key(key))
            .map(ToString::to_string)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }
}

/// Generate a unique storage key for a file.
#[must_use]
pub fn generate_storage_key(user_id: &str, original_name: &str) -> String {
    use chrono::Utc;

    let now = Utc::now();
    let timestamp = now.timestamp_millis();

    let extension = original_name
        .rfind('.')
        .filter(|&pos| pos > 0 && pos < original_name.len() - 1)
        .map(|pos| &original_name[pos + 1..])
        .filter(|ext| ext.len() <= 10 && !ext.is_empty())
        .unwrap_or("bin")
        .to_lowercase();

    format!(
        "posts/{}/{}_{}.{}",
        user_id,
        timestamp,
        IdGenerator::new().generate_token(),
        extension
    )
}
