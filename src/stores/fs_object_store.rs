//! Filesystem-backed object store.
//!
//! Payloads live under `base_path/{key}`; keys may contain `/` separators
//! (the derivative prefix relies on this). Writes go through a temporary
//! file, are fsynced, and renamed into place so a crashed upload never
//! leaves a half-written blob at the final key. The content type is kept
//! in a `.mime` sidecar next to the payload.

use crate::errors::{GalleryError, GalleryResult};
use crate::stores::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_KEY_LEN: usize = 1024;

#[derive(Clone)]
pub struct FsObjectStore {
    base_path: PathBuf,
}

impl FsObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Keys are generated internally from uuids and a fixed prefix, so a
    /// rejection here indicates a caller bug rather than bad user input.
    fn ensure_key_safe(key: &str) -> io::Result<()> {
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(io::Error::new(ErrorKind::InvalidInput, "invalid object key"));
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(io::Error::new(ErrorKind::InvalidInput, "invalid object key"));
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(io::Error::new(ErrorKind::InvalidInput, "invalid object key"));
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    fn mime_path(path: &Path) -> PathBuf {
        let mut os = path.as_os_str().to_owned();
        os.push(".mime");
        PathBuf::from(os)
    }

    async fn write_atomic(&self, key: &str, bytes: &Bytes) -> io::Result<PathBuf> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        let steps = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await
        };
        if let Err(err) = steps.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        }
        Ok(file_path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: Option<&str>) -> GalleryResult<()> {
        let wrap = |source: io::Error| GalleryError::StorageWrite {
            key: key.to_string(),
            source,
        };
        let file_path = self.write_atomic(key, &bytes).await.map_err(wrap)?;
        if let Some(ct) = content_type {
            fs::write(Self::mime_path(&file_path), ct).await.map_err(wrap)?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> GalleryResult<(Bytes, Option<String>)> {
        let wrap = |source: io::Error| GalleryError::StorageRead {
            key: key.to_string(),
            source,
        };
        Self::ensure_key_safe(key).map_err(wrap)?;
        let file_path = self.object_path(key);
        let bytes = match fs::read(&file_path).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(GalleryError::NotFound(key.to_string()));
            }
            Err(err) => return Err(wrap(err)),
        };
        let content_type = fs::read_to_string(Self::mime_path(&file_path)).await.ok();
        Ok((bytes, content_type))
    }

    async fn delete(&self, key: &str) -> GalleryResult<()> {
        let wrap = |source: io::Error| GalleryError::StorageDelete {
            key: key.to_string(),
            source,
        };
        Self::ensure_key_safe(key).map_err(wrap)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed blob {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("blob {} already missing", file_path.display());
            }
            Err(err) => return Err(wrap(err)),
        }
        let _ = fs::remove_file(Self::mime_path(&file_path)).await;
        Ok(())
    }

    /// Best-effort write/read/delete of a temp file under the base path.
    async fn health_check(&self) -> GalleryResult<()> {
        let wrap = |source: io::Error| GalleryError::StorageWrite {
            key: "<health-check>".to_string(),
            source,
        };
        fs::create_dir_all(&self.base_path).await.map_err(wrap)?;
        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await.map_err(wrap)?;
        let read_back = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        let bytes = read_back.map_err(wrap)?;
        if bytes != b"readyz" {
            return Err(wrap(io::Error::other("health-check content mismatch")));
        }
        Ok(())
    }
}
