//! Store seams for the two durable backends.
//!
//! Blob payloads and metadata records live in independent stores with no
//! cross-store transaction; the coordinators in `services` stitch them
//! together with explicit compensation. Both stores are injected as trait
//! objects so the coordinators can be exercised against in-memory fakes.

use crate::errors::GalleryResult;
use crate::models::image::ImageRecord;
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

pub mod fs_object_store;
#[cfg(test)]
pub mod memory;
pub mod sqlite_metadata_store;

/// Key-addressed binary blob storage.
///
/// Assumed to provide per-key atomicity for individual operations and
/// nothing more.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Durably store `bytes` under `key`, overwriting any previous value.
    async fn put(&self, key: &str, bytes: Bytes, content_type: Option<&str>) -> GalleryResult<()>;

    /// Fetch the blob and, when known, its content type.
    /// Fails with `NotFound` if the key is absent.
    async fn get(&self, key: &str) -> GalleryResult<(Bytes, Option<String>)>;

    /// Remove the blob. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> GalleryResult<()>;

    /// Cheap readiness probe.
    async fn health_check(&self) -> GalleryResult<()>;
}

/// Key-addressed structured-record storage for [`ImageRecord`]s.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist a freshly created record.
    async fn put(&self, record: &ImageRecord) -> GalleryResult<()>;

    /// Fetch one record by id.
    async fn get(&self, id: Uuid) -> GalleryResult<Option<ImageRecord>>;

    /// Fetch every record. No server-side filtering is assumed.
    async fn scan_all(&self) -> GalleryResult<Vec<ImageRecord>>;

    /// Partial update setting the derived fields and flipping `processed`.
    /// Must not touch any field written at upload time.
    async fn mark_processed(
        &self,
        id: Uuid,
        width: i64,
        height: i64,
        thumbnail_key: &str,
    ) -> GalleryResult<()>;

    /// Remove one record. Returns false if no record had that id.
    async fn delete(&self, id: Uuid) -> GalleryResult<bool>;

    /// Cheap readiness probe.
    async fn health_check(&self) -> GalleryResult<()>;
}
