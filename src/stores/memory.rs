//! In-memory fakes for coordinator tests, with fault-injection switches.

use crate::errors::{GalleryError, GalleryResult};
use crate::models::image::ImageRecord;
use crate::stores::{MetadataStore, ObjectStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::HashMap,
    io,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: Mutex<HashMap<String, (Bytes, Option<String>)>>,
    pub fail_puts: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn contains(&self, key: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: Option<&str>) -> GalleryResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(GalleryError::StorageWrite {
                key: key.to_string(),
                source: io::Error::other("injected put failure"),
            });
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.map(str::to_string)));
        Ok(())
    }

    async fn get(&self, key: &str) -> GalleryResult<(Bytes, Option<String>)> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| GalleryError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> GalleryResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(GalleryError::StorageDelete {
                key: key.to_string(),
                source: io::Error::other("injected delete failure"),
            });
        }
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }

    async fn health_check(&self) -> GalleryResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Mutex<HashMap<Uuid, ImageRecord>>,
    pub fail_puts: AtomicBool,
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn put(&self, record: &ImageRecord) -> GalleryResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(GalleryError::MetadataWrite(sqlx::Error::PoolClosed));
        }
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> GalleryResult<Option<ImageRecord>> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn scan_all(&self) -> GalleryResult<Vec<ImageRecord>> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn mark_processed(
        &self,
        id: Uuid,
        width: i64,
        height: i64,
        thumbnail_key: &str,
    ) -> GalleryResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| GalleryError::NotFound(id.to_string()))?;
        record.width = Some(width);
        record.height = Some(height);
        record.thumbnail_key = Some(thumbnail_key.to_string());
        record.processed = true;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> GalleryResult<bool> {
        Ok(self.records.lock().unwrap().remove(&id).is_some())
    }

    async fn health_check(&self) -> GalleryResult<()> {
        Ok(())
    }
}
