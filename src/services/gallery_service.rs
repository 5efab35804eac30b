//! Upload, query and deletion coordination across the two stores.
//!
//! The blob store and the metadata store are independent; there is no
//! cross-store transaction. The upload path is an explicit forward
//! sequence with one compensating step: blob write, metadata write, then a
//! best-effort blob delete if the metadata write fails. If the
//! compensation itself fails the orphan blob is logged and left for an
//! external sweep; this service never reconciles it.

use crate::errors::{GalleryError, GalleryResult};
use crate::models::image::ImageRecord;
use crate::services::processor::{ImageProcessor, ProcessOutcome};
use crate::stores::{MetadataStore, ObjectStore};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

/// Extension used when the client filename carries none.
const FALLBACK_EXTENSION: &str = "jpg";

/// A validated-on-entry upload request as the HTTP layer hands it over.
pub struct UploadRequest {
    pub payload: Bytes,
    pub filename: String,
    pub file_type: String,
    pub uploader: String,
    /// Raw comma-separated tag string; normalized here.
    pub tags: String,
    pub description: Option<String>,
}

/// Recognized options for the metadata query engine. All optional,
/// applied in declaration order.
#[derive(Debug, Default, Clone)]
pub struct ImageFilter {
    /// Inclusive lower bound, compared lexicographically against the
    /// ISO-8601 rendering of the upload timestamp.
    pub date_from: Option<String>,
    /// Inclusive upper bound, same comparison.
    pub date_to: Option<String>,
    /// Exact uploader match.
    pub uploader: Option<String>,
    /// Record matches when any of these appears in its tags.
    /// Case-sensitive, exact.
    pub tags: Vec<String>,
}

/// Orchestrates the image lifecycle over injected store clients.
///
/// Holds no mutable state of its own; everything durable lives in the two
/// stores, so concurrent requests need no locking here.
#[derive(Clone)]
pub struct GalleryService {
    pub objects: Arc<dyn ObjectStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub processor: Arc<ImageProcessor>,
}

impl GalleryService {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        processor: Arc<ImageProcessor>,
    ) -> Self {
        Self {
            objects,
            metadata,
            processor,
        }
    }

    /// Store a new image: blob first, then metadata, then the async
    /// processing trigger.
    ///
    /// Validation failures happen before any store is touched. A metadata
    /// write failure triggers a compensating delete of the just-written
    /// blob. The processing trigger is fire-and-forget; the returned
    /// record always has `processed == false`.
    pub async fn upload(&self, req: UploadRequest) -> GalleryResult<ImageRecord> {
        if req.filename.is_empty() {
            return Err(GalleryError::Validation("no file selected".into()));
        }
        if req.payload.is_empty() {
            return Err(GalleryError::Validation("empty file".into()));
        }
        if !req.file_type.starts_with("image/") {
            return Err(GalleryError::Validation(
                "only image files are allowed".into(),
            ));
        }
        if req.uploader.trim().is_empty() {
            return Err(GalleryError::Validation("uploader name is required".into()));
        }

        let id = Uuid::new_v4();
        let storage_key = format!("{id}.{}", extension_of(&req.filename));

        self.objects
            .put(&storage_key, req.payload.clone(), Some(req.file_type.as_str()))
            .await?;

        let record = ImageRecord {
            id,
            filename: req.filename,
            storage_key: storage_key.clone(),
            file_size: req.payload.len() as i64,
            file_type: req.file_type,
            uploader: req.uploader,
            tags: parse_tags(&req.tags),
            description: req.description,
            upload_date: Utc::now(),
            width: None,
            height: None,
            thumbnail_key: None,
            processed: false,
        };

        if let Err(err) = self.metadata.put(&record).await {
            // compensate: the blob is durable but the record is not
            match self.objects.delete(&storage_key).await {
                Ok(_) => warn!(%id, %storage_key, "metadata write failed, blob rolled back"),
                Err(comp_err) => error!(
                    %id, %storage_key, %comp_err,
                    "metadata write failed and compensation failed; orphan blob \
                     left for external sweep"
                ),
            }
            return Err(err);
        }

        let processor = self.processor.clone();
        let trigger_key = storage_key;
        tokio::spawn(async move {
            if let Err(err) = processor.process(&trigger_key, id).await {
                warn!(%id, %err, "post-processing failed (non-critical)");
            }
        });

        Ok(record)
    }

    /// Fetch one record by id.
    pub async fn get(&self, id: Uuid) -> GalleryResult<ImageRecord> {
        self.metadata
            .get(id)
            .await?
            .ok_or_else(|| GalleryError::NotFound(id.to_string()))
    }

    /// Fetch the original payload together with its record.
    pub async fn download(&self, id: Uuid) -> GalleryResult<(ImageRecord, Bytes, Option<String>)> {
        let record = self.get(id).await?;
        let (bytes, content_type) = self.objects.get(&record.storage_key).await?;
        Ok((record, bytes, content_type))
    }

    /// Fetch the scaled derivative. Fails with `NotFound` until
    /// post-processing has produced one.
    pub async fn download_thumbnail(
        &self,
        id: Uuid,
    ) -> GalleryResult<(ImageRecord, Bytes, Option<String>)> {
        let record = self.get(id).await?;
        let key = record
            .thumbnail_key
            .clone()
            .ok_or_else(|| GalleryError::NotFound(format!("thumbnail for {id}")))?;
        let (bytes, content_type) = self.objects.get(&key).await?;
        Ok((record, bytes, content_type))
    }

    /// Synchronously re-run post-processing for one image (backfill path).
    pub async fn reprocess(&self, id: Uuid) -> GalleryResult<ProcessOutcome> {
        let record = self.get(id).await?;
        self.processor.process(&record.storage_key, id).await
    }

    /// Load every record and apply filtering and ordering in process.
    ///
    /// Most recent first; ties broken by id so repeated calls on unchanged
    /// data are stable.
    pub async fn list(&self, filter: &ImageFilter) -> GalleryResult<Vec<ImageRecord>> {
        let mut records = self.metadata.scan_all().await?;

        records.retain(|record| {
            let stamp = record
                .upload_date
                .to_rfc3339_opts(SecondsFormat::Micros, true);
            if let Some(from) = &filter.date_from {
                if stamp.as_str() < from.as_str() {
                    return false;
                }
            }
            if let Some(to) = &filter.date_to {
                if stamp.as_str() > to.as_str() {
                    return false;
                }
            }
            if let Some(uploader) = &filter.uploader {
                if &record.uploader != uploader {
                    return false;
                }
            }
            if !filter.tags.is_empty() && !filter.tags.iter().any(|t| record.tags.contains(t)) {
                return false;
            }
            true
        });

        records.sort_by(|a, b| {
            b.upload_date
                .cmp(&a.upload_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    /// Remove an image: blobs best-effort, then the record.
    ///
    /// The metadata delete is the one fatal failure here; a dangling
    /// record pointing at a missing blob is the worse inconsistency, so
    /// blob delete failures are only logged.
    pub async fn delete(&self, id: Uuid) -> GalleryResult<()> {
        let record = self.get(id).await?;

        if let Err(err) = self.objects.delete(&record.storage_key).await {
            warn!(%id, key = %record.storage_key, %err, "blob delete failed, continuing");
        }
        if let Some(thumbnail_key) = &record.thumbnail_key {
            if let Err(err) = self.objects.delete(thumbnail_key).await {
                warn!(%id, key = %thumbnail_key, %err, "thumbnail delete failed, continuing");
            }
        }

        if !self.metadata.delete(id).await? {
            // lost a race with another delete; nothing else was removed twice
            return Err(GalleryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Split a raw comma-separated tag string: trim whitespace, drop empties,
/// keep order, keep duplicates.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lowercased suffix after the last dot of `filename`, or the fallback.
fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => FALLBACK_EXTENSION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::{MemoryMetadataStore, MemoryObjectStore};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let img = RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        Bytes::from(buf.into_inner())
    }

    fn setup() -> (Arc<MemoryObjectStore>, Arc<MemoryMetadataStore>, GalleryService) {
        let objects = Arc::new(MemoryObjectStore::default());
        let metadata = Arc::new(MemoryMetadataStore::default());
        let processor = Arc::new(ImageProcessor::new(objects.clone(), metadata.clone()));
        let service = GalleryService::new(objects.clone(), metadata.clone(), processor);
        (objects, metadata, service)
    }

    fn request(payload: Bytes) -> UploadRequest {
        UploadRequest {
            payload,
            filename: "a.png".into(),
            file_type: "image/png".into(),
            uploader: "alice".into(),
            tags: "x, y".into(),
            description: Some("red square".into()),
        }
    }

    #[tokio::test]
    async fn upload_builds_the_record_and_stores_the_blob() {
        let (objects, metadata, service) = setup();
        let payload = Bytes::from(vec![7u8; 12345]);

        let record = service.upload(request(payload)).await.unwrap();
        assert_eq!(record.filename, "a.png");
        assert_eq!(record.storage_key, format!("{}.png", record.id));
        assert_eq!(record.file_size, 12345);
        assert_eq!(record.tags, vec!["x".to_string(), "y".to_string()]);
        assert!(!record.processed);
        assert!(record.width.is_none() && record.height.is_none());
        assert!(objects.contains(&record.storage_key));

        // round-trip: the stored record equals the returned one
        let fetched = service.get(record.id).await.unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn uploads_get_distinct_ids() {
        let (_objects, _metadata, service) = setup();
        let a = service.upload(request(png_bytes(2, 2))).await.unwrap();
        let b = service.upload(request(png_bytes(2, 2))).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.storage_key, b.storage_key);
    }

    #[tokio::test]
    async fn validation_failures_touch_no_store() {
        let (objects, metadata, service) = setup();

        let cases = [
            UploadRequest {
                payload: Bytes::new(),
                ..request(Bytes::new())
            },
            UploadRequest {
                file_type: "text/plain".into(),
                ..request(Bytes::from_static(b"x"))
            },
            UploadRequest {
                uploader: "  ".into(),
                ..request(Bytes::from_static(b"x"))
            },
            UploadRequest {
                filename: String::new(),
                ..request(Bytes::from_static(b"x"))
            },
        ];
        for case in cases {
            let err = service.upload(case).await.unwrap_err();
            assert!(matches!(err, GalleryError::Validation(_)));
        }
        assert_eq!(objects.len(), 0);
        assert!(metadata.scan_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn metadata_write_failure_rolls_the_blob_back() {
        let (objects, metadata, service) = setup();
        metadata.fail_puts.store(true, Ordering::SeqCst);

        let err = service.upload(request(png_bytes(2, 2))).await.unwrap_err();
        assert!(matches!(err, GalleryError::MetadataWrite(_)));
        assert_eq!(objects.len(), 0, "compensating delete must remove the blob");
    }

    #[tokio::test]
    async fn metadata_failure_with_failed_compensation_surfaces_the_primary_error() {
        let (objects, metadata, service) = setup();
        metadata.fail_puts.store(true, Ordering::SeqCst);
        objects.fail_deletes.store(true, Ordering::SeqCst);

        let err = service.upload(request(png_bytes(2, 2))).await.unwrap_err();
        // the metadata error wins; the orphan blob is only logged
        assert!(matches!(err, GalleryError::MetadataWrite(_)));
        assert_eq!(objects.len(), 1);
    }

    #[tokio::test]
    async fn storage_write_failure_attempts_no_metadata_write() {
        let (objects, metadata, service) = setup();
        objects.fail_puts.store(true, Ordering::SeqCst);

        let err = service.upload(request(png_bytes(2, 2))).await.unwrap_err();
        assert!(matches!(err, GalleryError::StorageWrite { .. }));
        assert!(metadata.scan_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_triggers_processing_out_of_band() {
        let (_objects, metadata, service) = setup();
        let record = service.upload(request(png_bytes(80, 40))).await.unwrap();
        assert!(!record.processed);

        // the trigger is fire-and-forget; poll until the worker lands
        for _ in 0..100 {
            if metadata.get(record.id).await.unwrap().unwrap().processed {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let updated = metadata.get(record.id).await.unwrap().unwrap();
        assert!(updated.processed);
        assert_eq!(updated.width, Some(80));
        assert_eq!(updated.height, Some(40));
        assert_eq!(
            updated.thumbnail_key.as_deref(),
            Some(format!("thumbnails/{}", record.storage_key).as_str())
        );
    }

    #[tokio::test]
    async fn reprocess_is_idempotent() {
        let (_objects, _metadata, service) = setup();
        let record = service.upload(request(png_bytes(30, 20))).await.unwrap();

        let first = service.reprocess(record.id).await.unwrap();
        let second = service.reprocess(record.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.width, 30);
        assert_eq!(first.height, 20);
    }

    #[tokio::test]
    async fn delete_removes_blobs_and_record() {
        // seed the stores directly so no background trigger is in flight
        let (objects, metadata, service) = setup();
        let id = Uuid::new_v4();
        let storage_key = format!("{id}.png");
        objects
            .put(&storage_key, png_bytes(8, 8), Some("image/png"))
            .await
            .unwrap();
        let record = ImageRecord {
            id,
            filename: "a.png".into(),
            storage_key: storage_key.clone(),
            file_size: 8,
            file_type: "image/png".into(),
            uploader: "alice".into(),
            tags: vec![],
            description: None,
            upload_date: Utc::now(),
            width: None,
            height: None,
            thumbnail_key: None,
            processed: false,
        };
        metadata.put(&record).await.unwrap();
        service.reprocess(id).await.unwrap();
        assert!(objects.contains(&storage_key));

        service.delete(id).await.unwrap();
        assert!(!objects.contains(&storage_key));
        assert_eq!(objects.len(), 0, "thumbnail removed too");
        assert!(metadata.get(id).await.unwrap().is_none());

        let err = service.get(id).await.unwrap_err();
        assert!(matches!(err, GalleryError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_missing_id_is_not_found_and_mutates_nothing() {
        let (objects, metadata, service) = setup();
        let record = service.upload(request(png_bytes(8, 8))).await.unwrap();

        let err = service.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GalleryError::NotFound(_)));
        assert!(objects.contains(&record.storage_key));
        assert!(metadata.get(record.id).await.unwrap().is_some());
    }

    async fn seed(service: &GalleryService, uploader: &str, tags: &str) -> ImageRecord {
        let record = service
            .upload(UploadRequest {
                payload: png_bytes(4, 4),
                filename: "seed.png".into(),
                file_type: "image/png".into(),
                uploader: uploader.into(),
                tags: tags.into(),
                description: None,
            })
            .await
            .unwrap();
        // distinct timestamps keep the ordering assertions meaningful
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        record
    }

    #[tokio::test]
    async fn list_filters_by_any_of_the_requested_tags() {
        let (_objects, _metadata, service) = setup();
        let first = seed(&service, "alice", "a, b").await;
        let second = seed(&service, "alice", "b, c").await;
        let _third = seed(&service, "alice", "d").await;

        let result = service
            .list(&ImageFilter {
                tags: vec!["b".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        // newest first
        let ids: Vec<Uuid> = result.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn list_filters_by_uploader_and_date_bounds() {
        let (_objects, _metadata, service) = setup();
        let a = seed(&service, "alice", "").await;
        let b = seed(&service, "bob", "").await;
        let c = seed(&service, "alice", "").await;

        let by_uploader = service
            .list(&ImageFilter {
                uploader: Some("alice".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<Uuid> = by_uploader.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c.id, a.id]);

        // inclusive lower bound at b's timestamp excludes a
        let bound = b.upload_date.to_rfc3339_opts(SecondsFormat::Micros, true);
        let from_b = service
            .list(&ImageFilter {
                date_from: Some(bound),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<Uuid> = from_b.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c.id, b.id]);
    }

    #[tokio::test]
    async fn list_uses_prefix_friendly_lexicographic_date_comparison() {
        let (_objects, _metadata, service) = setup();
        let record = seed(&service, "alice", "").await;

        let year_prefix = record.upload_date.format("%Y").to_string();
        let hits = service
            .list(&ImageFilter {
                date_from: Some(year_prefix),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let none = service
            .list(&ImageFilter {
                date_to: Some("1999".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn tag_parsing_trims_drops_empties_and_keeps_order() {
        assert_eq!(parse_tags("x, y"), vec!["x", "y"]);
        assert_eq!(parse_tags(" a ,, b , a "), vec!["a", "b", "a"]);
        assert_eq!(parse_tags(""), Vec::<String>::new());
        assert_eq!(parse_tags(" , ,"), Vec::<String>::new());
    }

    #[test]
    fn storage_extension_comes_from_the_filename() {
        assert_eq!(extension_of("photo.PNG"), "png");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("noext"), "jpg");
    }
}
