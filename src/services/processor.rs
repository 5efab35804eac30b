//! Post-processing worker.
//!
//! Derives intrinsic dimensions and a bounded-size derivative from an
//! uploaded blob, then folds the results back into the metadata record.
//! Runs out-of-band from the upload request: the coordinator spawns it and
//! never awaits the outcome. The whole step is idempotent, so a manual
//! reprocess or a duplicate trigger just recomputes the same values.

use crate::errors::{GalleryError, GalleryResult};
use crate::stores::{MetadataStore, ObjectStore};
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use serde::Serialize;
use std::{io::Cursor, sync::Arc};
use tracing::info;
use uuid::Uuid;

/// Derivatives are bounded to this dimension on both axes, aspect preserved.
const MAX_THUMBNAIL_DIM: u32 = 300;

/// Derivative keys are the original storage key behind a fixed prefix.
pub const THUMBNAIL_PREFIX: &str = "thumbnails/";

/// What a successful processing run computed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessOutcome {
    pub id: Uuid,
    pub width: i64,
    pub height: i64,
    pub thumbnail_key: String,
}

pub struct ImageProcessor {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl ImageProcessor {
    pub fn new(objects: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { objects, metadata }
    }

    /// Fetch, decode, scale and re-encode the blob at `storage_key`, write
    /// the derivative, and update the record identified by `id`.
    ///
    /// No failure here is fatal to the system: an unprocessed record stays
    /// valid and servable, just without derived fields.
    pub async fn process(&self, storage_key: &str, id: Uuid) -> GalleryResult<ProcessOutcome> {
        let (bytes, content_type) = self.objects.get(storage_key).await?;

        let key = storage_key.to_string();
        let (width, height, encoded) =
            tokio::task::spawn_blocking(move || scale_to_thumbnail(&key, &bytes))
                .await
                .map_err(|err| GalleryError::Process {
                    key: storage_key.to_string(),
                    source: image::ImageError::IoError(std::io::Error::other(err)),
                })??;

        let thumbnail_key = format!("{THUMBNAIL_PREFIX}{storage_key}");
        self.objects
            .put(&thumbnail_key, Bytes::from(encoded), content_type.as_deref())
            .await?;

        self.metadata
            .mark_processed(id, width, height, &thumbnail_key)
            .await?;

        info!(%id, width, height, %thumbnail_key, "image processed");
        Ok(ProcessOutcome {
            id,
            width,
            height,
            thumbnail_key,
        })
    }
}

/// Decode `bytes`, read intrinsic dimensions, and produce the re-encoded
/// derivative. Re-encodes in the sniffed source format when the codec is
/// known, JPEG otherwise.
fn scale_to_thumbnail(key: &str, bytes: &[u8]) -> GalleryResult<(i64, i64, Vec<u8>)> {
    let format = image::guess_format(bytes).ok();
    let img = image::load_from_memory(bytes).map_err(|source| GalleryError::Decode {
        key: key.to_string(),
        source,
    })?;
    let (width, height) = (img.width() as i64, img.height() as i64);

    let out_format = format.unwrap_or(ImageFormat::Jpeg);
    let mut thumbnail = img.resize(MAX_THUMBNAIL_DIM, MAX_THUMBNAIL_DIM, FilterType::Lanczos3);
    if out_format == ImageFormat::Jpeg {
        // the jpeg encoder rejects alpha channels
        thumbnail = DynamicImage::ImageRgb8(thumbnail.to_rgb8());
    }

    let mut encoded = Cursor::new(Vec::new());
    thumbnail
        .write_to(&mut encoded, out_format)
        .map_err(|source| GalleryError::Process {
            key: key.to_string(),
            source,
        })?;

    Ok((width, height, encoded.into_inner()))
}
