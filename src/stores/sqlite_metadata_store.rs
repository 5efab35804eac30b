//! SQLite-backed metadata store.
//!
//! One row per image in the `images` table. Tags are kept as a JSON text
//! column; the row is converted to the domain [`ImageRecord`] at the edge
//! so nothing above this module sees sqlite types.

use crate::errors::{GalleryError, GalleryResult};
use crate::models::image::ImageRecord;
use crate::stores::MetadataStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: Arc<SqlitePool>,
}

/// Raw row shape; `id` and `tags` need decoding into domain types.
#[derive(FromRow)]
struct ImageRow {
    id: String,
    filename: String,
    storage_key: String,
    file_size: i64,
    file_type: String,
    uploader: String,
    tags: String,
    description: Option<String>,
    upload_date: DateTime<Utc>,
    width: Option<i64>,
    height: Option<i64>,
    thumbnail_key: Option<String>,
    processed: bool,
}

impl TryFrom<ImageRow> for ImageRecord {
    type Error = sqlx::Error;

    fn try_from(row: ImageRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let tags: Vec<String> = serde_json::from_str(&row.tags)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        Ok(ImageRecord {
            id,
            filename: row.filename,
            storage_key: row.storage_key,
            file_size: row.file_size,
            file_type: row.file_type,
            uploader: row.uploader,
            tags,
            description: row.description,
            upload_date: row.upload_date,
            width: row.width,
            height: row.height,
            thumbnail_key: row.thumbnail_key,
            processed: row.processed,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, filename, storage_key, file_size, file_type, uploader, \
     tags, description, upload_date, width, height, thumbnail_key, processed FROM images";

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn put(&self, record: &ImageRecord) -> GalleryResult<()> {
        let tags = serde_json::to_string(&record.tags)
            .map_err(|err| GalleryError::MetadataWrite(sqlx::Error::Encode(Box::new(err))))?;
        sqlx::query(
            "INSERT INTO images (
                id, filename, storage_key, file_size, file_type, uploader,
                tags, description, upload_date, width, height, thumbnail_key, processed
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.filename)
        .bind(&record.storage_key)
        .bind(record.file_size)
        .bind(&record.file_type)
        .bind(&record.uploader)
        .bind(tags)
        .bind(&record.description)
        .bind(record.upload_date)
        .bind(record.width)
        .bind(record.height)
        .bind(&record.thumbnail_key)
        .bind(record.processed)
        .execute(&*self.db)
        .await
        .map_err(GalleryError::MetadataWrite)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> GalleryResult<Option<ImageRecord>> {
        let row = sqlx::query_as::<_, ImageRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&*self.db)
            .await
            .map_err(GalleryError::MetadataRead)?;
        row.map(ImageRecord::try_from)
            .transpose()
            .map_err(GalleryError::MetadataRead)
    }

    async fn scan_all(&self) -> GalleryResult<Vec<ImageRecord>> {
        let rows = sqlx::query_as::<_, ImageRow>(SELECT_COLUMNS)
            .fetch_all(&*self.db)
            .await
            .map_err(GalleryError::MetadataRead)?;
        rows.into_iter()
            .map(|row| ImageRecord::try_from(row).map_err(GalleryError::MetadataRead))
            .collect()
    }

    async fn mark_processed(
        &self,
        id: Uuid,
        width: i64,
        height: i64,
        thumbnail_key: &str,
    ) -> GalleryResult<()> {
        let result = sqlx::query(
            "UPDATE images SET width = ?, height = ?, thumbnail_key = ?, processed = 1
             WHERE id = ?",
        )
        .bind(width)
        .bind(height)
        .bind(thumbnail_key)
        .bind(id.to_string())
        .execute(&*self.db)
        .await
        .map_err(GalleryError::MetadataWrite)?;

        if result.rows_affected() == 0 {
            return Err(GalleryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> GalleryResult<bool> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id.to_string())
            .execute(&*self.db)
            .await
            .map_err(GalleryError::MetadataDelete)?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> GalleryResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await
            .map_err(GalleryError::MetadataRead)?;
        Ok(())
    }
}
