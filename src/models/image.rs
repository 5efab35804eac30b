//! Represents an uploaded image and its descriptive metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata record for a single uploaded image.
///
/// The record stores everything about an image except its bytes. The payload
/// itself lives in the object store under `storage_key`; the scaled
/// derivative, once produced, lives under `thumbnail_key`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageRecord {
    /// Unique identifier, assigned at upload before any store write.
    pub id: Uuid,

    /// Original filename as supplied by the client. Never used for
    /// storage addressing.
    pub filename: String,

    /// Object-store key of the original payload, derived from the id and
    /// the filename extension.
    pub storage_key: String,

    /// Payload size in bytes, measured at upload time.
    pub file_size: i64,

    /// MIME type; always starts with `image/`.
    pub file_type: String,

    /// Who uploaded the image. Required, non-empty.
    pub uploader: String,

    /// Ordered tags. Duplicates are allowed; matching is case-sensitive.
    pub tags: Vec<String>,

    /// Optional free-form description.
    pub description: Option<String>,

    /// When the upload coordinator wrote the record (UTC).
    pub upload_date: DateTime<Utc>,

    /// Intrinsic pixel width, set by post-processing.
    pub width: Option<i64>,

    /// Intrinsic pixel height, set by post-processing.
    pub height: Option<i64>,

    /// Object-store key of the scaled derivative, set by post-processing.
    pub thumbnail_key: Option<String>,

    /// True once post-processing has succeeded. When true, `width`,
    /// `height` and `thumbnail_key` are all present.
    pub processed: bool,
}
