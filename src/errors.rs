use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Domain error taxonomy for the gallery core.
///
/// Every operation returns either its result or exactly one of these.
/// Storage variants wrap object-store failures, metadata variants wrap
/// sqlite failures, and the processing variants cover the worker path.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("invalid upload: {0}")]
    Validation(String),

    #[error("`{0}` not found")]
    NotFound(String),

    #[error("object store write failed for `{key}`: {source}")]
    StorageWrite {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("object store read failed for `{key}`: {source}")]
    StorageRead {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("object store delete failed for `{key}`: {source}")]
    StorageDelete {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("metadata write failed: {0}")]
    MetadataWrite(#[source] sqlx::Error),

    #[error("metadata read failed: {0}")]
    MetadataRead(#[source] sqlx::Error),

    #[error("metadata delete failed: {0}")]
    MetadataDelete(#[source] sqlx::Error),

    #[error("could not decode `{key}` as an image: {source}")]
    Decode {
        key: String,
        #[source]
        source: image::ImageError,
    },

    #[error("post-processing failed for `{key}`: {source}")]
    Process {
        key: String,
        #[source]
        source: image::ImageError,
    },
}

pub type GalleryResult<T> = Result<T, GalleryError>;

/// A lightweight wrapper for handler errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<GalleryError> for AppError {
    fn from(err: GalleryError) -> Self {
        let status = match &err {
            GalleryError::Validation(_) => StatusCode::BAD_REQUEST,
            GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
            GalleryError::Decode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}
