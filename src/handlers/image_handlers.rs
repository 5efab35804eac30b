//! HTTP handlers for the image API.
//!
//! Thin wrappers: parse the request, call the service, shape the response.
//! All failure-mode and consistency concerns live in `services`.

use crate::{
    errors::AppError,
    models::image::ImageRecord,
    services::gallery_service::{GalleryService, ImageFilter, UploadRequest, parse_tags},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// An image record as the API presents it: the record plus the route
/// where its bytes can be fetched.
#[derive(Serialize)]
pub struct ImageResponse {
    #[serde(flatten)]
    record: ImageRecord,
    url: String,
}

impl From<ImageRecord> for ImageResponse {
    fn from(record: ImageRecord) -> Self {
        let url = format!("/api/images/{}/file", record.id);
        Self { record, url }
    }
}

/// Query params accepted by `GET /api/images`.
#[derive(Debug, Deserialize)]
pub struct ListImagesQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub uploader: Option<String>,
    /// Comma-separated; any-of matching.
    pub tags: Option<String>,
}

/// `GET /api/` — service banner.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Lumina Gallery API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/images/upload` — multipart upload.
///
/// Fields: `file` (required), `uploader` (required), `tags` and
/// `description` (optional).
pub async fn upload_image(
    State(service): State<GalleryService>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, String, Bytes)> = None;
    let mut uploader = String::new();
    let mut tags = String::new();
    let mut description = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, err.to_string()))?
    {
        let bad_field =
            |err: axum::extract::multipart::MultipartError| AppError::new(StatusCode::BAD_REQUEST, err.to_string());
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_field)?;
                file = Some((filename, content_type, bytes));
            }
            Some("uploader") => uploader = field.text().await.map_err(bad_field)?,
            Some("tags") => tags = field.text().await.map_err(bad_field)?,
            Some("description") => description = Some(field.text().await.map_err(bad_field)?),
            _ => {}
        }
    }

    let (filename, file_type, payload) =
        file.ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "no file provided"))?;

    let record = service
        .upload(UploadRequest {
            payload,
            filename,
            file_type,
            uploader,
            tags,
            description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ImageResponse::from(record))))
}

/// `GET /api/images` — filtered, newest-first listing.
pub async fn list_images(
    State(service): State<GalleryService>,
    Query(q): Query<ListImagesQuery>,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    let filter = ImageFilter {
        date_from: q.date_from,
        date_to: q.date_to,
        uploader: q.uploader,
        tags: q.tags.as_deref().map(parse_tags).unwrap_or_default(),
    };
    let records = service.list(&filter).await?;
    Ok(Json(records.into_iter().map(ImageResponse::from).collect()))
}

/// `GET /api/images/{id}` — metadata for one image.
pub async fn get_image(
    State(service): State<GalleryService>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageResponse>, AppError> {
    let record = service.get(id).await?;
    Ok(Json(ImageResponse::from(record)))
}

/// `GET /api/images/{id}/file` — the original bytes.
pub async fn download_image(
    State(service): State<GalleryService>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (record, bytes, content_type) = service.download(id).await?;
    Ok(file_response(
        bytes,
        content_type.unwrap_or_else(|| record.file_type.clone()),
        &record.filename,
    ))
}

/// `GET /api/images/{id}/thumbnail` — the scaled derivative.
/// 404 until post-processing has run.
pub async fn download_thumbnail(
    State(service): State<GalleryService>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (record, bytes, content_type) = service.download_thumbnail(id).await?;
    Ok(file_response(
        bytes,
        content_type.unwrap_or_else(|| record.file_type.clone()),
        &record.filename,
    ))
}

/// `POST /api/images/{id}/process` — synchronous reprocess/backfill.
pub async fn process_image(
    State(service): State<GalleryService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = service.reprocess(id).await?;
    Ok(Json(outcome))
}

/// `DELETE /api/images/{id}` — remove blobs and record.
pub async fn delete_image(
    State(service): State<GalleryService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service.delete(id).await?;
    Ok(Json(json!({
        "message": "Image deleted successfully",
        "id": id,
    })))
}

fn file_response(bytes: Bytes, content_type: String, filename: &str) -> Response {
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    let disposition = format!("inline; filename=\"{}\"", filename.replace('"', ""));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
