//! Defines routes for the gallery API.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET  /api/`        — banner
//!   - `GET  /api/health`  — liveness
//!   - `GET  /readyz`      — readiness (probes both stores)
//!
//! - **Image endpoints**
//!   - `POST   /api/images/upload`         — multipart upload
//!   - `GET    /api/images`                — filtered listing
//!   - `GET    /api/images/{id}`           — metadata
//!   - `DELETE /api/images/{id}`           — delete blobs + record
//!   - `GET    /api/images/{id}/file`      — original bytes
//!   - `GET    /api/images/{id}/thumbnail` — scaled derivative
//!   - `POST   /api/images/{id}/process`   — reprocess/backfill

use crate::{
    handlers::{
        health_handlers::{health, readyz},
        image_handlers::{
            delete_image, download_image, download_thumbnail, get_image, list_images,
            process_image, root, upload_image,
        },
    },
    services::gallery_service::GalleryService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Payload ceiling for multipart uploads.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build and return the router for the whole API surface.
///
/// The router carries shared state (`GalleryService`) to all handlers.
pub fn routes() -> Router<GalleryService> {
    Router::new()
        .route("/api/", get(root))
        .route("/api/health", get(health))
        .route("/readyz", get(readyz))
        .route(
            "/api/images/upload",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/images", get(list_images))
        .route("/api/images/{id}", get(get_image).delete(delete_image))
        .route("/api/images/{id}/file", get(download_image))
        .route("/api/images/{id}/thumbnail", get(download_thumbnail))
        .route("/api/images/{id}/process", post(process_image))
}
