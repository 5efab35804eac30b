//! Health & readiness handlers.
//!
//! - GET /api/health -> simple liveness (status + timestamp)
//! - GET /readyz     -> readiness that probes both backing stores

use crate::services::gallery_service::GalleryService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;

/// `GET /api/health`
///
/// Very small liveness probe. Always 200, never performs I/O.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".into(),
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
}

/// `GET /readyz`
///
/// Runs each store's health check (a `SELECT 1` for the metadata store, a
/// write/read/delete round trip for the object store). 200 when both pass,
/// 503 otherwise.
pub async fn readyz(State(service): State<GalleryService>) -> impl IntoResponse {
    let metadata_check = match service.metadata.health_check().await {
        Ok(_) => (true, None::<String>),
        Err(err) => (false, Some(err.to_string())),
    };
    let objects_check = match service.objects.health_check().await {
        Ok(_) => (true, None::<String>),
        Err(err) => (false, Some(err.to_string())),
    };

    let overall_ok = metadata_check.0 && objects_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "metadata",
        CheckStatus {
            ok: metadata_check.0,
            error: metadata_check.1,
        },
    );
    checks.insert(
        "objects",
        CheckStatus {
            ok: objects_check.0,
            error: objects_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
