//! Stored file route: streams a locally stored file by its storage key.
//!
//! The key arrives in the `path` query parameter. It is confined to the
//! storage root by `LocalStorage`; keys that escape it are rejected with 400.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use stowage_core::AppError;
use stowage_storage::Storage;

#[derive(Debug, Deserialize)]
pub struct StoredFileQuery {
    pub path: Option<String>,
}

/// Serve a stored file. A missing or empty `path` is a 404.
#[tracing::instrument(skip(state, query), fields(operation = "get_stored_file"))]
pub async fn get_stored_file(
    Query(query): Query<StoredFileQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, HttpAppError> {
    let key = match query.path.as_deref() {
        Some(path) if !path.is_empty() => path,
        _ => {
            return Err(HttpAppError::from(AppError::NotFound(
                "Missing path parameter".to_string(),
            )))
        }
    };

    let stream = state.storage.download_stream(key).await?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let content_type = mime_guess::from_path(key).first_or_octet_stream();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    Ok(response)
}
