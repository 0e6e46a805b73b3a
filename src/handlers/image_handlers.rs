//! HTTP handlers for item photos. Multipart uploads fan out through the
//! storage gateway; one `Image` row is persisted per stored object.

use crate::{
    errors::AppError,
    models::image::Image,
    services::storage_gateway::UploadedAsset,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Per-file outcome of `POST /items/{id}/images`.
///
/// The gateway's partial-result policy is surfaced directly: the response
/// array is positionally aligned with the uploaded files, and a failed file
/// never hides the others.
#[derive(Serialize, Debug)]
pub struct AttachImageResult {
    pub filename: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST `/items/{id}/images` — attach uploaded files to a listing.
///
/// Payload size is capped by the body limit on this route; the gateway
/// relies on that cap and buffers each file whole.
pub async fn attach_images(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    crate::handlers::item_handlers::fetch_item(&state, item_id).await?;

    let mut assets = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart body: {}", err)))?
    {
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(format!("failed reading `{}`: {}", filename, err)))?;
        assets.push(UploadedAsset {
            bytes,
            filename,
            content_type,
        });
    }

    if assets.is_empty() {
        return Err(AppError::bad_request("no files in multipart body"));
    }

    let filenames: Vec<String> = assets.iter().map(|a| a.filename.clone()).collect();
    let outcomes = state.gateway.upload_many(assets).await?;

    let mut results = Vec::with_capacity(outcomes.len());
    for (filename, outcome) in filenames.into_iter().zip(outcomes) {
        match outcome {
            Ok(object) => {
                let image = Image {
                    id: Uuid::new_v4(),
                    url: object.url,
                    item_id,
                    created_at: Utc::now(),
                };
                sqlx::query(
                    "INSERT INTO images (id, url, item_id, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(image.id)
                .bind(&image.url)
                .bind(image.item_id)
                .bind(image.created_at)
                .execute(&*state.db)
                .await?;
                results.push(AttachImageResult {
                    filename,
                    success: true,
                    image: Some(image),
                    error: None,
                });
            }
            Err(err) => results.push(AttachImageResult {
                filename,
                success: false,
                image: None,
                error: Some(err.to_string()),
            }),
        }
    }

    let status = if results.iter().all(|r| r.success) {
        StatusCode::CREATED
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(results)))
}
