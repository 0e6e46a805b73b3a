//! HTTP handler serving stored objects so the public URLs constructed by the
//! gateway resolve. Streams payloads from disk without buffering.

use crate::{errors::AppError, state::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

/// GET `/{bucket}/{*key}` — download a stored object.
///
/// Only the bucket this deployment uploads into is served; anything else is
/// a 404 rather than a directory walk.
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    if bucket != state.gateway.bucket() {
        return Err(AppError::not_found(format!("bucket `{}` not found", bucket)));
    }

    let (file, len) = state.object_store.get_object_reader(&bucket, &key).await?;
    let stream = ReaderStream::new(file);

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_key(&key)),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&len.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    Ok(response)
}

/// Content type inferred from the key's extension. Keys are generated by the
/// gateway, so only allow-listed media ever lands here.
fn content_type_for_key(key: &str) -> &'static str {
    let extension = key.rsplit('.').next().unwrap_or_default();
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for_key("abc.PNG"), "image/png");
        assert_eq!(content_type_for_key("abc.jpeg"), "image/jpeg");
        assert_eq!(content_type_for_key("clip.mp4"), "video/mp4");
        assert_eq!(content_type_for_key("no-extension"), "application/octet-stream");
    }
}
