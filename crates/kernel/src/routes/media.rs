//! Media upload and serving.

use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{Response, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::routes::helpers::current_user;
use crate::services::{StoredMedia, UserContext};
use crate::state::AppState;

/// Create the media router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/dpp/{id}/media",
            post(upload_media).layer(DefaultBodyLimit::disable()),
        )
        .route("/files/{*path}", get(serve_file))
}

/// POST /api/dpp/{id}/media
/// Content-Type: multipart/form-data
///
/// Form fields:
/// - file: The file to upload
async fn upload_media(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<StoredMedia>)> {
    let limit = state.max_upload_bytes();
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("malformed upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::validation(format!("failed to read upload: {e}")))?
        {
            if data.len() + chunk.len() > limit {
                return Err(AppError::validation(format!(
                    "file too large (max {limit} bytes)"
                )));
            }
            data.extend_from_slice(&chunk);
        }
        upload = Some((filename, data));
        // Only the first file is stored
        break;
    }

    let Some((filename, data)) = upload else {
        return Err(AppError::validation("no file provided"));
    };

    let stored = state
        .blocks()
        .upload_media(&current_user(user), id, state.media(), &filename, &data)
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /files/{path}
async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> Response<Body> {
    let path = path.trim_start_matches('/');
    if path.contains("..") || path.contains('\0') {
        return StatusCode::NOT_FOUND.into_response();
    }

    let file_path = state.uploads_dir().join(path);
    let content = match fs::read(&file_path).await {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %file_path.display(), error = %e, "failed to read media file");
            }
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let content_type = infer::get(&content)
        .map(|kind| kind.mime_type())
        .unwrap_or_else(|| mime_from_path(&file_path));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        content,
    )
        .into_response()
}

fn mime_from_path(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}
