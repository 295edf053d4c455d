//! Public, read-only rendering of published versions.

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use uuid::Uuid;

use crate::content::block_render::render_document;
use crate::content::theme;
use crate::error::AppResult;
use crate::state::AppState;

/// Create the public router.
pub fn router() -> Router<AppState> {
    Router::new().route("/public/dpp/{id}/v/{version}", get(view_version))
}

/// GET /public/dpp/{id}/v/{version}
///
/// Renders only what the version froze; later edits never show here.
async fn view_version(
    State(state): State<AppState>,
    Path((id, version)): Path<(Uuid, i32)>,
) -> AppResult<Response> {
    let published = state.publish().public_version(id, version).await?;
    let resolved = theme::resolve(published.snapshot.styling.as_ref());
    let html = render_document(&published, &resolved);

    Ok((
        [(header::CACHE_CONTROL, "public, max-age=86400, immutable")],
        Html(html),
    )
        .into_response())
}
