//! Publish and version history routes.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Version;
use crate::publish::{PublishOutcome, PublishStatus, VersionSummary};
use crate::routes::helpers::current_user;
use crate::services::UserContext;
use crate::state::AppState;

/// Create the publish router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dpp/{id}/publish", post(publish))
        .route("/api/dpp/{id}/publish-state", get(publish_state))
        .route("/api/dpp/{id}/versions", get(list_versions))
        .route("/api/dpp/{id}/versions/{version}", get(get_version))
}

/// POST /api/dpp/{id}/publish
///
/// 201 when a new version was written, 200 when the latest was returned.
async fn publish(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<PublishOutcome>)> {
    let outcome = state.publish().publish(&current_user(user), id).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// GET /api/dpp/{id}/publish-state
async fn publish_state(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PublishStatus>> {
    let status = state.publish().state(&current_user(user), id).await?;
    Ok(Json(status))
}

/// GET /api/dpp/{id}/versions
async fn list_versions(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<VersionSummary>>> {
    let versions = state.publish().versions(&current_user(user), id).await?;
    Ok(Json(versions))
}

/// GET /api/dpp/{id}/versions/{version}
async fn get_version(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path((id, version)): Path<(Uuid, i32)>,
) -> AppResult<Json<Arc<Version>>> {
    let version = state
        .publish()
        .version(&current_user(user), id, version)
        .await?;
    Ok(Json(version))
}
