//! Content block routes.
//!
//! All paths are scoped to a document: `/api/dpp/{id}/content/...`.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::content::block_service::BlockTypeCatalog;
use crate::content::editor::FormField;
use crate::error::{AppError, AppResult};
use crate::models::{Block, BlockContent, BlockPatch, BlockStatus, BlockType};
use crate::routes::helpers::{current_user, parse_body};
use crate::services::UserContext;
use crate::state::AppState;

/// Create the block router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/dpp/{id}/content/blocks",
            get(list_blocks).post(create_block),
        )
        .route("/api/dpp/{id}/content/blocks/reorder", post(reorder_blocks))
        .route(
            "/api/dpp/{id}/content/blocks/{block_id}",
            put(update_block).delete(delete_block),
        )
        .route(
            "/api/dpp/{id}/content/blocks/{block_id}/form",
            get(block_form),
        )
        .route("/api/dpp/{id}/content/block-types", get(block_types))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBlockRequest {
    #[serde(rename = "type")]
    block_type: BlockType,
    /// Explicit content; when absent the template or type default is used.
    content: Option<Value>,
    template_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBlockRequest {
    content: Option<Value>,
    status: Option<BlockStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderRequest {
    block_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AutoSaveHints {
    debounce_ms: u64,
    typing_window_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockTypesResponse {
    #[serde(flatten)]
    catalog: BlockTypeCatalog,
    autosave: AutoSaveHints,
}

fn content_for(block_type: BlockType, content: Value) -> AppResult<BlockContent> {
    BlockContent::from_parts(block_type, content)
        .map_err(|e| AppError::validation(format!("invalid {block_type} content: {e}")))
}

/// GET /api/dpp/{id}/content/blocks
async fn list_blocks(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Block>>> {
    let blocks = state.blocks().list(&current_user(user), id).await?;
    Ok(Json(blocks))
}

/// POST /api/dpp/{id}/content/blocks
async fn create_block(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<Block>)> {
    let user = current_user(user);
    let request: CreateBlockRequest = parse_body(body)?;

    let block = match request.content {
        Some(content) => {
            let content = content_for(request.block_type, content)?;
            state.blocks().create(&user, id, content).await?
        }
        None => {
            state
                .blocks()
                .create_from_template(&user, id, request.block_type, request.template_id.as_deref())
                .await?
        }
    };

    Ok((StatusCode::CREATED, Json(block)))
}

/// PUT /api/dpp/{id}/content/blocks/{block_id}
///
/// Returns the canonical stored block.
async fn update_block(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path((id, block_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<Value>,
) -> AppResult<Json<Block>> {
    let user = current_user(user);
    let request: UpdateBlockRequest = parse_body(body)?;

    let content = match request.content {
        Some(content) => {
            // The stored type decides how the payload is read
            let current = state.blocks().get(&user, id, block_id).await?;
            Some(content_for(current.block_type(), content)?)
        }
        None => None,
    };

    let patch = BlockPatch {
        content,
        status: request.status,
    };
    let block = state.blocks().update(&user, id, block_id, patch).await?;
    Ok(Json(block))
}

/// DELETE /api/dpp/{id}/content/blocks/{block_id}
async fn delete_block(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path((id, block_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .blocks()
        .delete(&current_user(user), id, block_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/dpp/{id}/content/blocks/reorder
async fn reorder_blocks(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<Vec<Block>>> {
    let request: ReorderRequest = parse_body(body)?;
    let blocks = state
        .blocks()
        .reorder(&current_user(user), id, &request.block_ids)
        .await?;
    Ok(Json(blocks))
}

/// GET /api/dpp/{id}/content/blocks/{block_id}/form
async fn block_form(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path((id, block_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<FormField>>> {
    let form = state
        .blocks()
        .form(&current_user(user), id, block_id)
        .await?;
    Ok(Json(form))
}

/// GET /api/dpp/{id}/content/block-types
async fn block_types(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BlockTypesResponse>> {
    let catalog = state.blocks().catalog(&current_user(user), id).await?;
    let settings = state.autosave();
    Ok(Json(BlockTypesResponse {
        catalog,
        autosave: AutoSaveHints {
            debounce_ms: u64::try_from(settings.debounce.as_millis()).unwrap_or(u64::MAX),
            typing_window_ms: u64::try_from(settings.typing_window.as_millis())
                .unwrap_or(u64::MAX),
        },
    }))
}
