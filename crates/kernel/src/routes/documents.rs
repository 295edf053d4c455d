//! Passport document routes: creation, compliance fields and styling.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::content::theme::ResolvedTheme;
use crate::error::AppResult;
use crate::models::{ComplianceFields, Document, StylingConfig};
use crate::routes::helpers::{current_user, parse_body};
use crate::services::UserContext;
use crate::state::AppState;

/// Create the document router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dpp", post(create_document))
        .route("/api/dpp/{id}", get(get_document))
        .route("/api/dpp/{id}/fields", put(update_fields))
        .route(
            "/api/dpp/{id}/content/styling",
            get(get_styling).put(update_styling),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocumentRequest {
    organization_id: Uuid,
    #[serde(flatten)]
    fields: ComplianceFields,
}

/// POST /api/dpp
async fn create_document(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<Document>)> {
    let request: CreateDocumentRequest = parse_body(body)?;
    let document = state
        .documents()
        .create(&current_user(user), request.organization_id, request.fields)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /api/dpp/{id}
async fn get_document(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Document>> {
    let document = state.documents().get(&current_user(user), id).await?;
    Ok(Json(document))
}

/// PUT /api/dpp/{id}/fields
///
/// Replaces the compliance fields; content blocks are not touched.
async fn update_fields(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<Document>> {
    let fields: ComplianceFields = parse_body(body)?;
    let document = state
        .documents()
        .update_fields(&current_user(user), id, fields)
        .await?;
    Ok(Json(document))
}

/// GET /api/dpp/{id}/content/styling
async fn get_styling(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ResolvedTheme>> {
    let theme = state.documents().styling(&current_user(user), id).await?;
    Ok(Json(theme))
}

/// PUT /api/dpp/{id}/content/styling
async fn update_styling(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<ResolvedTheme>> {
    let styling: StylingConfig = parse_body(body)?;
    let theme = state
        .documents()
        .update_styling(&current_user(user), id, styling)
        .await?;
    Ok(Json(theme))
}
