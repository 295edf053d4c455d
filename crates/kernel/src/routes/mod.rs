//! HTTP route handlers.

pub mod blocks;
pub mod documents;
pub mod health;
pub mod helpers;
pub mod media;
pub mod public;
pub mod publish;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router with its request middleware.
///
/// Layers (last added = first executed in request flow):
/// TraceLayer → bearer auth → routes
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(documents::router())
        .merge(blocks::router())
        .merge(media::router())
        .merge(publish::router())
        .merge(public::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::authenticate_bearer_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
