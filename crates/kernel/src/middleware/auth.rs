//! Bearer token authentication middleware.
//!
//! Resolves `Authorization: Bearer <token>` through the configured
//! `SessionResolver` and stores the resulting `UserContext` in request
//! extensions. Requests without a bearer token continue as anonymous.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::services::UserContext;
use crate::state::AppState;

fn invalid_token(message: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer error=\"invalid_token\"")],
        message,
    )
        .into_response()
}

/// Middleware to authenticate bearer tokens.
///
/// A valid token sets an authenticated `UserContext`; no token sets an
/// anonymous one; an unknown token returns 401.
pub async fn authenticate_bearer_token(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .map(String::from);

    let Some(token) = token else {
        request.extensions_mut().insert(UserContext::anonymous());
        return next.run(request).await;
    };

    let user = match state.sessions().resolve(&token).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!("unknown bearer token");
            return invalid_token("Invalid token");
        }
        Err(e) => {
            warn!(error = %e, "failed to resolve bearer token; denying request");
            return (StatusCode::SERVICE_UNAVAILABLE, "Unable to verify token").into_response();
        }
    };

    debug!(user_id = %user.id, "bearer token accepted");
    request.extensions_mut().insert(user);
    next.run(request).await
}
