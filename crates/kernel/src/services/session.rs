//! Request identity.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;

/// User context for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    /// User ID (`Uuid::nil()` for anonymous).
    pub id: Uuid,
    /// Whether the user is authenticated.
    pub authenticated: bool,
}

impl UserContext {
    /// Create context for an anonymous user.
    pub fn anonymous() -> Self {
        Self {
            id: Uuid::nil(),
            authenticated: false,
        }
    }

    /// Create context for an authenticated user.
    pub fn authenticated(id: Uuid) -> Self {
        Self {
            id,
            authenticated: true,
        }
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Resolves a bearer token to a user.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `None` means the token is unknown.
    async fn resolve(&self, token: &str) -> AppResult<Option<UserContext>>;
}
