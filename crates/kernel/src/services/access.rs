//! Per-document authorization.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Document;
use crate::services::session::UserContext;

/// What a user may do with one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentAccess {
    None,
    View,
    Edit,
}

impl DocumentAccess {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentAccess::None => "no",
            DocumentAccess::View => "view",
            DocumentAccess::Edit => "edit",
        }
    }

    pub fn can_view(self) -> bool {
        self >= DocumentAccess::View
    }

    pub fn can_edit(self) -> bool {
        self == DocumentAccess::Edit
    }
}

#[async_trait]
pub trait AccessResolver: Send + Sync {
    /// Access to every document of an organization.
    async fn organization_access(
        &self,
        user: &UserContext,
        organization_id: Uuid,
    ) -> AppResult<DocumentAccess>;

    async fn access(&self, user: &UserContext, document: &Document) -> AppResult<DocumentAccess> {
        self.organization_access(user, document.organization_id)
            .await
    }
}

/// Fail unless `user` has at least `needed` on `document`.
///
/// Anonymous callers get `Unauthorized`, signed-in callers `Forbidden`.
pub async fn require(
    resolver: &dyn AccessResolver,
    user: &UserContext,
    document: &Document,
    needed: DocumentAccess,
) -> AppResult<()> {
    let granted = resolver.access(user, document).await?;
    check(granted, needed, user, || format!("document {}", document.id))
}

/// Like `require`, for the organization as a whole.
pub async fn require_organization(
    resolver: &dyn AccessResolver,
    user: &UserContext,
    organization_id: Uuid,
    needed: DocumentAccess,
) -> AppResult<()> {
    let granted = resolver.organization_access(user, organization_id).await?;
    check(granted, needed, user, || format!("organization {organization_id}"))
}

fn check(
    granted: DocumentAccess,
    needed: DocumentAccess,
    user: &UserContext,
    target: impl FnOnce() -> String,
) -> AppResult<()> {
    if granted >= needed {
        return Ok(());
    }
    if !user.authenticated {
        return Err(AppError::Unauthorized);
    }
    Err(AppError::Forbidden(format!(
        "{} access to {} required",
        needed.as_str(),
        target()
    )))
}
