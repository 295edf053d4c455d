//! Document lookup combined with access and capability checks.

use std::sync::Arc;

use uuid::Uuid;

use crate::content::block_types::{BlockTypeRegistry, CMS_ACCESS, Capabilities};
use crate::error::{AppError, AppResult};
use crate::models::Document;
use crate::services::access::{self, AccessResolver, DocumentAccess};
use crate::services::capability::{self, CapabilityResolver};
use crate::services::session::UserContext;
use crate::store::DocumentStore;

/// Shared by the block, document and publish services.
#[derive(Clone)]
pub struct DocumentGate {
    documents: Arc<dyn DocumentStore>,
    access: Arc<dyn AccessResolver>,
    capabilities: Arc<dyn CapabilityResolver>,
    registry: Arc<BlockTypeRegistry>,
}

impl DocumentGate {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        access: Arc<dyn AccessResolver>,
        capabilities: Arc<dyn CapabilityResolver>,
        registry: Arc<BlockTypeRegistry>,
    ) -> Self {
        Self {
            documents,
            access,
            capabilities,
            registry,
        }
    }

    pub fn documents(&self) -> &dyn DocumentStore {
        self.documents.as_ref()
    }

    pub fn access(&self) -> &dyn AccessResolver {
        self.access.as_ref()
    }

    pub fn registry(&self) -> &BlockTypeRegistry {
        &self.registry
    }

    /// Load a document the user may at least view.
    pub async fn view(&self, user: &UserContext, document_id: Uuid) -> AppResult<Document> {
        self.load(user, document_id, DocumentAccess::View).await
    }

    /// Load a document the user may edit.
    pub async fn edit(&self, user: &UserContext, document_id: Uuid) -> AppResult<Document> {
        self.load(user, document_id, DocumentAccess::Edit).await
    }

    /// Load a document whose content blocks the user may edit.
    ///
    /// Requires edit access and the organization's `cms_access` capability.
    pub async fn edit_content(
        &self,
        user: &UserContext,
        document_id: Uuid,
    ) -> AppResult<(Document, Capabilities)> {
        let document = self.edit(user, document_id).await?;
        let granted = self.capabilities_of(&document).await?;
        self.require_capability(CMS_ACCESS, &granted)?;
        Ok((document, granted))
    }

    /// Capabilities of the document's organization.
    pub async fn capabilities_of(&self, document: &Document) -> AppResult<Capabilities> {
        capability::resolve(self.capabilities.as_ref(), document.organization_id).await
    }

    pub fn require_capability(&self, key: &str, granted: &Capabilities) -> AppResult<()> {
        if self.registry.is_granted(key, granted) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "capability '{key}' is not available for this organization"
            )))
        }
    }

    async fn load(
        &self,
        user: &UserContext,
        document_id: Uuid,
        needed: DocumentAccess,
    ) -> AppResult<Document> {
        let document = self.documents.get(document_id).await?;
        access::require(self.access.as_ref(), user, &document, needed).await?;
        Ok(document)
    }
}
