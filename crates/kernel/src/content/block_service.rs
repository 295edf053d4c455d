//! Guarded block operations.
//!
//! Wraps a `BlockStore` with access checks, capability checks and content
//! validation. Every write requires edit access plus `cms_access`; creating
//! or changing a block re-checks that its type is available to the
//! organization, whatever the client's picker showed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::content::block_types::{BlockTemplate, BlockTypeDefinition, Capabilities};
use crate::content::editor::{self, FormField};
use crate::error::{AppError, AppResult};
use crate::models::{Block, BlockContent, BlockPatch, BlockStatus, BlockType};
use crate::services::gate::DocumentGate;
use crate::services::media::{MediaStore, StoredMedia};
use crate::services::session::UserContext;
use crate::store::BlockStore;

/// Block types and templates offered to a document's editors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTypeCatalog {
    pub types: Vec<BlockTypeDefinition>,
    pub templates: Vec<BlockTemplate>,
}

/// Service for block CRUD with authorization and validation.
#[derive(Clone)]
pub struct BlockService {
    inner: Arc<BlockServiceInner>,
}

struct BlockServiceInner {
    store: Arc<dyn BlockStore>,
    gate: DocumentGate,
}

impl BlockService {
    pub fn new(store: Arc<dyn BlockStore>, gate: DocumentGate) -> Self {
        Self {
            inner: Arc::new(BlockServiceInner { store, gate }),
        }
    }

    fn store(&self) -> &dyn BlockStore {
        self.inner.store.as_ref()
    }

    fn gate(&self) -> &DocumentGate {
        &self.inner.gate
    }

    fn check_content(
        &self,
        content: &BlockContent,
        status: BlockStatus,
        granted: &Capabilities,
    ) -> AppResult<()> {
        let registry = self.gate().registry();
        registry.ensure_available(content.block_type(), granted)?;
        let errors = registry.validate(content, status);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }

    /// Blocks of a document in display order.
    pub async fn list(&self, user: &UserContext, document_id: Uuid) -> AppResult<Vec<Block>> {
        self.gate().view(user, document_id).await?;
        self.store().list(document_id).await
    }

    pub async fn get(
        &self,
        user: &UserContext,
        document_id: Uuid,
        block_id: Uuid,
    ) -> AppResult<Block> {
        self.gate().view(user, document_id).await?;
        self.store().get(document_id, block_id).await
    }

    /// Editing form for a block.
    pub async fn form(
        &self,
        user: &UserContext,
        document_id: Uuid,
        block_id: Uuid,
    ) -> AppResult<Vec<FormField>> {
        let block = self.get(user, document_id, block_id).await?;
        Ok(editor::form(&block.content))
    }

    /// Block types and templates the document's organization may use.
    pub async fn catalog(
        &self,
        user: &UserContext,
        document_id: Uuid,
    ) -> AppResult<BlockTypeCatalog> {
        let document = self.gate().view(user, document_id).await?;
        let granted = self.gate().capabilities_of(&document).await?;
        let registry = self.gate().registry();
        Ok(BlockTypeCatalog {
            types: registry.list_available(&granted).into_iter().cloned().collect(),
            templates: registry
                .available_templates(&granted)
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    /// Create a draft block at the end of the list.
    pub async fn create(
        &self,
        user: &UserContext,
        document_id: Uuid,
        content: BlockContent,
    ) -> AppResult<Block> {
        let (_, granted) = self.gate().edit_content(user, document_id).await?;
        self.check_content(&content, BlockStatus::Draft, &granted)?;

        let block = self.store().create(document_id, content).await?;
        info!(
            document_id = %document_id,
            block_id = %block.id,
            block_type = %block.block_type(),
            "block created"
        );
        Ok(block)
    }

    /// Create a block seeded from a template or the type's default content.
    pub async fn create_from_template(
        &self,
        user: &UserContext,
        document_id: Uuid,
        block_type: BlockType,
        template_id: Option<&str>,
    ) -> AppResult<Block> {
        let content = self
            .gate()
            .registry()
            .initial_content(block_type, template_id)?;
        self.create(user, document_id, content).await
    }

    /// Apply a content and/or status change.
    pub async fn update(
        &self,
        user: &UserContext,
        document_id: Uuid,
        block_id: Uuid,
        patch: BlockPatch,
    ) -> AppResult<Block> {
        if patch.is_empty() {
            return Err(AppError::validation("nothing to update"));
        }
        let (_, granted) = self.gate().edit_content(user, document_id).await?;
        let current = self.store().get(document_id, block_id).await?;

        let content = patch.content.as_ref().unwrap_or(&current.content);
        let status = patch.status.unwrap_or(current.status);
        if content.block_type() != current.block_type() {
            return Err(AppError::validation(format!(
                "block type cannot change from {} to {}",
                current.block_type(),
                content.block_type()
            )));
        }
        self.check_content(content, status, &granted)?;

        let block = self.store().update(document_id, block_id, patch).await?;
        info!(
            document_id = %document_id,
            block_id = %block_id,
            status = block.status.as_str(),
            "block updated"
        );
        Ok(block)
    }

    pub async fn set_status(
        &self,
        user: &UserContext,
        document_id: Uuid,
        block_id: Uuid,
        status: BlockStatus,
    ) -> AppResult<Block> {
        self.update(user, document_id, block_id, BlockPatch::status(status))
            .await
    }

    pub async fn delete(
        &self,
        user: &UserContext,
        document_id: Uuid,
        block_id: Uuid,
    ) -> AppResult<()> {
        self.gate().edit_content(user, document_id).await?;
        self.store().delete(document_id, block_id).await?;
        info!(document_id = %document_id, block_id = %block_id, "block deleted");
        Ok(())
    }

    /// Rewrite block orders to match `ordered_ids` (all or nothing).
    pub async fn reorder(
        &self,
        user: &UserContext,
        document_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> AppResult<Vec<Block>> {
        self.gate().edit_content(user, document_id).await?;
        let blocks = self.store().reorder(document_id, ordered_ids).await?;
        info!(document_id = %document_id, count = blocks.len(), "blocks reordered");
        Ok(blocks)
    }

    /// Store media for a block of this document and return its URL.
    pub async fn upload_media(
        &self,
        user: &UserContext,
        document_id: Uuid,
        media: &dyn MediaStore,
        filename: &str,
        data: &[u8],
    ) -> AppResult<StoredMedia> {
        self.gate().edit_content(user, document_id).await?;
        media.upload(document_id, filename, data).await
    }

    /// A `BlockStore` view that acts as `user`.
    pub fn scoped(&self, user: UserContext) -> ScopedBlocks {
        ScopedBlocks {
            service: self.clone(),
            user,
        }
    }
}

/// Per-user handle over a `BlockService`.
///
/// Lets the collection manager and editor run against the guarded path.
#[derive(Clone)]
pub struct ScopedBlocks {
    service: BlockService,
    user: UserContext,
}

#[async_trait]
impl BlockStore for ScopedBlocks {
    async fn list(&self, document_id: Uuid) -> AppResult<Vec<Block>> {
        self.service.list(&self.user, document_id).await
    }

    async fn get(&self, document_id: Uuid, block_id: Uuid) -> AppResult<Block> {
        self.service.get(&self.user, document_id, block_id).await
    }

    async fn create(&self, document_id: Uuid, content: BlockContent) -> AppResult<Block> {
        self.service.create(&self.user, document_id, content).await
    }

    async fn update(
        &self,
        document_id: Uuid,
        block_id: Uuid,
        patch: BlockPatch,
    ) -> AppResult<Block> {
        self.service
            .update(&self.user, document_id, block_id, patch)
            .await
    }

    async fn delete(&self, document_id: Uuid, block_id: Uuid) -> AppResult<()> {
        self.service.delete(&self.user, document_id, block_id).await
    }

    async fn reorder(&self, document_id: Uuid, ordered_ids: &[Uuid]) -> AppResult<Vec<Block>> {
        self.service
            .reorder(&self.user, document_id, ordered_ids)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::block_types::BlockTypeRegistry;
    use crate::models::block_content::TextContent;
    use crate::models::ComplianceFields;
    use crate::services::access::{AccessResolver, DocumentAccess};
    use crate::services::capability::CapabilityResolver;
    use crate::store::{DocumentStore, MemoryStore};

    /// Grants one access level and one capability set to everyone.
    struct Fixed {
        access: DocumentAccess,
        capabilities: Capabilities,
    }

    #[async_trait]
    impl AccessResolver for Fixed {
        async fn organization_access(&self, _: &UserContext, _: Uuid) -> AppResult<DocumentAccess> {
            Ok(self.access)
        }
    }

    #[async_trait]
    impl CapabilityResolver for Fixed {
        async fn capabilities(&self, _: Uuid) -> AppResult<Capabilities> {
            Ok(self.capabilities.clone())
        }
    }

    /// Entitlement backend that is down.
    struct Unreachable;

    #[async_trait]
    impl CapabilityResolver for Unreachable {
        async fn capabilities(&self, _: Uuid) -> AppResult<Capabilities> {
            Err(AppError::Transient("entitlements unreachable".to_string()))
        }
    }

    async fn service(access: DocumentAccess, caps: &[&str]) -> (BlockService, Uuid) {
        let fixed = Arc::new(Fixed {
            access,
            capabilities: Capabilities::new(caps.iter().copied()),
        });
        service_with(fixed.clone(), fixed).await
    }

    async fn service_with(
        access: Arc<dyn AccessResolver>,
        capabilities: Arc<dyn CapabilityResolver>,
    ) -> (BlockService, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let doc = DocumentStore::create(
            store.as_ref(),
            Uuid::now_v7(),
            ComplianceFields::named("Chair"),
        )
        .await
        .unwrap();
        let gate = DocumentGate::new(
            store.clone(),
            access,
            capabilities,
            Arc::new(BlockTypeRegistry::default()),
        );
        (BlockService::new(store, gate), doc.id)
    }

    fn user() -> UserContext {
        UserContext::authenticated(Uuid::now_v7())
    }

    fn text(value: &str) -> BlockContent {
        BlockContent::Text(TextContent {
            text: value.into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn editor_can_create_and_list() {
        let (svc, doc) = service(DocumentAccess::Edit, &["cms_access"]).await;
        let block = svc.create(&user(), doc, text("hello")).await.unwrap();
        assert_eq!(block.status, BlockStatus::Draft);
        assert_eq!(svc.list(&user(), doc).await.unwrap(), vec![block]);
    }

    #[tokio::test]
    async fn viewer_cannot_write() {
        let (svc, doc) = service(DocumentAccess::View, &["cms_access"]).await;
        assert!(svc.list(&user(), doc).await.is_ok());
        let err = svc.create(&user(), doc, text("x")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn anonymous_is_unauthorized() {
        let (svc, doc) = service(DocumentAccess::None, &[]).await;
        let err = svc.list(&UserContext::anonymous(), doc).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn missing_cms_access_is_forbidden() {
        let (svc, doc) = service(DocumentAccess::Edit, &["cms_styling"]).await;
        let err = svc.create(&user(), doc, text("x")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn empty_capabilities_fail_open() {
        let (svc, doc) = service(DocumentAccess::Edit, &[]).await;
        let block = svc
            .create_from_template(&user(), doc, BlockType::Storytelling, Some("storytelling_intro"))
            .await
            .unwrap();
        assert_eq!(block.block_type(), BlockType::Storytelling);
    }

    #[tokio::test]
    async fn failed_capability_lookup_grants_nothing() {
        let access = Arc::new(Fixed {
            access: DocumentAccess::Edit,
            capabilities: Capabilities::default(),
        });
        let (svc, doc) = service_with(access, Arc::new(Unreachable)).await;

        let err = svc
            .create_from_template(&user(), doc, BlockType::Storytelling, None)
            .await
            .unwrap_err();
        assert!(err.is_transient(), "{err:?}");
        assert!(svc.catalog(&user(), doc).await.unwrap_err().is_transient());
        assert!(svc.list(&user(), doc).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_type_is_rejected_server_side() {
        let (svc, doc) = service(DocumentAccess::Edit, &["cms_access"]).await;
        let err = svc
            .create_from_template(&user(), doc, BlockType::Storytelling, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let catalog = svc.catalog(&user(), doc).await.unwrap();
        assert!(catalog.types.iter().all(|t| t.capability == "cms_access"));
        assert!(catalog.templates.is_empty());
    }

    #[tokio::test]
    async fn publishing_requires_complete_content() {
        let (svc, doc) = service(DocumentAccess::Edit, &["cms_access"]).await;
        let block = svc.create(&user(), doc, text("")).await.unwrap();

        let err = svc
            .set_status(&user(), doc, block.id, BlockStatus::Published)
            .await
            .unwrap_err();
        let AppError::Validation(details) = err else {
            panic!("expected validation error");
        };
        assert!(details[0].contains("'text' is required"), "{details:?}");

        svc.update(&user(), doc, block.id, BlockPatch::content(text("Made in Portugal")))
            .await
            .unwrap();
        let published = svc
            .set_status(&user(), doc, block.id, BlockStatus::Published)
            .await
            .unwrap();
        assert!(published.is_published());
    }

    #[tokio::test]
    async fn type_change_is_rejected() {
        let (svc, doc) = service(DocumentAccess::Edit, &["cms_access"]).await;
        let block = svc.create(&user(), doc, text("a")).await.unwrap();
        let err = svc
            .update(
                &user(),
                doc,
                block.id,
                BlockPatch::content(BlockContent::empty(BlockType::Video)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn scoped_store_enforces_access() {
        let (svc, doc) = service(DocumentAccess::View, &["cms_access"]).await;
        let scoped = svc.scoped(user());
        assert!(scoped.list(doc).await.unwrap().is_empty());
        assert!(matches!(
            scoped.create(doc, text("x")).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
    }
}
