//! Publishing: freezing a document into an immutable, numbered version.
//!
//! A publish captures the compliance fields, the published blocks and the
//! styling config by value. Drafts never leave the editor. The snapshot is
//! hashed over a canonical projection (no timestamps, no order numbers) so
//! publishing an unchanged document returns the latest version instead of
//! writing a new one.
//!
//! The publish state is derived, never stored:
//!
//! | versions | current hash == latest hash | state |
//! |---|---|---|
//! | none | - | `Draft` |
//! | some | yes | `Published` |
//! | some | no | `PublishedWithPendingEdits` |

pub mod cache;
pub mod guard;

use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Block, BlockStatus, BlockType, ComplianceFields, Document, Snapshot, StylingConfig, Version,
};
use crate::services::code::CodeGenerator;
use crate::services::gate::DocumentGate;
use crate::services::session::UserContext;
use crate::store::{BlockStore, VersionStore, sort_blocks};

pub use cache::VersionCache;
pub use guard::{PublishGuard, RequiredFields};

/// Derived lifecycle of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    Draft,
    Published,
    PublishedWithPendingEdits,
}

/// Result of a publish request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub version: Arc<Version>,
    /// False when the document was unchanged and the latest version was
    /// returned as-is.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishStatus {
    pub state: PublishState,
    pub latest_version: Option<i32>,
    pub current_hash: String,
}

/// Version listing entry without the snapshot body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub version: i32,
    pub created_at: i64,
    pub created_by: Uuid,
    pub content_hash: String,
    pub public_url: String,
    pub scannable_code: Option<String>,
    pub block_count: usize,
}

impl From<&Version> for VersionSummary {
    fn from(v: &Version) -> Self {
        Self {
            version: v.version,
            created_at: v.created_at,
            created_by: v.created_by,
            content_hash: v.content_hash.clone(),
            public_url: v.public_url.clone(),
            scannable_code: v.scannable_code.clone(),
            block_count: v.snapshot.blocks.len(),
        }
    }
}

/// Freeze the publishable state of a document.
pub fn capture(document: &Document, blocks: &[Block]) -> Snapshot {
    let mut published: Vec<Block> = blocks
        .iter()
        .filter(|b| b.status == BlockStatus::Published)
        .cloned()
        .collect();
    sort_blocks(&mut published);

    Snapshot {
        fields: document.fields.clone(),
        blocks: published,
        styling: document.styling.clone(),
    }
}

#[derive(Serialize)]
struct HashedBlock {
    id: Uuid,
    #[serde(rename = "type")]
    block_type: BlockType,
    content: serde_json::Value,
}

#[derive(Serialize)]
struct HashedSnapshot<'a> {
    fields: &'a ComplianceFields,
    styling: Option<&'a StylingConfig>,
    blocks: Vec<HashedBlock>,
}

/// Hex SHA-256 over the parts of a snapshot a reader can see.
pub fn content_hash(snapshot: &Snapshot) -> AppResult<String> {
    let blocks = snapshot
        .blocks
        .iter()
        .map(|b| {
            Ok(HashedBlock {
                id: b.id,
                block_type: b.block_type(),
                content: b.content.content_json()?,
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to serialize block: {e}")))?;

    let projection = HashedSnapshot {
        fields: &snapshot.fields,
        styling: snapshot.styling.as_ref(),
        blocks,
    };
    let bytes = serde_json::to_vec(&projection)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to serialize snapshot: {e}")))?;

    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Public address of a version.
pub fn public_url(site_url: &str, document_id: Uuid, version: i32) -> String {
    format!(
        "{}/public/dpp/{document_id}/v/{version}",
        site_url.trim_end_matches('/')
    )
}

/// Publish/version pipeline.
#[derive(Clone)]
pub struct PublishService {
    inner: Arc<PublishServiceInner>,
}

struct PublishServiceInner {
    gate: DocumentGate,
    blocks: Arc<dyn BlockStore>,
    versions: VersionCache,
    codes: Arc<dyn CodeGenerator>,
    guard: Arc<dyn PublishGuard>,
    site_url: String,
}

impl PublishService {
    pub fn new(
        gate: DocumentGate,
        blocks: Arc<dyn BlockStore>,
        versions: VersionCache,
        codes: Arc<dyn CodeGenerator>,
        guard: Arc<dyn PublishGuard>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(PublishServiceInner {
                gate,
                blocks,
                versions,
                codes,
                guard,
                site_url: site_url.into(),
            }),
        }
    }

    fn version_store(&self) -> &dyn VersionStore {
        self.inner.versions.store()
    }

    async fn current_snapshot(&self, document: &Document) -> AppResult<Snapshot> {
        let blocks = self.inner.blocks.list(document.id).await?;
        Ok(capture(document, &blocks))
    }

    /// Publish the document's current state.
    ///
    /// Unchanged documents return the latest version with `created = false`.
    pub async fn publish(
        &self,
        user: &UserContext,
        document_id: Uuid,
    ) -> AppResult<PublishOutcome> {
        let document = self.inner.gate.edit(user, document_id).await?;
        let snapshot = self.current_snapshot(&document).await?;

        let problems = self.inner.guard.check(&snapshot);
        if !problems.is_empty() {
            return Err(AppError::Validation(problems));
        }

        let hash = content_hash(&snapshot)?;
        let latest = self.version_store().latest(document_id).await?;
        if let Some(latest) = latest.as_ref()
            && latest.content_hash == hash
        {
            info!(
                document_id = %document_id,
                version = latest.version,
                "publish skipped, no changes"
            );
            return Ok(PublishOutcome {
                version: Arc::new(latest.clone()),
                created: false,
            });
        }

        let number = latest.map_or(1, |v| v.version + 1);
        let url = public_url(&self.inner.site_url, document_id, number);
        let scannable_code = match self.inner.codes.generate(&url, document_id, number).await {
            Ok(code) => Some(code),
            Err(e) => {
                warn!(
                    document_id = %document_id,
                    version = number,
                    error = %e,
                    "scannable code generation failed"
                );
                None
            }
        };

        let version = Version {
            id: Uuid::now_v7(),
            document_id,
            version: number,
            created_at: crate::store::now(),
            created_by: user.id,
            snapshot,
            content_hash: hash.clone(),
            public_url: url,
            scannable_code,
        };

        match self.version_store().append(version).await {
            Ok(version) => {
                info!(
                    document_id = %document_id,
                    version = version.version,
                    blocks = version.snapshot.blocks.len(),
                    "document published"
                );
                self.inner.versions.insert(version.clone()).await;
                Ok(PublishOutcome {
                    version: Arc::new(version),
                    created: true,
                })
            }
            Err(AppError::Conflict(message)) => {
                // A concurrent publish won the number; identical content is a no-op
                match self.version_store().latest(document_id).await? {
                    Some(winner) if winner.content_hash == hash => Ok(PublishOutcome {
                        version: Arc::new(winner),
                        created: false,
                    }),
                    _ => Err(AppError::Conflict(message)),
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn state(&self, user: &UserContext, document_id: Uuid) -> AppResult<PublishStatus> {
        let document = self.inner.gate.view(user, document_id).await?;
        let current_hash = content_hash(&self.current_snapshot(&document).await?)?;
        let latest = self.version_store().latest(document_id).await?;

        let state = match &latest {
            None => PublishState::Draft,
            Some(v) if v.content_hash == current_hash => PublishState::Published,
            Some(_) => PublishState::PublishedWithPendingEdits,
        };

        Ok(PublishStatus {
            state,
            latest_version: latest.map(|v| v.version),
            current_hash,
        })
    }

    /// Version history, newest first.
    pub async fn versions(
        &self,
        user: &UserContext,
        document_id: Uuid,
    ) -> AppResult<Vec<VersionSummary>> {
        self.inner.gate.view(user, document_id).await?;
        let versions = self.version_store().list(document_id).await?;
        Ok(versions.iter().map(VersionSummary::from).collect())
    }

    pub async fn version(
        &self,
        user: &UserContext,
        document_id: Uuid,
        version: i32,
    ) -> AppResult<Arc<Version>> {
        self.inner.gate.view(user, document_id).await?;
        self.inner.versions.get(document_id, version).await
    }

    /// A published version as the public sees it. No access check.
    pub async fn public_version(&self, document_id: Uuid, version: i32) -> AppResult<Arc<Version>> {
        self.inner.versions.get(document_id, version).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::block_types::Capabilities;
    use crate::models::{BlockContent, BlockPatch};
    use crate::store::MemoryStore;

    fn block(order: i32, status: BlockStatus) -> Block {
        Block {
            id: Uuid::now_v7(),
            document_id: Uuid::nil(),
            order,
            status,
            content: BlockContent::empty(BlockType::Text),
            created: 0,
            changed: 0,
        }
    }

    fn document() -> Document {
        Document {
            id: Uuid::nil(),
            organization_id: Uuid::nil(),
            status: crate::models::DocumentStatus::Draft,
            fields: ComplianceFields::named("Chair"),
            styling: None,
            created: 0,
            changed: 0,
        }
    }

    #[test]
    fn capture_keeps_published_blocks_in_order() {
        let blocks = vec![
            block(2, BlockStatus::Published),
            block(0, BlockStatus::Draft),
            block(1, BlockStatus::Published),
        ];
        let snapshot = capture(&document(), &blocks);
        assert_eq!(snapshot.blocks.len(), 2);
        assert_eq!(snapshot.blocks[0].order, 1);
        assert_eq!(snapshot.blocks[1].order, 2);
    }

    #[test]
    fn hash_ignores_timestamps_and_orders() {
        let mut published = block(0, BlockStatus::Published);
        let a = capture(&document(), std::slice::from_ref(&published));
        published.changed = 99;
        published.order = 7;
        let b = capture(&document(), std::slice::from_ref(&published));
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());

        let mut doc = document();
        doc.fields.brand = Some("Acme".into());
        let c = capture(&doc, std::slice::from_ref(&published));
        assert_ne!(content_hash(&a).unwrap(), content_hash(&c).unwrap());
    }

    #[test]
    fn public_url_trims_trailing_slash() {
        let id = Uuid::nil();
        assert_eq!(
            public_url("https://dpp.example/", id, 3),
            format!("https://dpp.example/public/dpp/{id}/v/3")
        );
    }

    /// Open access and every capability.
    struct Everyone;

    #[async_trait::async_trait]
    impl crate::services::AccessResolver for Everyone {
        async fn organization_access(
            &self,
            _: &UserContext,
            _: Uuid,
        ) -> AppResult<crate::services::DocumentAccess> {
            Ok(crate::services::DocumentAccess::Edit)
        }
    }

    #[async_trait::async_trait]
    impl crate::services::CapabilityResolver for Everyone {
        async fn capabilities(&self, _: Uuid) -> AppResult<Capabilities> {
            Ok(Capabilities::default())
        }
    }

    /// Lets another writer take the next number right before our append.
    struct RacingVersions {
        inner: Arc<MemoryStore>,
        /// Whether the rival's content matches the version being appended.
        same_content: bool,
        raced: parking_lot::Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl VersionStore for RacingVersions {
        async fn latest(&self, document_id: Uuid) -> AppResult<Option<Version>> {
            VersionStore::latest(self.inner.as_ref(), document_id).await
        }

        async fn list(&self, document_id: Uuid) -> AppResult<Vec<Version>> {
            VersionStore::list(self.inner.as_ref(), document_id).await
        }

        async fn find(&self, document_id: Uuid, version: i32) -> AppResult<Version> {
            VersionStore::find(self.inner.as_ref(), document_id, version).await
        }

        async fn append(&self, version: Version) -> AppResult<Version> {
            let race = !std::mem::replace(&mut *self.raced.lock(), true);
            if race {
                let mut rival = version.clone();
                rival.id = Uuid::now_v7();
                if !self.same_content {
                    rival.content_hash = "rival".to_string();
                }
                VersionStore::append(self.inner.as_ref(), rival).await?;
            }
            VersionStore::append(self.inner.as_ref(), version).await
        }
    }

    async fn racing_service(same_content: bool) -> (PublishService, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let doc = crate::store::DocumentStore::create(
            store.as_ref(),
            Uuid::now_v7(),
            ComplianceFields::named("Chair"),
        )
        .await
        .unwrap();
        let everyone = Arc::new(Everyone);
        let gate = DocumentGate::new(
            store.clone(),
            everyone.clone(),
            everyone,
            Arc::new(crate::content::block_types::BlockTypeRegistry::default()),
        );
        let versions = Arc::new(RacingVersions {
            inner: store.clone(),
            same_content,
            raced: parking_lot::Mutex::new(false),
        });
        let service = PublishService::new(
            gate,
            store.clone(),
            VersionCache::new(versions),
            Arc::new(crate::services::LinkCodeGenerator),
            Arc::new(RequiredFields::default()),
            "https://dpp.example",
        );
        (service, store, doc.id)
    }

    #[tokio::test]
    async fn lost_race_with_identical_content_returns_winner() {
        let (service, store, doc) = racing_service(true).await;
        let user = UserContext::authenticated(Uuid::now_v7());

        let outcome = service.publish(&user, doc).await.unwrap();
        assert!(!outcome.created);
        assert_eq!(outcome.version.version, 1);
        assert_eq!(VersionStore::list(store.as_ref(), doc).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lost_race_with_different_content_conflicts() {
        let (service, store, doc) = racing_service(false).await;
        let user = UserContext::authenticated(Uuid::now_v7());

        let err = service.publish(&user, doc).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
        let history = VersionStore::list(store.as_ref(), doc).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content_hash, "rival");

        // The next attempt sees the rival as latest and takes number 2
        let outcome = service.publish(&user, doc).await.unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.version.version, 2);
    }

    #[tokio::test]
    async fn block_status_change_alters_hash() {
        let store = MemoryStore::new();
        let doc = crate::store::DocumentStore::create(
            &store,
            Uuid::nil(),
            ComplianceFields::named("Chair"),
        )
        .await
        .unwrap();
        let b = BlockStore::create(&store, doc.id, BlockContent::empty(BlockType::Text))
            .await
            .unwrap();

        let before = content_hash(&capture(&doc, &BlockStore::list(&store, doc.id).await.unwrap()))
            .unwrap();
        BlockStore::update(&store, doc.id, b.id, BlockPatch::status(BlockStatus::Published))
            .await
            .unwrap();
        let after = content_hash(&capture(&doc, &BlockStore::list(&store, doc.id).await.unwrap()))
            .unwrap();
        assert_ne!(before, after);
    }
}
