//! PostgreSQL-backed store.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{BlockStore, DocumentStore, VersionStore, apply_patch, check_reorder, now};
use crate::error::{AppError, AppResult};
use crate::models::{
    Block, BlockContent, BlockPatch, ComplianceFields, Document, StylingConfig, Version,
};

/// Store over a `PgPool`. Cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Classify a model-layer failure. Connection trouble is retryable.
fn storage_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) => {
            AppError::Transient(err.to_string())
        }
        _ => AppError::Internal(err),
    }
}

#[async_trait]
impl BlockStore for PgStore {
    async fn list(&self, document_id: Uuid) -> AppResult<Vec<Block>> {
        Block::list_for_document(&self.pool, document_id)
            .await
            .map_err(storage_error)
    }

    async fn get(&self, document_id: Uuid, block_id: Uuid) -> AppResult<Block> {
        Block::find(&self.pool, document_id, block_id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| AppError::not_found(format!("block {block_id}")))
    }

    async fn create(&self, document_id: Uuid, content: BlockContent) -> AppResult<Block> {
        Block::create(&self.pool, document_id, &content)
            .await
            .map_err(storage_error)
    }

    async fn update(
        &self,
        document_id: Uuid,
        block_id: Uuid,
        patch: BlockPatch,
    ) -> AppResult<Block> {
        let mut tx = self.pool.begin().await?;

        let mut block = Block::find_for_update(&mut tx, document_id, block_id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| AppError::not_found(format!("block {block_id}")))?;

        apply_patch(&mut block, patch, now())?;
        let saved = Block::save(&mut tx, &block).await.map_err(storage_error)?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn delete(&self, document_id: Uuid, block_id: Uuid) -> AppResult<()> {
        let deleted = Block::delete(&self.pool, document_id, block_id)
            .await
            .map_err(storage_error)?;
        if !deleted {
            return Err(AppError::not_found(format!("block {block_id}")));
        }
        Ok(())
    }

    async fn reorder(&self, document_id: Uuid, ordered_ids: &[Uuid]) -> AppResult<Vec<Block>> {
        let mut tx = self.pool.begin().await?;

        let current = Block::list_for_update(&mut tx, document_id)
            .await
            .map_err(storage_error)?;
        // Dropping the transaction rolls back
        check_reorder(&current, ordered_ids)?;

        let ts = now();
        for (position, id) in ordered_ids.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| AppError::validation("too many blocks to reorder"))?;
            Block::set_position(&mut tx, document_id, *id, position, ts)
                .await
                .map_err(storage_error)?;
        }

        let blocks = Block::list_for_update(&mut tx, document_id)
            .await
            .map_err(storage_error)?;
        tx.commit().await?;

        debug!(document_id = %document_id, count = blocks.len(), "blocks reordered");
        Ok(blocks)
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn create(
        &self,
        organization_id: Uuid,
        fields: ComplianceFields,
    ) -> AppResult<Document> {
        Document::create(&self.pool, organization_id, &fields)
            .await
            .map_err(storage_error)
    }

    async fn get(&self, id: Uuid) -> AppResult<Document> {
        Document::find_by_id(&self.pool, id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| AppError::not_found(format!("document {id}")))
    }

    async fn update_fields(&self, id: Uuid, fields: ComplianceFields) -> AppResult<Document> {
        Document::update_fields(&self.pool, id, &fields)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| AppError::not_found(format!("document {id}")))
    }

    async fn update_styling(&self, id: Uuid, styling: StylingConfig) -> AppResult<Document> {
        Document::update_styling(&self.pool, id, &styling)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| AppError::not_found(format!("document {id}")))
    }
}

#[async_trait]
impl VersionStore for PgStore {
    async fn latest(&self, document_id: Uuid) -> AppResult<Option<Version>> {
        Version::latest(&self.pool, document_id)
            .await
            .map_err(storage_error)
    }

    async fn list(&self, document_id: Uuid) -> AppResult<Vec<Version>> {
        Version::list_for_document(&self.pool, document_id)
            .await
            .map_err(storage_error)
    }

    async fn find(&self, document_id: Uuid, version: i32) -> AppResult<Version> {
        Version::find(&self.pool, document_id, version)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| AppError::not_found(format!("version {version} of {document_id}")))
    }

    async fn append(&self, version: Version) -> AppResult<Version> {
        let mut tx = self.pool.begin().await?;

        // Lock the document row so appends for one document serialize
        let current: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT (SELECT MAX(version) FROM dpp_version WHERE document_id = d.id)
            FROM dpp_document d WHERE d.id = $1 FOR UPDATE
            "#,
        )
        .bind(version.document_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("document {}", version.document_id)))?;

        if version.version != current.unwrap_or(0) + 1 {
            return Err(AppError::Conflict(format!(
                "version {} of {} already exists or is out of sequence",
                version.version, version.document_id
            )));
        }

        if let Err(e) = Version::insert(&mut tx, &version).await {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            return Err(if duplicate {
                AppError::Conflict(format!(
                    "version {} of {} already exists",
                    version.version, version.document_id
                ))
            } else {
                AppError::Database(e)
            });
        }

        Document::mark_published(&mut tx, version.document_id, version.created_at)
            .await
            .map_err(storage_error)?;

        tx.commit().await?;
        Ok(version)
    }
}
