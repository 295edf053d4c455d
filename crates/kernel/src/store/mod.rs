//! Persistence seams for blocks, documents and versions.
//!
//! Each trait has a PostgreSQL implementation (`PgStore`) and an in-process
//! one (`MemoryStore`). Both share the validation helpers below so reorder
//! and patch semantics are identical regardless of backend.

mod memory;
mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Block, BlockContent, BlockPatch, ComplianceFields, Document, StylingConfig, Version,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Ordered content blocks of a document.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// All blocks of a document, sorted by order.
    async fn list(&self, document_id: Uuid) -> AppResult<Vec<Block>>;

    async fn get(&self, document_id: Uuid, block_id: Uuid) -> AppResult<Block>;

    /// Append a new draft block at the end of the document.
    async fn create(&self, document_id: Uuid, content: BlockContent) -> AppResult<Block>;

    /// Apply a partial update and return the canonical stored block.
    async fn update(&self, document_id: Uuid, block_id: Uuid, patch: BlockPatch)
    -> AppResult<Block>;

    async fn delete(&self, document_id: Uuid, block_id: Uuid) -> AppResult<()>;

    /// Rewrite every order field to match `ordered_ids` (0..N-1).
    ///
    /// All-or-nothing: an invalid id list leaves the stored order unchanged.
    async fn reorder(&self, document_id: Uuid, ordered_ids: &[Uuid]) -> AppResult<Vec<Block>>;
}

/// Compliance fields and styling persistence.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, organization_id: Uuid, fields: ComplianceFields)
    -> AppResult<Document>;

    async fn get(&self, id: Uuid) -> AppResult<Document>;

    async fn update_fields(&self, id: Uuid, fields: ComplianceFields) -> AppResult<Document>;

    async fn update_styling(&self, id: Uuid, styling: StylingConfig) -> AppResult<Document>;
}

/// Append-only version history.
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn latest(&self, document_id: Uuid) -> AppResult<Option<Version>>;

    /// All versions, newest first.
    async fn list(&self, document_id: Uuid) -> AppResult<Vec<Version>>;

    async fn find(&self, document_id: Uuid, version: i32) -> AppResult<Version>;

    /// Append a version and flip its document to published in one step.
    ///
    /// The number must be exactly one above the current maximum; otherwise
    /// (including a concurrent append of the same number) `Conflict` is
    /// returned and nothing is written.
    async fn append(&self, version: Version) -> AppResult<Version>;
}

/// Check a requested id sequence against the blocks currently stored.
///
/// The list must name every block of the document exactly once.
pub fn check_reorder(current: &[Block], ordered_ids: &[Uuid]) -> AppResult<()> {
    let mut errors = Vec::new();

    if ordered_ids.len() != current.len() {
        errors.push(format!(
            "reorder must list all {} blocks, got {}",
            current.len(),
            ordered_ids.len()
        ));
    }

    let known: HashSet<Uuid> = current.iter().map(|b| b.id).collect();
    let mut seen = HashSet::with_capacity(ordered_ids.len());
    for id in ordered_ids {
        if !known.contains(id) {
            errors.push(format!("block {id} does not belong to this document"));
        }
        if !seen.insert(*id) {
            errors.push(format!("block {id} listed more than once"));
        }
    }

    for id in known.difference(&seen) {
        errors.push(format!("block {id} missing from reorder"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Apply a patch to a block in place. The block type is immutable.
pub fn apply_patch(block: &mut Block, patch: BlockPatch, now: i64) -> AppResult<()> {
    if let Some(content) = patch.content {
        if content.block_type() != block.block_type() {
            return Err(AppError::validation(format!(
                "block type cannot change from {} to {}",
                block.block_type(),
                content.block_type()
            )));
        }
        block.content = content;
    }
    if let Some(status) = patch.status {
        block.status = status;
    }
    block.changed = now;
    Ok(())
}

/// Sort blocks into display order: `order` ascending, ties by list position.
pub fn sort_blocks(blocks: &mut [Block]) {
    // Stable sort keeps the original position for equal orders
    blocks.sort_by_key(|b| b.order);
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
