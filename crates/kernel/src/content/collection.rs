//! Ordered block list for one editing session.
//!
//! `BlockCollection` is the only writer of the list: adds, deletes,
//! reorders and status changes go through it, and canonical blocks
//! returned by saves are merged back with `reconcile`.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::content::block_types::{BlockTypeDefinition, BlockTypeRegistry, Capabilities};
use crate::error::{AppError, AppResult};
use crate::models::{Block, BlockPatch, BlockStatus, BlockType};
use crate::store::{BlockStore, sort_blocks};

/// A delete awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a delete only happens once confirmed"]
pub struct PendingDelete {
    block_id: Uuid,
}

impl PendingDelete {
    pub fn block_id(&self) -> Uuid {
        self.block_id
    }
}

pub struct BlockCollection {
    store: Arc<dyn BlockStore>,
    registry: Arc<BlockTypeRegistry>,
    capabilities: Capabilities,
    document_id: Uuid,
    blocks: Vec<Block>,
    selected: Option<Uuid>,
}

impl BlockCollection {
    pub fn new(
        store: Arc<dyn BlockStore>,
        registry: Arc<BlockTypeRegistry>,
        capabilities: Capabilities,
        document_id: Uuid,
    ) -> Self {
        Self {
            store,
            registry,
            capabilities,
            document_id,
            blocks: Vec::new(),
            selected: None,
        }
    }

    /// Fetch the list from the store.
    pub async fn load(&mut self) -> AppResult<&[Block]> {
        self.reload().await?;
        Ok(&self.blocks)
    }

    /// Replace the list with the store's; drops a selection that no longer exists.
    pub async fn reload(&mut self) -> AppResult<()> {
        let mut blocks = self.store.list(self.document_id).await?;
        sort_blocks(&mut blocks);
        self.blocks = blocks;
        if let Some(id) = self.selected
            && !self.contains(id)
        {
            self.selected = None;
        }
        debug!(document_id = %self.document_id, count = self.blocks.len(), "block list loaded");
        Ok(())
    }

    /// Blocks in display order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    fn contains(&self, id: Uuid) -> bool {
        self.blocks.iter().any(|b| b.id == id)
    }

    fn require(&self, id: Uuid) -> AppResult<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(AppError::not_found(format!("block {id}")))
        }
    }

    pub fn select(&mut self, id: Uuid) -> AppResult<()> {
        self.require(id)?;
        self.selected = Some(id);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&Block> {
        let id = self.selected?;
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Types offered in the block picker.
    pub fn available_types(&self) -> Vec<&BlockTypeDefinition> {
        self.registry.list_available(&self.capabilities)
    }

    /// Create a block at the end of the list and select it.
    pub async fn add(
        &mut self,
        block_type: BlockType,
        template_id: Option<&str>,
    ) -> AppResult<&Block> {
        self.registry.ensure_available(block_type, &self.capabilities)?;
        let content = self.registry.initial_content(block_type, template_id)?;

        let block = self.store.create(self.document_id, content).await?;
        let id = block.id;
        self.blocks.push(block);
        sort_blocks(&mut self.blocks);
        self.selected = Some(id);

        self.blocks
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::not_found(format!("block {id}")))
    }

    /// First step of a delete. Nothing changes until `confirm_delete`.
    pub fn request_delete(&self, id: Uuid) -> AppResult<PendingDelete> {
        self.require(id)?;
        Ok(PendingDelete { block_id: id })
    }

    /// Delete in the store, then from the list.
    ///
    /// The selection is cleared only if it was the deleted block.
    pub async fn confirm_delete(&mut self, pending: PendingDelete) -> AppResult<()> {
        let id = pending.block_id;
        match self.store.delete(self.document_id, id).await {
            Ok(()) => {
                self.blocks.retain(|b| b.id != id);
                if self.selected == Some(id) {
                    self.selected = None;
                }
                Ok(())
            }
            Err(e @ AppError::NotFound(_)) => {
                self.reload_after(&e).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Move the block at `from` to `to` and persist the full order.
    ///
    /// Applied optimistically; on failure the previous order is restored, and
    /// a stale list (`NotFound` or a rejected id set) is reloaded.
    pub async fn reorder(&mut self, from: usize, to: usize) -> AppResult<()> {
        let len = self.blocks.len();
        if from >= len || to >= len {
            return Err(AppError::validation(format!(
                "cannot move block {from} to {to} in a list of {len}"
            )));
        }
        if from == to {
            return Ok(());
        }

        let previous = self.blocks.clone();
        let moved = self.blocks.remove(from);
        self.blocks.insert(to, moved);
        for (position, block) in self.blocks.iter_mut().enumerate() {
            block.order = i32::try_from(position).unwrap_or(i32::MAX);
        }
        let ids: Vec<Uuid> = self.blocks.iter().map(|b| b.id).collect();

        match self.store.reorder(self.document_id, &ids).await {
            Ok(mut canonical) => {
                sort_blocks(&mut canonical);
                self.blocks = canonical;
                Ok(())
            }
            Err(e) => {
                self.blocks = previous;
                if matches!(e, AppError::NotFound(_) | AppError::Validation(_)) {
                    self.reload_after(&e).await;
                }
                Err(e)
            }
        }
    }

    /// Toggle a block between draft and published. Both stay editable.
    pub async fn set_status(&mut self, id: Uuid, status: BlockStatus) -> AppResult<&Block> {
        self.require(id)?;
        match self
            .store
            .update(self.document_id, id, BlockPatch::status(status))
            .await
        {
            Ok(block) => {
                self.reconcile(block);
                self.blocks
                    .iter()
                    .find(|b| b.id == id)
                    .ok_or_else(|| AppError::not_found(format!("block {id}")))
            }
            Err(e @ AppError::NotFound(_)) => {
                self.reload_after(&e).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Merge a canonical block returned by the store. Returns whether it was
    /// part of the list.
    pub fn reconcile(&mut self, block: Block) -> bool {
        let Some(slot) = self.blocks.iter_mut().find(|b| b.id == block.id) else {
            return false;
        };
        *slot = block;
        sort_blocks(&mut self.blocks);
        true
    }

    async fn reload_after(&mut self, cause: &AppError) {
        debug!(document_id = %self.document_id, cause = %cause, "reloading stale block list");
        if let Err(e) = self.reload().await {
            warn!(document_id = %self.document_id, error = %e, "block list reload failed");
        }
    }
}
