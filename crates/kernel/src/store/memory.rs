//! In-process store used by tests and embedders.
//!
//! All state sits behind a single `parking_lot::RwLock`, so every operation
//! (including reorder and version append) is atomic with respect to others.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{BlockStore, DocumentStore, VersionStore, apply_patch, check_reorder, now, sort_blocks};
use crate::error::{AppError, AppResult};
use crate::models::{
    Block, BlockContent, BlockPatch, BlockStatus, ComplianceFields, Document, DocumentStatus,
    StylingConfig, Version,
};

#[derive(Default)]
struct MemoryState {
    documents: HashMap<Uuid, Document>,
    blocks: HashMap<Uuid, Vec<Block>>,
    versions: HashMap<Uuid, Vec<Version>>,
}

/// Block, document and version store held in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document as-is.
    pub fn insert_document(&self, document: Document) {
        self.inner.write().documents.insert(document.id, document);
    }
}

fn sorted(blocks: &[Block]) -> Vec<Block> {
    let mut out = blocks.to_vec();
    sort_blocks(&mut out);
    out
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn list(&self, document_id: Uuid) -> AppResult<Vec<Block>> {
        let state = self.inner.read();
        Ok(state
            .blocks
            .get(&document_id)
            .map(|b| sorted(b))
            .unwrap_or_default())
    }

    async fn get(&self, document_id: Uuid, block_id: Uuid) -> AppResult<Block> {
        let state = self.inner.read();
        state
            .blocks
            .get(&document_id)
            .and_then(|blocks| blocks.iter().find(|b| b.id == block_id))
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("block {block_id}")))
    }

    async fn create(&self, document_id: Uuid, content: BlockContent) -> AppResult<Block> {
        let mut state = self.inner.write();
        let blocks = state.blocks.entry(document_id).or_default();
        let order = blocks.iter().map(|b| b.order + 1).max().unwrap_or(0);
        let ts = now();
        let block = Block {
            id: Uuid::now_v7(),
            document_id,
            order,
            status: BlockStatus::Draft,
            content,
            created: ts,
            changed: ts,
        };
        blocks.push(block.clone());
        Ok(block)
    }

    async fn update(
        &self,
        document_id: Uuid,
        block_id: Uuid,
        patch: BlockPatch,
    ) -> AppResult<Block> {
        let mut state = self.inner.write();
        let block = state
            .blocks
            .get_mut(&document_id)
            .and_then(|blocks| blocks.iter_mut().find(|b| b.id == block_id))
            .ok_or_else(|| AppError::not_found(format!("block {block_id}")))?;

        // Patch a copy so a rejected patch leaves the stored block untouched
        let mut updated = block.clone();
        apply_patch(&mut updated, patch, now())?;
        *block = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, document_id: Uuid, block_id: Uuid) -> AppResult<()> {
        let mut state = self.inner.write();
        let blocks = state
            .blocks
            .get_mut(&document_id)
            .ok_or_else(|| AppError::not_found(format!("block {block_id}")))?;
        let before = blocks.len();
        blocks.retain(|b| b.id != block_id);
        if blocks.len() == before {
            return Err(AppError::not_found(format!("block {block_id}")));
        }
        Ok(())
    }

    async fn reorder(&self, document_id: Uuid, ordered_ids: &[Uuid]) -> AppResult<Vec<Block>> {
        let mut state = self.inner.write();
        let blocks = state.blocks.entry(document_id).or_default();
        check_reorder(blocks, ordered_ids)?;

        let ts = now();
        for (position, id) in ordered_ids.iter().enumerate() {
            if let Some(block) = blocks.iter_mut().find(|b| b.id == *id) {
                block.order = i32::try_from(position)
                    .map_err(|_| AppError::validation("too many blocks to reorder"))?;
                block.changed = ts;
            }
        }
        Ok(sorted(blocks))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(
        &self,
        organization_id: Uuid,
        fields: ComplianceFields,
    ) -> AppResult<Document> {
        let ts = now();
        let document = Document {
            id: Uuid::now_v7(),
            organization_id,
            status: DocumentStatus::Draft,
            fields,
            styling: None,
            created: ts,
            changed: ts,
        };
        self.insert_document(document.clone());
        Ok(document)
    }

    async fn get(&self, id: Uuid) -> AppResult<Document> {
        self.inner
            .read()
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("document {id}")))
    }

    async fn update_fields(&self, id: Uuid, fields: ComplianceFields) -> AppResult<Document> {
        let mut state = self.inner.write();
        let document = state
            .documents
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("document {id}")))?;
        document.fields = fields;
        document.changed = now();
        Ok(document.clone())
    }

    async fn update_styling(&self, id: Uuid, styling: StylingConfig) -> AppResult<Document> {
        let mut state = self.inner.write();
        let document = state
            .documents
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("document {id}")))?;
        document.styling = Some(styling);
        document.changed = now();
        Ok(document.clone())
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn latest(&self, document_id: Uuid) -> AppResult<Option<Version>> {
        Ok(self
            .inner
            .read()
            .versions
            .get(&document_id)
            .and_then(|v| v.iter().max_by_key(|v| v.version))
            .cloned())
    }

    async fn list(&self, document_id: Uuid) -> AppResult<Vec<Version>> {
        let mut versions = self
            .inner
            .read()
            .versions
            .get(&document_id)
            .cloned()
            .unwrap_or_default();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    async fn find(&self, document_id: Uuid, version: i32) -> AppResult<Version> {
        self.inner
            .read()
            .versions
            .get(&document_id)
            .and_then(|v| v.iter().find(|v| v.version == version))
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("version {version} of {document_id}")))
    }

    async fn append(&self, version: Version) -> AppResult<Version> {
        let mut state = self.inner.write();
        let MemoryState {
            documents,
            versions,
            ..
        } = &mut *state;

        let document = documents
            .get_mut(&version.document_id)
            .ok_or_else(|| AppError::not_found(format!("document {}", version.document_id)))?;

        let history = versions.entry(version.document_id).or_default();
        let current = history.iter().map(|v| v.version).max().unwrap_or(0);
        if version.version != current + 1 {
            return Err(AppError::Conflict(format!(
                "version {} of {} already exists or is out of sequence",
                version.version, version.document_id
            )));
        }

        history.push(version.clone());
        document.status = DocumentStatus::Published;
        document.changed = version.created_at;
        Ok(version)
    }
}
