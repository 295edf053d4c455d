//! Content block model and CRUD operations.
//!
//! Blocks are the auxiliary, ordered content of a passport document. The
//! payload is stored as JSONB next to its type key; the `position` column
//! carries the block order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::block_content::{BlockContent, BlockType};

/// Draft/published state of a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    #[default]
    Draft,
    Published,
}

impl BlockStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockStatus::Draft => "draft",
            BlockStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(BlockStatus::Draft),
            "published" => Some(BlockStatus::Published),
            _ => None,
        }
    }
}

/// Content block record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Owning document.
    pub document_id: Uuid,

    /// Position within the document; unique per document.
    pub order: i32,

    pub status: BlockStatus,

    /// Type key and payload, serialized as `type` + `content`.
    #[serde(flatten)]
    pub content: BlockContent,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// Partial update of a block. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPatch {
    pub content: Option<BlockContent>,
    pub status: Option<BlockStatus>,
}

impl BlockPatch {
    pub fn content(content: BlockContent) -> Self {
        Self {
            content: Some(content),
            status: None,
        }
    }

    pub fn status(status: BlockStatus) -> Self {
        Self {
            content: None,
            status: Some(status),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.status.is_none()
    }
}

/// Raw database row.
#[derive(Debug, sqlx::FromRow)]
struct BlockRow {
    id: Uuid,
    document_id: Uuid,
    #[sqlx(rename = "type")]
    block_type: String,
    position: i32,
    status: String,
    content: serde_json::Value,
    created: i64,
    changed: i64,
}

impl TryFrom<BlockRow> for Block {
    type Error = anyhow::Error;

    fn try_from(row: BlockRow) -> Result<Self> {
        let block_type = BlockType::parse(&row.block_type)
            .with_context(|| format!("unknown block type '{}'", row.block_type))?;
        let status = BlockStatus::parse(&row.status)
            .with_context(|| format!("unknown block status '{}'", row.status))?;
        let content = BlockContent::from_parts(block_type, row.content)
            .with_context(|| format!("malformed content for block {}", row.id))?;

        Ok(Block {
            id: row.id,
            document_id: row.document_id,
            order: row.position,
            status,
            content,
            created: row.created,
            changed: row.changed,
        })
    }
}

const BLOCK_COLUMNS: &str = "id, document_id, type, position, status, content, created, changed";

impl Block {
    pub fn block_type(&self) -> BlockType {
        self.content.block_type()
    }

    pub fn is_published(&self) -> bool {
        self.status == BlockStatus::Published
    }

    /// List blocks of a document in display order.
    pub async fn list_for_document(pool: &PgPool, document_id: Uuid) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, BlockRow>(&format!(
            "SELECT {BLOCK_COLUMNS} FROM dpp_block WHERE document_id = $1 ORDER BY position, created"
        ))
        .bind(document_id)
        .fetch_all(pool)
        .await
        .context("failed to list blocks")?;

        rows.into_iter().map(Block::try_from).collect()
    }

    /// Find a block by ID within a document.
    pub async fn find(pool: &PgPool, document_id: Uuid, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, BlockRow>(&format!(
            "SELECT {BLOCK_COLUMNS} FROM dpp_block WHERE document_id = $1 AND id = $2"
        ))
        .bind(document_id)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch block")?;

        row.map(Block::try_from).transpose()
    }

    /// List and lock all blocks of a document inside a transaction.
    pub async fn list_for_update(conn: &mut PgConnection, document_id: Uuid) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, BlockRow>(&format!(
            "SELECT {BLOCK_COLUMNS} FROM dpp_block WHERE document_id = $1 ORDER BY position, created FOR UPDATE"
        ))
        .bind(document_id)
        .fetch_all(conn)
        .await
        .context("failed to lock blocks")?;

        rows.into_iter().map(Block::try_from).collect()
    }

    /// Lock a block row for update inside a transaction.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        document_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, BlockRow>(&format!(
            "SELECT {BLOCK_COLUMNS} FROM dpp_block WHERE document_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(document_id)
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("failed to lock block")?;

        row.map(Block::try_from).transpose()
    }

    /// Insert a new draft block at the end of the document.
    pub async fn create(pool: &PgPool, document_id: Uuid, content: &BlockContent) -> Result<Self> {
        let now = chrono::Utc::now().timestamp();
        let id = Uuid::now_v7();
        let payload = content
            .content_json()
            .context("failed to serialize block content")?;

        let row = sqlx::query_as::<_, BlockRow>(&format!(
            r#"
            INSERT INTO dpp_block (id, document_id, type, position, status, content, created, changed)
            SELECT $1, $2, $3, COALESCE(MAX(position) + 1, 0), 'draft', $4, $5, $5
            FROM dpp_block WHERE document_id = $2
            RETURNING {BLOCK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(document_id)
        .bind(content.block_type().as_str())
        .bind(payload)
        .bind(now)
        .fetch_one(pool)
        .await
        .context("failed to insert block")?;

        Block::try_from(row)
    }

    /// Persist content and status of an existing block, returning the stored row.
    pub async fn save(conn: &mut PgConnection, block: &Block) -> Result<Self> {
        let payload = block
            .content
            .content_json()
            .context("failed to serialize block content")?;

        let row = sqlx::query_as::<_, BlockRow>(&format!(
            r#"
            UPDATE dpp_block SET content = $3, status = $4, changed = $5
            WHERE document_id = $1 AND id = $2
            RETURNING {BLOCK_COLUMNS}
            "#
        ))
        .bind(block.document_id)
        .bind(block.id)
        .bind(payload)
        .bind(block.status.as_str())
        .bind(block.changed)
        .fetch_one(conn)
        .await
        .context("failed to update block")?;

        Block::try_from(row)
    }

    /// Set the position of one block.
    pub async fn set_position(
        conn: &mut PgConnection,
        document_id: Uuid,
        id: Uuid,
        position: i32,
        changed: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE dpp_block SET position = $3, changed = $4 WHERE document_id = $1 AND id = $2",
        )
        .bind(document_id)
        .bind(id)
        .bind(position)
        .bind(changed)
        .execute(conn)
        .await
        .context("failed to update block position")?;

        Ok(())
    }

    /// Delete a block. Returns true if a row was removed.
    pub async fn delete(pool: &PgPool, document_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dpp_block WHERE document_id = $1 AND id = $2")
            .bind(document_id)
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete block")?;

        Ok(result.rows_affected() > 0)
    }
}
