//! Immutable published versions.
//!
//! Rows are append-only: there is no update or delete path. The
//! `(document_id, version)` pair is unique, so a concurrent append of the
//! same number fails instead of overwriting.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::block::Block;
use crate::models::document::ComplianceFields;
use crate::models::styling::StylingConfig;

/// Frozen copy of everything a public reader sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub fields: ComplianceFields,
    /// Published blocks only, in display order.
    pub blocks: Vec<Block>,
    pub styling: Option<StylingConfig>,
}

/// Published version record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Starts at 1, increases by one per document.
    pub version: i32,
    /// Unix timestamp.
    pub created_at: i64,
    pub created_by: Uuid,
    pub snapshot: Snapshot,
    /// Hex SHA-256 of the serialized snapshot.
    pub content_hash: String,
    pub public_url: String,
    pub scannable_code: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    document_id: Uuid,
    version: i32,
    created_at: i64,
    created_by: Uuid,
    snapshot: serde_json::Value,
    content_hash: String,
    public_url: String,
    scannable_code: Option<String>,
}

impl TryFrom<VersionRow> for Version {
    type Error = anyhow::Error;

    fn try_from(row: VersionRow) -> Result<Self> {
        let snapshot = serde_json::from_value(row.snapshot).with_context(|| {
            format!(
                "malformed snapshot for document {} version {}",
                row.document_id, row.version
            )
        })?;

        Ok(Version {
            id: row.id,
            document_id: row.document_id,
            version: row.version,
            created_at: row.created_at,
            created_by: row.created_by,
            snapshot,
            content_hash: row.content_hash,
            public_url: row.public_url,
            scannable_code: row.scannable_code,
        })
    }
}

const VERSION_COLUMNS: &str = "id, document_id, version, created_at, created_by, snapshot, \
     content_hash, public_url, scannable_code";

impl Version {
    /// Fetch one version of a document.
    pub async fn find(pool: &PgPool, document_id: Uuid, version: i32) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, VersionRow>(&format!(
            "SELECT {VERSION_COLUMNS} FROM dpp_version WHERE document_id = $1 AND version = $2"
        ))
        .bind(document_id)
        .bind(version)
        .fetch_optional(pool)
        .await
        .context("failed to fetch version")?;

        row.map(Version::try_from).transpose()
    }

    /// Highest-numbered version of a document.
    pub async fn latest(pool: &PgPool, document_id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, VersionRow>(&format!(
            "SELECT {VERSION_COLUMNS} FROM dpp_version WHERE document_id = $1 ORDER BY version DESC LIMIT 1"
        ))
        .bind(document_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch latest version")?;

        row.map(Version::try_from).transpose()
    }

    /// All versions of a document, newest first.
    pub async fn list_for_document(pool: &PgPool, document_id: Uuid) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, VersionRow>(&format!(
            "SELECT {VERSION_COLUMNS} FROM dpp_version WHERE document_id = $1 ORDER BY version DESC"
        ))
        .bind(document_id)
        .fetch_all(pool)
        .await
        .context("failed to list versions")?;

        rows.into_iter().map(Version::try_from).collect()
    }

    /// Insert a version row. Callers run this inside a transaction.
    pub async fn insert(conn: &mut PgConnection, version: &Version) -> Result<(), sqlx::Error> {
        let snapshot = serde_json::to_value(&version.snapshot)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            r#"
            INSERT INTO dpp_version (id, document_id, version, created_at, created_by, snapshot, content_hash, public_url, scannable_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(version.id)
        .bind(version.document_id)
        .bind(version.version)
        .bind(version.created_at)
        .bind(version.created_by)
        .bind(snapshot)
        .bind(&version.content_hash)
        .bind(&version.public_url)
        .bind(&version.scannable_code)
        .execute(conn)
        .await?;

        Ok(())
    }
}
