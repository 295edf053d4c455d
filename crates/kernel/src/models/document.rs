//! Passport document model and CRUD operations.
//!
//! A document carries the structured compliance fields plus an optional
//! styling config. Its blocks live in `dpp_block`; its published snapshots
//! in `dpp_version`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::styling::StylingConfig;

/// Default product category.
pub const DEFAULT_CATEGORY: &str = "OTHER";

/// Document lifecycle. Flips to `Published` with the first version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Published,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(DocumentStatus::Draft),
            "published" => Some(DocumentStatus::Published),
            _ => None,
        }
    }
}

/// Compliance attributes of a product passport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComplianceFields {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gtin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_of_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub care_instructions: Option<String>,
    pub is_repairable: bool,
    pub spare_parts_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifespan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conformity_declaration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposal_info: Option<String>,
    pub takeback_offered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub takeback_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_life_info: Option<String>,
}

impl Default for ComplianceFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            category: DEFAULT_CATEGORY.to_string(),
            sku: None,
            gtin: None,
            brand: None,
            country_of_origin: None,
            materials: None,
            material_source: None,
            care_instructions: None,
            is_repairable: false,
            spare_parts_available: false,
            lifespan: None,
            conformity_declaration: None,
            disposal_info: None,
            takeback_offered: false,
            takeback_contact: None,
            second_life_info: None,
        }
    }
}

impl ComplianceFields {
    /// Fields with only a product name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Passport document record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Owning organization.
    pub organization_id: Uuid,

    pub status: DocumentStatus,

    pub fields: ComplianceFields,

    /// Stored (partial) styling; at most one per document.
    pub styling: Option<StylingConfig>,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    organization_id: Uuid,
    status: String,
    fields: serde_json::Value,
    styling: Option<serde_json::Value>,
    created: i64,
    changed: i64,
}

impl TryFrom<DocumentRow> for Document {
    type Error = anyhow::Error;

    fn try_from(row: DocumentRow) -> Result<Self> {
        let status = DocumentStatus::parse(&row.status)
            .with_context(|| format!("unknown document status '{}'", row.status))?;
        let fields = serde_json::from_value(row.fields)
            .with_context(|| format!("malformed fields for document {}", row.id))?;
        let styling = row
            .styling
            .map(serde_json::from_value)
            .transpose()
            .with_context(|| format!("malformed styling for document {}", row.id))?;

        Ok(Document {
            id: row.id,
            organization_id: row.organization_id,
            status,
            fields,
            styling,
            created: row.created,
            changed: row.changed,
        })
    }
}

const DOCUMENT_COLUMNS: &str = "id, organization_id, status, fields, styling, created, changed";

impl Document {
    pub fn is_published(&self) -> bool {
        self.status == DocumentStatus::Published
    }

    /// Find a document by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM dpp_document WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch document by id")?;

        row.map(Document::try_from).transpose()
    }

    /// Create a new draft document.
    pub async fn create(
        pool: &PgPool,
        organization_id: Uuid,
        fields: &ComplianceFields,
    ) -> Result<Self> {
        let now = chrono::Utc::now().timestamp();
        let fields = serde_json::to_value(fields).context("failed to serialize fields")?;

        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            r#"
            INSERT INTO dpp_document (id, organization_id, status, fields, styling, created, changed)
            VALUES ($1, $2, 'draft', $3, NULL, $4, $4)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(organization_id)
        .bind(fields)
        .bind(now)
        .fetch_one(pool)
        .await
        .context("failed to insert document")?;

        Document::try_from(row)
    }

    /// Replace the compliance fields.
    pub async fn update_fields(
        pool: &PgPool,
        id: Uuid,
        fields: &ComplianceFields,
    ) -> Result<Option<Self>> {
        let now = chrono::Utc::now().timestamp();
        let fields = serde_json::to_value(fields).context("failed to serialize fields")?;

        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE dpp_document SET fields = $2, changed = $3 WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(fields)
        .bind(now)
        .fetch_optional(pool)
        .await
        .context("failed to update document fields")?;

        row.map(Document::try_from).transpose()
    }

    /// Replace the stored styling config.
    pub async fn update_styling(
        pool: &PgPool,
        id: Uuid,
        styling: &StylingConfig,
    ) -> Result<Option<Self>> {
        let now = chrono::Utc::now().timestamp();
        let styling = serde_json::to_value(styling).context("failed to serialize styling")?;

        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE dpp_document SET styling = $2, changed = $3 WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(styling)
        .bind(now)
        .fetch_optional(pool)
        .await
        .context("failed to update document styling")?;

        row.map(Document::try_from).transpose()
    }

    /// Mark a document published. Runs inside the version append transaction.
    pub async fn mark_published(conn: &mut PgConnection, id: Uuid, changed: i64) -> Result<()> {
        sqlx::query("UPDATE dpp_document SET status = 'published', changed = $2 WHERE id = $1")
            .bind(id)
            .bind(changed)
            .execute(conn)
            .await
            .context("failed to mark document published")?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fields_default_category() {
        let fields: ComplianceFields = serde_json::from_value(json!({"name": "Jacket"})).unwrap();
        assert_eq!(fields.category, DEFAULT_CATEGORY);
        assert_eq!(fields.name, "Jacket");
        assert!(!fields.is_repairable);
    }

    #[test]
    fn fields_use_camel_case() {
        let fields = ComplianceFields {
            country_of_origin: Some("PT".to_string()),
            takeback_offered: true,
            ..ComplianceFields::named("Jacket")
        };
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json["countryOfOrigin"], "PT");
        assert_eq!(json["takebackOffered"], true);
        assert!(json.get("sku").is_none());
    }

    #[test]
    fn row_conversion_reads_styling() {
        let row = DocumentRow {
            id: Uuid::nil(),
            organization_id: Uuid::nil(),
            status: "published".to_string(),
            fields: json!({"name": "Chair"}),
            styling: Some(json!({"colors": {"primary": "#112233"}})),
            created: 0,
            changed: 0,
        };
        let doc = Document::try_from(row).unwrap();
        assert!(doc.is_published());
        assert_eq!(
            doc.styling.unwrap().colors.primary.as_deref(),
            Some("#112233")
        );
    }
}
