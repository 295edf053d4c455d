//! Compliance fields and styling of a passport document.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::content::block_types::CMS_STYLING;
use crate::content::theme::{self, ResolvedTheme};
use crate::error::{AppError, AppResult};
use crate::models::{ComplianceFields, Document, StylingConfig};
use crate::services::access::{self, DocumentAccess};
use crate::services::gate::DocumentGate;
use crate::services::session::UserContext;

/// Accepted product categories.
pub const CATEGORIES: &[&str] = &["TEXTILE", "FURNITURE", "OTHER"];

const NAME_MAX: usize = 200;
const SHORT_MAX: usize = 500;
const LONG_MAX: usize = 5000;

/// Check compliance fields before they are stored.
pub fn validate_fields(fields: &ComplianceFields) -> Vec<String> {
    let mut errors = Vec::new();

    if fields.name.trim().is_empty() {
        errors.push("name is required".to_string());
    }
    if fields.name.chars().count() > NAME_MAX {
        errors.push(format!("name must be at most {NAME_MAX} characters"));
    }
    if !CATEGORIES.contains(&fields.category.as_str()) {
        errors.push(format!(
            "category must be one of {}",
            CATEGORIES.join(", ")
        ));
    }
    if let Some(gtin) = &fields.gtin
        && !gtin.is_empty()
        && !(matches!(gtin.len(), 8 | 12 | 13 | 14) && gtin.bytes().all(|b| b.is_ascii_digit()))
    {
        errors.push("gtin must be 8, 12, 13 or 14 digits".to_string());
    }

    let short = [
        ("sku", &fields.sku),
        ("brand", &fields.brand),
        ("countryOfOrigin", &fields.country_of_origin),
        ("lifespan", &fields.lifespan),
        ("takebackContact", &fields.takeback_contact),
    ];
    let long = [
        ("description", &fields.description),
        ("materials", &fields.materials),
        ("materialSource", &fields.material_source),
        ("careInstructions", &fields.care_instructions),
        ("conformityDeclaration", &fields.conformity_declaration),
        ("disposalInfo", &fields.disposal_info),
        ("secondLifeInfo", &fields.second_life_info),
    ];
    for (limit, group) in [(SHORT_MAX, &short[..]), (LONG_MAX, &long[..])] {
        for (name, value) in group {
            if let Some(v) = value
                && v.chars().count() > limit
            {
                errors.push(format!("{name} must be at most {limit} characters"));
            }
        }
    }

    errors
}

/// Service for document fields and styling.
#[derive(Clone)]
pub struct DocumentService {
    inner: Arc<DocumentServiceInner>,
}

struct DocumentServiceInner {
    gate: DocumentGate,
}

impl DocumentService {
    pub fn new(gate: DocumentGate) -> Self {
        Self {
            inner: Arc::new(DocumentServiceInner { gate }),
        }
    }

    fn gate(&self) -> &DocumentGate {
        &self.inner.gate
    }

    /// Create a draft document in an organization the user may edit.
    pub async fn create(
        &self,
        user: &UserContext,
        organization_id: Uuid,
        fields: ComplianceFields,
    ) -> AppResult<Document> {
        access::require_organization(
            self.gate().access(),
            user,
            organization_id,
            DocumentAccess::Edit,
        )
        .await?;
        let errors = validate_fields(&fields);
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let document = self.gate().documents().create(organization_id, fields).await?;
        info!(document_id = %document.id, organization_id = %organization_id, "document created");
        Ok(document)
    }

    pub async fn get(&self, user: &UserContext, document_id: Uuid) -> AppResult<Document> {
        self.gate().view(user, document_id).await
    }

    /// Replace the compliance fields. Blocks are untouched.
    pub async fn update_fields(
        &self,
        user: &UserContext,
        document_id: Uuid,
        fields: ComplianceFields,
    ) -> AppResult<Document> {
        self.gate().edit(user, document_id).await?;
        let errors = validate_fields(&fields);
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let document = self
            .gate()
            .documents()
            .update_fields(document_id, fields)
            .await?;
        info!(document_id = %document_id, "document fields updated");
        Ok(document)
    }

    /// Stored styling resolved against the defaults.
    pub async fn styling(&self, user: &UserContext, document_id: Uuid) -> AppResult<ResolvedTheme> {
        let document = self.gate().view(user, document_id).await?;
        Ok(theme::resolve(document.styling.as_ref()))
    }

    /// Replace the styling config. Requires the `cms_styling` capability.
    pub async fn update_styling(
        &self,
        user: &UserContext,
        document_id: Uuid,
        styling: StylingConfig,
    ) -> AppResult<ResolvedTheme> {
        let document = self.gate().edit(user, document_id).await?;
        let granted = self.gate().capabilities_of(&document).await?;
        self.gate().require_capability(CMS_STYLING, &granted)?;

        let errors = theme::validate(&styling);
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let document = self
            .gate()
            .documents()
            .update_styling(document_id, styling)
            .await?;
        info!(document_id = %document_id, "document styling updated");
        Ok(theme::resolve(document.styling.as_ref()))
    }
}
