//! File-backed sessions, access rights and capabilities.
//!
//! The grants file is TOML:
//!
//! ```toml
//! [[users]]
//! id = "0190a1c2-0000-7000-8000-000000000001"
//! token_sha256 = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! edit = ["0190a1c2-0000-7000-8000-0000000000aa"]
//! view = []
//!
//! [[organizations]]
//! id = "0190a1c2-0000-7000-8000-0000000000aa"
//! capabilities = ["cms_access", "cms_styling", "block_storytelling"]
//! ```
//!
//! `token = "..."` may be given instead of `token_sha256` for local setups.
//! Tokens are only kept as SHA-256 digests in memory.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::content::block_types::Capabilities;
use crate::error::AppResult;
use crate::services::access::{AccessResolver, DocumentAccess};
use crate::services::capability::CapabilityResolver;
use crate::services::session::{SessionResolver, UserContext};

#[derive(Debug, Default, Deserialize)]
struct GrantsFile {
    #[serde(default)]
    users: Vec<UserEntry>,
    #[serde(default)]
    organizations: Vec<OrganizationEntry>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    id: Uuid,
    token: Option<String>,
    token_sha256: Option<String>,
    #[serde(default)]
    edit: Vec<Uuid>,
    #[serde(default)]
    view: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct OrganizationEntry {
    id: Uuid,
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Clone)]
struct UserGrant {
    edit: Vec<Uuid>,
    view: Vec<Uuid>,
}

/// SHA-256 hash a token for lookup.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Static grants loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticGrants {
    tokens: HashMap<String, Uuid>,
    users: HashMap<Uuid, UserGrant>,
    organizations: HashMap<Uuid, Capabilities>,
}

impl StaticGrants {
    /// No users, no organizations.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        let file: GrantsFile = toml::from_str(source).context("invalid grants file")?;
        let mut grants = Self::default();

        for user in file.users {
            let digest = match (user.token, user.token_sha256) {
                (_, Some(digest)) => digest.to_ascii_lowercase(),
                (Some(token), None) => hash_token(&token),
                (None, None) => bail!("user {} has no token", user.id),
            };
            if grants.tokens.insert(digest, user.id).is_some() {
                bail!("duplicate token for user {}", user.id);
            }
            grants.users.insert(
                user.id,
                UserGrant {
                    edit: user.edit,
                    view: user.view,
                },
            );
        }

        for org in file.organizations {
            grants
                .organizations
                .insert(org.id, Capabilities::new(org.capabilities));
        }

        Ok(grants)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read grants file {}", path.display()))?;
        let grants = Self::from_toml(&source)?;
        info!(
            path = %path.display(),
            users = grants.users.len(),
            organizations = grants.organizations.len(),
            "grants loaded"
        );
        Ok(grants)
    }
}

#[async_trait]
impl SessionResolver for StaticGrants {
    async fn resolve(&self, token: &str) -> AppResult<Option<UserContext>> {
        Ok(self
            .tokens
            .get(&hash_token(token))
            .map(|id| UserContext::authenticated(*id)))
    }
}

#[async_trait]
impl AccessResolver for StaticGrants {
    async fn organization_access(
        &self,
        user: &UserContext,
        org: Uuid,
    ) -> AppResult<DocumentAccess> {
        if !user.authenticated {
            return Ok(DocumentAccess::None);
        }
        let Some(grant) = self.users.get(&user.id) else {
            return Ok(DocumentAccess::None);
        };
        Ok(if grant.edit.contains(&org) {
            DocumentAccess::Edit
        } else if grant.view.contains(&org) {
            DocumentAccess::View
        } else {
            DocumentAccess::None
        })
    }
}

#[async_trait]
impl CapabilityResolver for StaticGrants {
    async fn capabilities(&self, organization_id: Uuid) -> AppResult<Capabilities> {
        Ok(self
            .organizations
            .get(&organization_id)
            .cloned()
            .unwrap_or_default())
    }
}
