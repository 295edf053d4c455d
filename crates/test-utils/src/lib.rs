//! Passport test utilities.
//!
//! Fixtures for integration testing: grants files, request bodies and
//! assertion helpers. Nothing here depends on the kernel itself, so the
//! fixtures describe the wire format a client would send.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// Capabilities that unlock every block type and styling.
pub const ALL_CAPABILITIES: &[&str] = &[
    "cms_access",
    "cms_styling",
    "block_storytelling",
    "block_quick_poll",
    "block_image_text",
];

/// Builder for a TOML grants file.
#[derive(Debug, Clone, Default)]
pub struct TestGrants {
    users: Vec<TestUser>,
    organizations: Vec<(Uuid, Vec<String>)>,
}

/// A user entry with a plain-text token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub token: String,
    pub edit: Vec<Uuid>,
    pub view: Vec<Uuid>,
}

impl TestUser {
    /// Authorization header value for this user.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl TestGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user who may edit every document of `organization`.
    pub fn editor(mut self, token: &str, organization: Uuid) -> Self {
        self.users.push(TestUser {
            id: Uuid::now_v7(),
            token: token.to_string(),
            edit: vec![organization],
            view: Vec::new(),
        });
        self
    }

    /// Add a user who may only view documents of `organization`.
    pub fn viewer(mut self, token: &str, organization: Uuid) -> Self {
        self.users.push(TestUser {
            id: Uuid::now_v7(),
            token: token.to_string(),
            edit: Vec::new(),
            view: vec![organization],
        });
        self
    }

    /// Grant capabilities to an organization.
    pub fn organization(mut self, id: Uuid, capabilities: &[&str]) -> Self {
        self.organizations
            .push((id, capabilities.iter().map(|c| c.to_string()).collect()));
        self
    }

    /// Look up a user by token.
    pub fn user(&self, token: &str) -> Option<&TestUser> {
        self.users.iter().find(|u| u.token == token)
    }

    /// Render the grants as TOML.
    pub fn to_toml(&self) -> String {
        let list = |ids: &[Uuid]| {
            ids.iter()
                .map(|id| format!("\"{id}\""))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut out = String::new();
        for user in &self.users {
            out.push_str(&format!(
                "[[users]]\nid = \"{}\"\ntoken = \"{}\"\nedit = [{}]\nview = [{}]\n\n",
                user.id,
                user.token,
                list(&user.edit),
                list(&user.view)
            ));
        }
        for (id, capabilities) in &self.organizations {
            let caps = capabilities
                .iter()
                .map(|c| format!("\"{c}\""))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(
                "[[organizations]]\nid = \"{id}\"\ncapabilities = [{caps}]\n\n"
            ));
        }
        out
    }
}

/// Body for creating a document.
pub fn document_request(organization: Uuid, name: &str) -> JsonValue {
    json!({
        "organizationId": organization,
        "name": name,
        "category": "TEXTILE",
    })
}

/// Body for creating a text block with explicit content.
pub fn text_block(heading: &str, text: &str) -> JsonValue {
    json!({
        "type": "text",
        "content": { "heading": heading, "text": text },
    })
}

/// Body for creating a single-image block.
pub fn image_block(url: &str, alt: &str) -> JsonValue {
    json!({
        "type": "image",
        "content": { "url": url, "alt": alt },
    })
}

/// Body for a status-only block update.
pub fn status_update(status: &str) -> JsonValue {
    json!({ "status": status })
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string NOT to contain '{needle}'\nActual: {haystack}"
        );
    }
}
