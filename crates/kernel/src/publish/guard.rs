//! Pre-publish checks on the captured snapshot.

use serde_json::Value;

use crate::models::{ComplianceFields, Snapshot};

/// Rule set a snapshot must satisfy before it becomes a version.
pub trait PublishGuard: Send + Sync {
    /// Human-readable problems; empty means the snapshot may be published.
    fn check(&self, snapshot: &Snapshot) -> Vec<String>;
}

/// Requires a set of compliance fields to be present and non-empty.
///
/// Field names use the wire spelling (`countryOfOrigin`, not
/// `country_of_origin`).
#[derive(Debug, Clone)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated list, ignoring blanks.
    pub fn parse_list(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        )
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn missing(&self, fields: &ComplianceFields) -> Vec<String> {
        let Ok(Value::Object(map)) = serde_json::to_value(fields) else {
            return vec!["compliance fields could not be read".to_string()];
        };

        self.fields
            .iter()
            .filter(|name| match map.get(name.as_str()) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|name| format!("{name} is required to publish"))
            .collect()
    }
}

impl Default for RequiredFields {
    fn default() -> Self {
        Self::new(["name"])
    }
}

impl PublishGuard for RequiredFields {
    fn check(&self, snapshot: &Snapshot) -> Vec<String> {
        self.missing(&snapshot.fields)
    }
}
