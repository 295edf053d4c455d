//! Scannable-code references for published versions.

use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Produce the reference a printed code should carry for a version.
    async fn generate(&self, public_url: &str, document_id: Uuid, version: i32)
    -> AppResult<String>;
}

/// Encodes the public URL itself, tagged so scans can be told apart from
/// direct visits. Rendering the code image is left to the client.
#[derive(Debug, Clone, Default)]
pub struct LinkCodeGenerator;

#[async_trait]
impl CodeGenerator for LinkCodeGenerator {
    async fn generate(
        &self,
        public_url: &str,
        _document_id: Uuid,
        _version: i32,
    ) -> AppResult<String> {
        let mut url = Url::parse(public_url)
            .map_err(|e| AppError::validation(format!("invalid public URL '{public_url}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::validation(format!(
                "public URL '{public_url}' is not http(s)"
            )));
        }
        url.query_pairs_mut().append_pair("src", "code");
        Ok(url.into())
    }
}
