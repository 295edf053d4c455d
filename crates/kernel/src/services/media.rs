//! Media upload: bytes in, stable public URL out.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Default upload size limit (10 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// MIME types accepted for block media.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "video/mp4",
    "video/webm",
];

/// A stored upload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMedia {
    pub url: String,
    pub mime_type: String,
    pub size: usize,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store an upload for a document and return its public URL.
    async fn upload(&self, document_id: Uuid, filename: &str, data: &[u8])
    -> AppResult<StoredMedia>;
}

/// Sanitize a filename to prevent directory traversal and other issues.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .take(200)
        .collect()
}

/// Detect the MIME type from content, falling back to the extension for SVG.
fn detect_mime(filename: &str, data: &[u8]) -> Option<String> {
    if let Some(kind) = infer::get(data) {
        return Some(kind.mime_type().to_string());
    }
    let is_svg = Path::new(filename)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));
    let looks_like_svg = std::str::from_utf8(data).is_ok_and(|s| s.contains("<svg"));
    (is_svg && looks_like_svg).then(|| "image/svg+xml".to_string())
}

/// Media stored on the local filesystem and served from `base_url`.
pub struct LocalMediaStore {
    base_path: PathBuf,
    base_url: String,
    max_bytes: usize,
}

impl LocalMediaStore {
    pub fn new(
        base_path: impl Into<PathBuf>,
        base_url: impl Into<String>,
        max_bytes: usize,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
            max_bytes,
        }
    }

    /// Relative path for a new upload: `{document}/{YYYY}/{MM}/{8hex}_{name}`.
    fn relative_path(document_id: Uuid, filename: &str) -> String {
        let now = chrono::Utc::now();
        let unique_id = Uuid::now_v7().simple().to_string();
        format!(
            "{}/{}/{}/{}_{}",
            document_id.simple(),
            now.format("%Y"),
            now.format("%m"),
            &unique_id[24..],
            sanitize_filename(filename)
        )
    }

    /// Resolve a relative path under the base directory.
    ///
    /// Rejects `..` components to prevent directory traversal.
    fn resolve(&self, relative: &str) -> anyhow::Result<PathBuf> {
        for component in Path::new(relative).components() {
            if !matches!(component, Component::Normal(_)) {
                bail!("invalid component in media path");
            }
        }
        Ok(self.base_path.join(relative))
    }

    async fn write(&self, relative: &str, data: &[u8]) -> anyhow::Result<()> {
        let path = self.resolve(relative)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create directories")?;
        }

        let mut file = fs::File::create(&path)
            .await
            .context("failed to create file")?;
        file.write_all(data).await.context("failed to write file")?;
        file.flush().await.context("failed to flush file")?;

        debug!(path = ?path, size = data.len(), "media written");
        Ok(())
    }

    fn public_url(&self, relative: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), relative)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(
        &self,
        document_id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> AppResult<StoredMedia> {
        if data.is_empty() {
            return Err(AppError::validation("upload is empty"));
        }
        if data.len() > self.max_bytes {
            return Err(AppError::validation(format!(
                "file too large: {} bytes (max {})",
                data.len(),
                self.max_bytes
            )));
        }

        let mime_type = detect_mime(filename, data)
            .filter(|m| ALLOWED_MIME_TYPES.contains(&m.as_str()))
            .ok_or_else(|| AppError::validation("file type not allowed"))?;

        let relative = Self::relative_path(document_id, filename);
        self.write(&relative, data).await?;

        let url = self.public_url(&relative);
        info!(document_id = %document_id, url = %url, mime = %mime_type, "media uploaded");
        Ok(StoredMedia {
            url,
            mime_type,
            size: data.len(),
        })
    }
}

impl std::fmt::Debug for LocalMediaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMediaStore")
            .field("base_path", &self.base_path)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    fn temp_store(max: usize) -> (LocalMediaStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("passport-media-{}", Uuid::now_v7().simple()));
        (LocalMediaStore::new(&dir, "/files", max), dir)
    }

    #[test]
    fn sanitize_strips_paths_and_symbols() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my photo (1).png"), "my_photo__1_.png");
    }

    #[test]
    fn resolve_rejects_traversal() {
        let (store, _) = temp_store(DEFAULT_MAX_UPLOAD_BYTES);
        assert!(store.resolve("a/../../b").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("a/b.png").is_ok());
    }

    #[tokio::test]
    async fn upload_writes_file_and_returns_url() {
        let (store, dir) = temp_store(DEFAULT_MAX_UPLOAD_BYTES);
        let doc = Uuid::now_v7();
        let stored = store.upload(doc, "logo.png", PNG).await.unwrap();

        assert_eq!(stored.mime_type, "image/png");
        assert!(stored.url.starts_with(&format!("/files/{}/", doc.simple())));
        assert!(stored.url.ends_with("_logo.png"));

        let relative = stored.url.strip_prefix("/files/").unwrap();
        assert_eq!(std::fs::read(dir.join(relative)).unwrap(), PNG);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn upload_rejects_unknown_type_and_size() {
        let (store, _) = temp_store(8);
        let err = store
            .upload(Uuid::now_v7(), "notes.txt", b"hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = store
            .upload(Uuid::now_v7(), "logo.png", PNG)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
