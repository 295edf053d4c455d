//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::content::autosave::AutoSaveSettings;
use crate::services::media::DEFAULT_MAX_UPLOAD_BYTES;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Public site URL; prefix of every version's public address.
    pub site_url: String,

    /// Path to uploads directory (default: ./uploads).
    pub uploads_dir: PathBuf,

    /// Base URL for serving uploaded files (default: /files).
    pub files_url: String,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// TOML file with tokens, access and capability grants.
    pub grants_file: Option<PathBuf>,

    /// Treat an organization with no capabilities as fully entitled
    /// (default: true).
    pub capabilities_fail_open: bool,

    /// Editor auto-save timing handed to clients.
    pub autosave: AutoSaveSettings,

    /// Upload size limit in bytes (default: 10 MB).
    pub max_upload_bytes: usize,

    /// Compliance fields that must be set before publishing (default: name).
    pub publish_required_fields: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let site_url = env::var("SITE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let files_url = env::var("FILES_URL").unwrap_or_else(|_| "/files".to_string());

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let grants_file = env::var("GRANTS_FILE").ok().map(PathBuf::from);

        let capabilities_fail_open = env::var("CAPABILITIES_FAIL_OPEN")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .context("CAPABILITIES_FAIL_OPEN must be true or false")?;

        let defaults = AutoSaveSettings::default();
        let debounce_ms: u64 = env::var("AUTOSAVE_DEBOUNCE_MS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("AUTOSAVE_DEBOUNCE_MS must be a number of milliseconds")?
            .unwrap_or(defaults.debounce.as_millis() as u64);
        let typing_window_ms: u64 = env::var("AUTOSAVE_TYPING_WINDOW_MS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("AUTOSAVE_TYPING_WINDOW_MS must be a number of milliseconds")?
            .unwrap_or(defaults.typing_window.as_millis() as u64);
        let autosave = AutoSaveSettings {
            debounce: Duration::from_millis(debounce_ms),
            typing_window: Duration::from_millis(typing_window_ms),
        };

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_BYTES.to_string())
            .parse()
            .context("MAX_UPLOAD_BYTES must be a valid usize")?;

        let publish_required_fields = env::var("PUBLISH_REQUIRED_FIELDS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec!["name".to_string()]);

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            site_url,
            uploads_dir,
            files_url,
            cors_allowed_origins,
            grants_file,
            capabilities_fail_open,
            autosave,
            max_upload_bytes,
            publish_required_fields,
        })
    }
}
