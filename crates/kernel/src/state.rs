//! Application state shared across all handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::warn;

use crate::config::Config;
use crate::content::autosave::AutoSaveSettings;
use crate::content::block_service::BlockService;
use crate::content::block_types::BlockTypeRegistry;
use crate::content::document_service::DocumentService;
use crate::db;
use crate::publish::{PublishGuard, PublishService, RequiredFields, VersionCache};
use crate::services::{
    AccessResolver, CapabilityResolver, CodeGenerator, DocumentGate, LinkCodeGenerator,
    LocalMediaStore, MediaStore, SessionResolver, StaticGrants,
};
use crate::store::{BlockStore, DocumentStore, PgStore, VersionStore};

/// Collaborators the state is assembled from.
///
/// `AppState::new` builds one from the environment; tests build one over
/// `MemoryStore` and pass it to `AppState::from_backends`.
pub struct Backends {
    pub blocks: Arc<dyn BlockStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub versions: Arc<dyn VersionStore>,
    pub sessions: Arc<dyn SessionResolver>,
    pub access: Arc<dyn AccessResolver>,
    pub capabilities: Arc<dyn CapabilityResolver>,
    pub media: Arc<dyn MediaStore>,
    pub codes: Arc<dyn CodeGenerator>,
    pub guard: Arc<dyn PublishGuard>,
    pub site_url: String,
    pub capabilities_fail_open: bool,
    pub autosave: AutoSaveSettings,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
}

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL pool; absent when running over in-process stores.
    db: Option<PgPool>,

    sessions: Arc<dyn SessionResolver>,

    media: Arc<dyn MediaStore>,

    registry: Arc<BlockTypeRegistry>,

    blocks: BlockService,

    documents: DocumentService,

    publish: PublishService,

    autosave: AutoSaveSettings,

    /// Directory uploaded media is served from.
    uploads_dir: PathBuf,

    max_upload_bytes: usize,
}

impl AppState {
    /// Create application state backed by PostgreSQL.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        let grants = Arc::new(load_grants(config.grants_file.as_deref())?);
        let store = Arc::new(PgStore::new(db.clone()));

        let backends = Backends {
            blocks: store.clone(),
            documents: store.clone(),
            versions: store,
            sessions: grants.clone(),
            access: grants.clone(),
            capabilities: grants,
            media: Arc::new(LocalMediaStore::new(
                &config.uploads_dir,
                &config.files_url,
                config.max_upload_bytes,
            )),
            codes: Arc::new(LinkCodeGenerator),
            guard: Arc::new(RequiredFields::new(config.publish_required_fields.clone())),
            site_url: config.site_url.clone(),
            capabilities_fail_open: config.capabilities_fail_open,
            autosave: config.autosave,
            uploads_dir: config.uploads_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        };

        Ok(Self::build(Some(db), backends))
    }

    /// Create application state over caller-supplied collaborators.
    pub fn from_backends(backends: Backends) -> Self {
        Self::build(None, backends)
    }

    fn build(db: Option<PgPool>, backends: Backends) -> Self {
        let registry = Arc::new(BlockTypeRegistry::new(backends.capabilities_fail_open));

        let gate = DocumentGate::new(
            backends.documents,
            backends.access,
            backends.capabilities,
            registry.clone(),
        );

        let blocks = BlockService::new(backends.blocks.clone(), gate.clone());
        let documents = DocumentService::new(gate.clone());
        let publish = PublishService::new(
            gate,
            backends.blocks,
            VersionCache::new(backends.versions),
            backends.codes,
            backends.guard,
            backends.site_url,
        );

        Self {
            inner: Arc::new(AppStateInner {
                db,
                sessions: backends.sessions,
                media: backends.media,
                registry,
                blocks,
                documents,
                publish,
                autosave: backends.autosave,
                uploads_dir: backends.uploads_dir,
                max_upload_bytes: backends.max_upload_bytes,
            }),
        }
    }

    /// Get the database pool, if the state is backed by PostgreSQL.
    pub fn db(&self) -> Option<&PgPool> {
        self.inner.db.as_ref()
    }

    pub fn sessions(&self) -> &dyn SessionResolver {
        self.inner.sessions.as_ref()
    }

    pub fn media(&self) -> &dyn MediaStore {
        self.inner.media.as_ref()
    }

    pub fn registry(&self) -> &Arc<BlockTypeRegistry> {
        &self.inner.registry
    }

    pub fn blocks(&self) -> &BlockService {
        &self.inner.blocks
    }

    pub fn documents(&self) -> &DocumentService {
        &self.inner.documents
    }

    pub fn publish(&self) -> &PublishService {
        &self.inner.publish
    }

    pub fn autosave(&self) -> AutoSaveSettings {
        self.inner.autosave
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.inner.uploads_dir
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.inner.max_upload_bytes
    }

    /// Check if PostgreSQL is healthy. In-process stores always are.
    pub async fn postgres_healthy(&self) -> bool {
        match self.db() {
            Some(pool) => db::check_health(pool).await,
            None => true,
        }
    }
}

fn load_grants(path: Option<&Path>) -> Result<StaticGrants> {
    match path {
        Some(path) => StaticGrants::load(path),
        None => {
            warn!("GRANTS_FILE not set; every request is anonymous");
            Ok(StaticGrants::empty())
        }
    }
}
