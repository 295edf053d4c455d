//! Content management module.
//!
//! This module provides:
//! - BlockTypeRegistry: block type definitions, templates and validation
//! - BlockService: guarded block CRUD and reorder
//! - BlockCollection: the editor-side ordered list and selection
//! - BlockEditor: per-block forms and edits driven by the auto-saver
//! - DocumentService: compliance fields and styling
//! - Theme resolution and server-side block rendering

pub mod autosave;
pub mod block_render;
pub mod block_service;
pub mod block_types;
pub mod collection;
pub mod document_service;
pub mod editor;
pub mod theme;

pub use autosave::{AutoSaveSettings, AutoSaver, SaveStatus, SaveTarget};
pub use block_render::{render_blocks, render_document};
pub use block_service::{BlockService, BlockTypeCatalog, ScopedBlocks};
pub use block_types::{BlockTypeDefinition, BlockTypeRegistry, Capabilities};
pub use collection::BlockCollection;
pub use document_service::DocumentService;
pub use editor::{BlockEdit, BlockEditor};
pub use theme::ResolvedTheme;
