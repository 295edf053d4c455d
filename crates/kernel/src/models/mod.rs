//! Database models.

pub mod block;
pub mod block_content;
pub mod document;
pub mod styling;
pub mod version;

pub use block::{Block, BlockPatch, BlockStatus};
pub use block_content::{BlockContent, BlockType};
pub use document::{ComplianceFields, Document, DocumentStatus};
pub use styling::StylingConfig;
pub use version::{Snapshot, Version};
