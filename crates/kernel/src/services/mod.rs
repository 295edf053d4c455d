//! Collaborators the kernel consumes.
//!
//! Each concern is a trait so embedders can plug in their own identity,
//! entitlement and media backends. `StaticGrants`, `LocalMediaStore` and
//! `LinkCodeGenerator` are the implementations the server binary wires up.

pub mod access;
pub mod capability;
pub mod code;
pub mod gate;
pub mod grants;
pub mod media;
pub mod session;

pub use access::{AccessResolver, DocumentAccess};
pub use capability::CapabilityResolver;
pub use code::{CodeGenerator, LinkCodeGenerator};
pub use gate::DocumentGate;
pub use grants::StaticGrants;
pub use media::{LocalMediaStore, MediaStore, StoredMedia};
pub use session::{SessionResolver, UserContext};
