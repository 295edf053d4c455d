//! Product passport kernel library.
//!
//! Content blocks, auto-save, styling and versioned publishing for digital
//! product passports. The `passport` binary serves it over HTTP; the
//! library is exposed for embedding and integration testing.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod publish;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

pub use error::{AppError, AppResult};
pub use state::{AppState, Backends};
