//! HTTP middleware components.

pub mod auth;

pub use auth::authenticate_bearer_token;
