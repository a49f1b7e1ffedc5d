//! Middleware del sistema
//!
//! Autenticación por JWT (extractor de organización) y CORS.

pub mod auth;
pub mod cors;

pub use auth::{Claims, OrganizationContext};
pub use cors::cors_layer_for;
