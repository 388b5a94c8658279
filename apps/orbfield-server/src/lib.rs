//! HTTP surface for on-demand module loading.
//!
//! # Invariants
//! - `/require/<path>` never reads outside the configured root.
//! - Failures answer 500 with a JSON string body; unmatched paths answer 404.

pub mod config;
pub mod routes;

pub use config::ServerConfig;
pub use routes::{AppState, router};
