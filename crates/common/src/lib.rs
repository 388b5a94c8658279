//! Shared types for orbfield: module paths and import-site scanning.
//!
//! # Invariants
//! - A `ModulePath` is always normalized; equal files compare equal.
//! - Import scanning is structural: strings and comments never yield sites.

pub mod imports;
pub mod path;

pub use imports::{IMPORT_CALLEE, ImportSite, SUSPEND_KEYWORD, scan_imports};
pub use path::{DEFAULT_EXTENSION, ModulePath, PathError};

pub fn crate_info() -> &'static str {
    "orbfield-common v0.1.0"
}
