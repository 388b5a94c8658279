//! Streaming module loads: registry, fetchers, and the coroutine loader.
//!
//! # Invariants
//! - A module path is fetched at most once per successful load; concurrent
//!   requests for the same path join the load already in flight.
//! - Registry entries are write-once. Failed loads leave no entry behind.
//! - Dependencies load in source order, and an import cycle fails the load
//!   instead of waiting forever.

mod fetch;
mod loader;
mod module;
mod registry;

pub use fetch::{DirectoryFetcher, MemoryFetcher, ModuleFetcher};
pub use loader::ModuleLoader;
pub use module::{Export, Module, ResolvedImport};
pub use registry::{Claim, LoadTicket, ModuleRegistry, RegistryError, RegistryStats};

pub fn crate_info() -> &'static str {
    "orbfield-stream v0.1.0"
}
