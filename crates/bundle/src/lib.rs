//! Server-side module scripts.
//!
//! A `/require/<path>` response is one self-executing script: a runtime
//! bootstrap (installed on the page once), a preamble giving the module its
//! own `module`/`exports` and a `require` bound to its directory, the module
//! body with every import turned into a suspension, and a postamble that
//! publishes the export under the exact requested path.
//!
//! # Invariants
//! - The cache key in the postamble is the requested path, byte for byte.
//! - Request paths never resolve outside the served root.

mod error;
mod request;
mod rewrite;
mod script;

pub use error::BundleError;
pub use request::ModuleRequest;
pub use rewrite::rewrite_imports;
pub use script::ModuleScript;

/// URL prefix of module requests.
pub const REQUIRE_PREFIX: &str = "/require/";

pub fn crate_info() -> &'static str {
    "orbfield-bundle v0.1.0"
}
