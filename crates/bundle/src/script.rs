use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::BundleError;
use crate::request::ModuleRequest;
use crate::rewrite::rewrite_imports;

const RUNTIME: &str = include_str!("../assets/runtime.js");
const PREAMBLE: &str = include_str!("../assets/preamble.js");
const POSTAMBLE: &str = include_str!("../assets/postamble.js");

const ID_SLOT: &str = "__ORBFIELD_ID__";
const PARENT_SLOT: &str = "__ORBFIELD_PARENT__";

/// A self-executing module script: runtime bootstrap and preamble, the
/// rewritten body, then the postamble that publishes the export.
#[derive(Debug, Clone)]
pub struct ModuleScript {
    id: String,
    preamble: String,
    body: String,
    postamble: String,
}

impl ModuleScript {
    /// Build the script for `request` from its raw source.
    pub fn assemble(request: &ModuleRequest, source: &str) -> Result<Self, BundleError> {
        let id = serde_json::to_string(&request.id)?;
        let parent = serde_json::to_string(&request.parent)?;

        let mut preamble = String::with_capacity(RUNTIME.len() + PREAMBLE.len());
        preamble.push_str(RUNTIME);
        preamble.push('\n');
        preamble.push_str(&PREAMBLE.replace(ID_SLOT, &id).replace(PARENT_SLOT, &parent));

        let body = rewrite_imports(source);
        let postamble = POSTAMBLE.replace(ID_SLOT, &id);
        tracing::debug!(id = %request.id, parent = %request.parent, "assembled module script");

        Ok(Self {
            id: request.id.clone(),
            preamble,
            body,
            postamble,
        })
    }

    /// Read the request's source under `root` and assemble it.
    pub fn load(request: &ModuleRequest, root: &Path) -> Result<Self, BundleError> {
        let source = request.read_source(root)?;
        Self::assemble(request, &source)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn postamble(&self) -> &str {
        &self.postamble
    }

    pub fn render(&self) -> String {
        let mut out =
            String::with_capacity(self.preamble.len() + self.body.len() + self.postamble.len() + 1);
        out.push_str(&self.preamble);
        out.push_str(&self.body);
        out.push('\n');
        out.push_str(&self.postamble);
        out
    }

    /// Strong entity tag for the rendered script.
    pub fn etag(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.preamble.as_bytes());
        hasher.update(self.body.as_bytes());
        hasher.update(self.postamble.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
        format!("\"{hex}\"")
    }
}
