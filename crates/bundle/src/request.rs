use orbfield_common::ModulePath;
use std::path::{Path, PathBuf};

use crate::error::BundleError;

/// A `/require/<path>` request, split into what the generated script needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    /// The path exactly as requested; the script caches its export under it.
    pub id: String,
    /// Normalized location of the source under the served root.
    pub path: ModulePath,
    /// Every requested segment but the last. Relative imports resolve here.
    pub parent: String,
}

impl ModuleRequest {
    /// Parse the part of the URL after the `/require/` prefix.
    pub fn parse(raw: &str) -> Result<Self, BundleError> {
        let path = ModulePath::parse_request(raw)?;
        let segments: Vec<&str> = raw.split('/').collect();
        let parent = segments[..segments.len() - 1].join("/");
        Ok(Self {
            id: raw.to_string(),
            path,
            parent,
        })
    }

    pub fn file(&self, root: &Path) -> PathBuf {
        root.join(self.path.as_str())
    }

    /// Read the module source from `root`.
    pub fn read_source(&self, root: &Path) -> Result<String, BundleError> {
        let file = self.file(root);
        if file.is_dir() {
            return Err(BundleError::NotAFile(self.path.to_string()));
        }
        Ok(std::fs::read_to_string(file)?)
    }
}
