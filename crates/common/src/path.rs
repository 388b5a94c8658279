use serde::{Deserialize, Serialize};
use std::fmt;

/// Extension appended to specifiers that do not already carry it.
pub const DEFAULT_EXTENSION: &str = ".js";

/// Errors from parsing request paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("empty module path")]
    Empty,
    #[error("module path escapes the served root: {0}")]
    EscapesRoot(String),
}

/// A normalized, root-relative module path such as `utils/math.js`.
///
/// Normalization drops empty and `.` segments and resolves `..` against the
/// preceding segment, so two spellings of the same file produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModulePath(String);

impl ModulePath {
    /// Normalize a raw path. A `..` at the root is dropped, never an error.
    pub fn normalize(raw: &str) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self(segments.join("/"))
    }

    /// Strict parse for paths arriving over the wire.
    ///
    /// Rejects empty paths and paths whose `..` segments would climb above
    /// the root, since these are mapped onto the filesystem.
    pub fn parse_request(raw: &str) -> Result<Self, PathError> {
        let mut depth = 0usize;
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| PathError::EscapesRoot(raw.to_string()))?;
                }
                _ => depth += 1,
            }
        }
        let path = Self::normalize(raw);
        if path.0.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(path)
    }

    /// Resolve an import specifier as seen from `base_dir`.
    ///
    /// Specifiers starting with `.` are relative to `base_dir`; anything else
    /// is taken from the root. The default extension is appended when missing.
    pub fn resolve(base_dir: &str, specifier: &str) -> Self {
        let mut target = if specifier.starts_with('.') && !base_dir.is_empty() {
            format!("{base_dir}/{specifier}")
        } else {
            specifier.to_string()
        };
        if !target.ends_with(DEFAULT_EXTENSION) {
            target.push_str(DEFAULT_EXTENSION);
        }
        Self::normalize(&target)
    }

    /// Resolve a specifier imported by this module.
    pub fn join(&self, specifier: &str) -> Self {
        Self::resolve(self.directory(), specifier)
    }

    /// Everything but the last segment (empty for top-level modules).
    pub fn directory(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModulePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
