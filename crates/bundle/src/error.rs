use orbfield_common::PathError;

/// Errors from assembling a module script.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid module path: {0}")]
    Path(#[from] PathError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("module source is not a file: {0}")]
    NotAFile(String),
}
