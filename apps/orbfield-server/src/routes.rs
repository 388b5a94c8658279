use axum::{
    Router,
    extract::{Path, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use orbfield_bundle::{BundleError, ModuleRequest, ModuleScript};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, info};

const JAVASCRIPT: &str = "application/javascript; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    root: Arc<PathBuf>,
}

impl AppState {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

/// `/require/*path` assembles module scripts; every other path is a static
/// file under the root, or 404.
pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.root());
    Router::new()
        .route("/require/*path", get(require_module))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_module(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    info!(module = %path, "require");
    let root = Arc::clone(&state.root);
    let built = tokio::task::spawn_blocking(move || -> Result<ModuleScript, BundleError> {
        let request = ModuleRequest::parse(&path)?;
        ModuleScript::load(&request, &root)
    })
    .await;

    let script = match built {
        Ok(Ok(script)) => script,
        Ok(Err(err)) => return failure(&err),
        Err(err) => return failure(&err),
    };

    let etag = script.etag();
    let fresh = headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| etag_matches(value, &etag));
    let Ok(etag_header) = HeaderValue::from_str(&etag) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    if fresh {
        debug!(module = script.id(), "not modified");
        return (StatusCode::NOT_MODIFIED, [(ETAG, etag_header)]).into_response();
    }

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static(JAVASCRIPT)),
            (ETAG, etag_header),
        ],
        script.render(),
    )
        .into_response()
}

fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|tag| {
        tag == "*" || tag.strip_prefix("W/").unwrap_or(tag) == etag
    })
}

/// 500 carrying the error and its causes as a JSON string.
fn failure(err: &dyn Error) -> Response {
    let mut trace = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push_str("\n    caused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    error!(%trace, "module request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        serde_json::Value::String(trace).to_string(),
    )
        .into_response()
}
