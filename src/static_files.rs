use axum::{
    body::Body,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::UNIX_EPOCH,
};
use tokio::{fs::File, sync::RwLock};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

/// Serves the stylesheet and scripts of the site, with `?v=` cache busting
/// for the assets the page templates link to.
#[derive(Clone)]
pub struct StaticFileHandler {
    pub static_dir: PathBuf,
    file_versions: Arc<RwLock<HashMap<String, u64>>>,
}

impl StaticFileHandler {
    pub fn new(static_dir: PathBuf) -> Self {
        Self {
            static_dir,
            file_versions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Records the mtime of every CSS and JS file at the top of the static
    /// directory.
    pub async fn refresh_file_versions(&self) {
        info!("Refreshing static file versions");
        let mut found = HashMap::new();

        let mut entries = match tokio::fs::read_dir(&self.static_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read static directory {:?}: {}", self.static_dir, e);
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if let Ok(metadata) = entry.metadata().await
                && metadata.is_file()
                && let Some(ext) = path.extension()
                && (ext == "css" || ext == "js")
                && let Ok(modified) = metadata.modified()
                && let Ok(duration) = modified.duration_since(UNIX_EPOCH)
                && let Some(file_name) = path.file_name().and_then(|name| name.to_str())
            {
                debug!("File version: {} -> {}", file_name, duration.as_secs());
                found.insert(file_name.to_string(), duration.as_secs());
            }
        }

        *self.file_versions.write().await = found;
    }

    pub async fn get_file_version(&self, filename: &str) -> Option<u64> {
        self.file_versions.read().await.get(filename).copied()
    }

    /// `/static/<path>`, with `?v=<mtime>` when the file version is known.
    pub async fn get_versioned_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        let filename = path.rsplit('/').next().unwrap_or(path);

        match self.get_file_version(filename).await {
            Some(version) => format!("/static/{}?v={}", path, version),
            None => format!("/static/{}", path),
        }
    }

    fn resolve_path(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return None;
        }
        Some(self.static_dir.join(relative))
    }

    pub async fn serve(&self, path: &str, has_version: bool, request_headers: &HeaderMap) -> Response {
        let Some(file_path) = self.resolve_path(path) else {
            error!("Path traversal attempt: {:?}", path);
            return (StatusCode::FORBIDDEN, "Forbidden").into_response();
        };

        debug!("Attempting to serve static file: {:?}", file_path);

        let metadata = match tokio::fs::metadata(&file_path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return (StatusCode::NOT_FOUND, "File not found").into_response(),
            Err(e) => {
                debug!("Failed to get metadata for {:?}: {}", file_path, e);
                return (StatusCode::NOT_FOUND, "File not found").into_response();
            }
        };

        let content_type = mime_guess::from_path(&file_path)
            .first_or_octet_stream()
            .to_string();

        let cache_control = if has_version {
            "public, max-age=31536000, immutable"
        } else if content_type.starts_with("image/") {
            "public, max-age=31536000"
        } else if content_type.starts_with("text/css")
            || content_type.starts_with("application/javascript")
            || content_type.starts_with("text/javascript")
        {
            "public, max-age=300, must-revalidate"
        } else {
            "public, max-age=3600"
        };

        let mut response = Response::builder()
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, cache_control);

        if let Ok(modified) = metadata.modified()
            && let Ok(duration) = modified.duration_since(UNIX_EPOCH)
        {
            let etag = format!("\"{}-{}\"", duration.as_secs(), metadata.len());

            let matches = request_headers
                .get(header::IF_NONE_MATCH)
                .and_then(|h| h.to_str().ok())
                .is_some_and(|value| value == etag);
            if matches {
                return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
            }

            response = response
                .header(header::LAST_MODIFIED, httpdate::fmt_http_date(modified))
                .header(header::ETAG, etag);
        }

        let file = match File::open(&file_path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("Failed to open file {:?}: {}", file_path, e);
                return (StatusCode::NOT_FOUND, "File not found").into_response();
            }
        };

        let body = Body::from_stream(ReaderStream::new(file));
        match response.status(StatusCode::OK).body(body) {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to build static response: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
