use std::{io, path::Path, sync::Arc};

use anyhow::Result;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use strict_path::{PathBoundary, StrictPathError};
use tracing::debug;

use crate::{error::AppError, infra::cors::preflight};

const INDEX: &str = "index.html";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Marker for paths validated against the public root.
#[derive(Clone)]
struct PublicAssets;

struct Container {
    boundary: PathBoundary<PublicAssets>,
}
type AppState = Arc<Container>;

/// Catch-all for everything the API routes don't match: GET serves files
/// from `root`, OPTIONS answers preflight, anything else is not found.
///
/// The root is created if missing and canonicalized once here.
pub(crate) fn router(root: &Path) -> Result<Router> {
    let boundary = PathBoundary::try_new_create(root)?;
    Ok(Router::new()
        .fallback(dispatch)
        .with_state(Arc::new(Container { boundary })))
}

async fn dispatch(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    match method {
        Method::OPTIONS => preflight().await.into_response(),
        Method::GET => serve(&state.boundary, uri.path()).await.into_response(),
        _ => AppError::NotFound.into_response(),
    }
}

async fn serve(boundary: &PathBoundary<PublicAssets>, raw_path: &str) -> Result<Response, AppError> {
    let decoded = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| AppError::NotFound)?;
    let relative = match decoded.trim_start_matches('/') {
        "" => INDEX,
        relative => relative,
    };

    // Resolves `..` and symlinks, then checks the result is still under the root
    let file = boundary.strict_join(relative).map_err(|e| match e {
        StrictPathError::PathEscapesBoundary { .. } => {
            debug!(path = relative, "static path escapes the public root");
            AppError::Forbidden
        }
        e => {
            debug!(path = relative, error = %e, "static path not resolvable");
            AppError::NotFound
        }
    })?;

    let read = tokio::task::spawn_blocking(move || file.read())
        .await
        .map_err(|e| AppError::Storage(io::Error::new(io::ErrorKind::Other, e)))?;
    let bytes = match read {
        Ok(bytes) => bytes,
        // Directories fail to read as well
        Err(e) => {
            debug!(path = relative, error = %e, "static file unavailable");
            return Err(match e.kind() {
                io::ErrorKind::PermissionDenied => AppError::Forbidden,
                _ => AppError::NotFound,
            });
        }
    };

    let content_type = HeaderValue::from_static(content_type(Path::new(relative)));
    Ok((StatusCode::OK, [(CONTENT_TYPE, content_type)], bytes).into_response())
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") | Some("map") => "application/json; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("wasm") => "application/wasm",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::create_dir_all(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css").join("app.css"), "body{}").unwrap();
        std::fs::write(dir.path().join("game.bin"), [0u8, 1, 2]).unwrap();
        dir
    }

    async fn send(root: &Path, method: &str, uri: &str) -> Response {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        router(root).unwrap().oneshot(request).await.unwrap()
    }

    async fn body(response: Response) -> Vec<u8> {
        hyper::body::to_bytes(response.into_body()).await.unwrap().to_vec()
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("LOGO.PNG")), "image/png");
        assert_eq!(content_type(Path::new("app.js")), "application/javascript; charset=utf-8");
        assert_eq!(content_type(Path::new("archive.tar.gz")), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type(Path::new("Makefile")), FALLBACK_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn root_serves_index() {
        let dir = site();
        let response = send(dir.path(), "GET", "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(body(response).await, b"<h1>hi</h1>");
    }

    #[tokio::test]
    async fn nested_file_and_binary_fallback() {
        let dir = site();

        let response = send(dir.path(), "GET", "/css/app.css").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/css; charset=utf-8");

        let response = send(dir.path(), "GET", "/game.bin").await;
        assert_eq!(response.headers()[CONTENT_TYPE], FALLBACK_CONTENT_TYPE);
        assert_eq!(body(response).await, vec![0u8, 1, 2]);
    }

    #[tokio::test]
    async fn encoded_traversal_is_forbidden() {
        let dir = site();
        let response = send(dir.path(), "GET", "/%2E%2E/%2E%2E/etc/passwd").await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_file_and_directory_are_not_found() {
        let dir = site();

        assert_eq!(send(dir.path(), "GET", "/nope.js").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(send(dir.path(), "GET", "/css").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_methods_are_not_found() {
        let dir = site();

        assert_eq!(send(dir.path(), "POST", "/index.html").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(send(dir.path(), "DELETE", "/").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn options_is_preflight() {
        let dir = site();
        let response = send(dir.path(), "OPTIONS", "/anything").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, b"{}");
    }

    #[tokio::test]
    async fn dot_segments_inside_root_are_served() {
        let dir = site();
        let response = send(dir.path(), "GET", "/css/../css/./app.css").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, b"body{}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_out_of_root_is_forbidden() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "nope").unwrap();
        let dir = site();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("up")).unwrap();

        let response = send(dir.path(), "GET", "/up/secret.txt").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_ne!(body(response).await, b"nope");
    }

    #[tokio::test]
    async fn missing_root_is_created() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("public");

        assert_eq!(send(&root, "GET", "/").await.status(), StatusCode::NOT_FOUND);
        assert!(root.is_dir());
    }
}
