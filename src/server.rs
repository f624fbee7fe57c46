//! Development server with live reload.
//!
//! Serves the output root over HTTP. HTML responses get a small client
//! script that listens on a server-sent event stream; any change below the
//! output root is broadcast to every connected page, which then reloads.

use crate::build::BuildContext;
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::middleware;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::services::ServeDir;

/// Server-sent event stream of reload notifications
pub const RELOAD_PATH: &str = "/__sitepipe/reload";
/// Reload client script
pub const CLIENT_PATH: &str = "/__sitepipe/client.js";
/// Tag injected into served HTML pages
pub const RELOAD_SNIPPET: &str = r#"<script src="/__sitepipe/client.js"></script>"#;

const CLIENT_SCRIPT: &str = r#"(function () {
  var source = new EventSource("/__sitepipe/reload");
  source.addEventListener("reload", function () {
    window.location.reload();
  });
})();
"#;

/// Dev server failure.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot create {}: {source}", path.display())]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot watch output root: {0}")]
    Watch(#[from] notify::Error),
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

#[derive(Clone)]
struct ServerState {
    reload: broadcast::Sender<()>,
}

/// Insert the reload snippet before the closing `</body>`, or append it
/// when the page has none.
pub fn inject_reload_snippet(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + RELOAD_SNIPPET.len());
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(index) => {
            out.push_str(&html[..index]);
            out.push_str(RELOAD_SNIPPET);
            out.push_str(&html[index..]);
        }
        None => {
            out.push_str(html);
            out.push_str(RELOAD_SNIPPET);
        }
    }
    out
}

async fn reload_events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.reload.subscribe()).filter_map(|message| {
        message.ok().map(|()| Ok::<_, Infallible>(Event::default().event("reload").data("reload")))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_SCRIPT)
}

async fn inject_into_html(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("cannot read HTML response: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };
    let html = inject_reload_snippet(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// HTTP routes for serving `dist` with live reload.
pub fn router(dist: &Path, reload: broadcast::Sender<()>) -> Router {
    let files = ServeDir::new(dist).append_index_html_on_directories(true);
    Router::new()
        .route(RELOAD_PATH, get(reload_events))
        .route(CLIENT_PATH, get(client_script))
        .fallback_service(files)
        .layer(middleware::map_response(inject_into_html))
        .with_state(ServerState { reload })
}

/// Broadcast a reload whenever anything below `dist` changes.
///
/// The returned debouncer must be kept alive for events to flow.
pub fn watch_output(
    dist: &Path,
    reload: broadcast::Sender<()>,
    debounce: Duration,
) -> Result<Debouncer<notify::RecommendedWatcher>, ServerError> {
    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| match result {
        Ok(events) if !events.is_empty() => {
            tracing::debug!(changes = events.len(), "output changed, reloading browsers");
            // No subscribers is not an error
            let _ = reload.send(());
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("output watch error: {:?}", e),
    })?;
    debouncer.watcher().watch(dist, RecursiveMode::Recursive)?;
    Ok(debouncer)
}

/// Serve the output root until the process is terminated.
pub async fn serve(ctx: Arc<BuildContext>) -> Result<(), ServerError> {
    let dist = ctx.dist_dir();
    std::fs::create_dir_all(&dist)
        .map_err(|source| ServerError::OutputRoot { path: dist.clone(), source })?;

    let (reload, _) = broadcast::channel(16);
    let debounce = Duration::from_millis(u64::from(ctx.config().watch.debounce_ms));
    let _output_watcher = watch_output(&dist, reload.clone(), debounce)?;

    let server = &ctx.config().server;
    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
    tracing::info!(addr = %addr, "Serving {} at http://{}", dist.display(), addr);

    axum::serve(listener, router(&dist, reload)).await.map_err(ServerError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response =
            app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_inject_before_body_close() {
        let html = "<html><body><p>hi</p></BODY></html>";
        assert_eq!(
            inject_reload_snippet(html),
            format!("<html><body><p>hi</p>{}</BODY></html>", RELOAD_SNIPPET)
        );
    }

    #[test]
    fn test_inject_without_body_appends() {
        assert_eq!(inject_reload_snippet("<p>x</p>"), format!("<p>x</p>{}", RELOAD_SNIPPET));
    }

    #[tokio::test]
    async fn test_serves_index_with_reload_client() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("about")).unwrap();
        fs::write(temp.path().join("about/index.html"), "<html><body>About</body></html>").unwrap();
        let (reload, _) = broadcast::channel(4);

        let (status, body) = get_body(router(temp.path(), reload), "/about/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("About"));
        assert!(body.contains(RELOAD_SNIPPET));
    }

    #[tokio::test]
    async fn test_non_html_is_untouched() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app.css"), "body{}").unwrap();
        let (reload, _) = broadcast::channel(4);

        let (status, body) = get_body(router(temp.path(), reload), "/app.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body{}");
    }

    #[tokio::test]
    async fn test_client_script_route() {
        let temp = TempDir::new().unwrap();
        let (reload, _) = broadcast::channel(4);
        let (status, body) = get_body(router(temp.path(), reload), CLIENT_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("EventSource"));
        assert!(body.contains(RELOAD_PATH));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let (reload, _) = broadcast::channel(4);
        let (status, _) = get_body(router(temp.path(), reload), "/nope.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_output_change_broadcasts_reload() {
        let temp = TempDir::new().unwrap();
        let (reload, mut receiver) = broadcast::channel(4);
        let _watcher = watch_output(temp.path(), reload, Duration::from_millis(50)).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(temp.path().join("index.html"), "<body></body>").unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), receiver.recv()).await;
        assert!(matches!(received, Ok(Ok(()))));
    }

    #[test]
    fn test_watch_output_requires_existing_root() {
        let temp = TempDir::new().unwrap();
        let (reload, _) = broadcast::channel(4);
        let result = watch_output(&temp.path().join("missing"), reload, Duration::from_millis(50));
        assert!(result.is_err());
    }
}
