//! Development server
//!
//! Serves the project root and the build output locally while a watch
//! build runs, and pushes live-reload messages to connected pages as
//! bundles are rewritten.

mod livereload;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{debug, error, info};

use crate::cli::DevServerOptions;
use crate::utils::is_subpath;

pub use livereload::ReloadMessage;

/// WebSocket endpoint the injected client connects back to.
const RELOAD_ENDPOINT: &str = "/__prefab_reload";

/// Shared server state
struct ServerState {
    /// Project root, served as the static fallback
    root: PathBuf,

    /// Reload broadcast channel
    reload_tx: broadcast::Sender<ReloadMessage>,

    /// Number of connected reload clients
    clients: Mutex<usize>,
}

/// Development server
pub struct DevServer {
    /// Project root
    root: PathBuf,

    /// Directory the bundler writes into
    output_dir: PathBuf,

    /// Package name, shown in the startup banner
    package_name: String,

    /// Server options
    options: DevServerOptions,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(
        root: PathBuf,
        output_dir: PathBuf,
        package_name: String,
        options: DevServerOptions,
    ) -> Self {
        Self {
            root,
            output_dir,
            package_name,
            options,
        }
    }

    /// Start serving. Runs until the process is interrupted.
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.options.host, self.options.port).parse()?;

        let (reload_tx, _) = broadcast::channel::<ReloadMessage>(100);

        let state = Arc::new(ServerState {
            root: self.root.clone(),
            reload_tx: reload_tx.clone(),
            clients: Mutex::new(0),
        });

        // The watcher needs the directory to exist before the first build
        // finishes writing into it
        std::fs::create_dir_all(&self.output_dir)?;
        self.setup_output_watcher(reload_tx)?;

        let app = Router::new()
            .route("/", get(serve_index))
            .route(RELOAD_ENDPOINT, get(livereload::reload_websocket))
            .nest_service("/dist", ServeDir::new(&self.output_dir))
            .route("/*path", get(serve_file))
            .layer(CorsLayer::permissive())
            .with_state(state);

        if self.options.open {
            let url = format!("http://{}", addr);
            if let Err(e) = open_browser(&url) {
                debug!("Failed to open browser: {}", e);
            }
        }

        info!(
            "dev server for {} listening on http://{}",
            self.package_name, addr
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Watch the output directory and broadcast reloads as bundles land.
    fn setup_output_watcher(&self, reload_tx: broadcast::Sender<ReloadMessage>) -> Result<()> {
        let output_dir = self.output_dir.clone();

        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer(std::time::Duration::from_millis(250), tx)?;
        debouncer
            .watcher()
            .watch(&output_dir, RecursiveMode::Recursive)?;

        // The debouncer is moved into the thread to keep it alive
        std::thread::spawn(move || {
            let _debouncer = debouncer;

            loop {
                match rx.recv() {
                    Ok(Ok(events)) => {
                        for event in events {
                            handle_output_change(&event.path, &reload_tx);
                        }
                    }
                    Ok(Err(e)) => {
                        error!("watch error: {:?}", e);
                    }
                    Err(_) => {
                        // Channel closed, exit
                        break;
                    }
                }
            }
        });

        Ok(())
    }
}

/// React to a rewritten file in the output directory.
fn handle_output_change(path: &Path, reload_tx: &broadcast::Sender<ReloadMessage>) {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("bundle")
        .to_string();

    let message = match extension {
        "css" => ReloadMessage::CssUpdate { path: name.clone() },
        "js" => ReloadMessage::Reload {
            reason: format!("{} rewritten", name),
        },
        _ => return,
    };

    eprintln!("  {} {}", "↻".yellow(), name.dimmed());
    let _ = reload_tx.send(message);
}

/// Serve the project's index.html, or a placeholder when there is none.
async fn serve_index(State(state): State<Arc<ServerState>>) -> Response {
    let index_path = state.root.join("index.html");

    if index_path.exists() {
        match std::fs::read_to_string(&index_path) {
            Ok(content) => Html(inject_reload_client(&content)).into_response(),
            Err(e) => {
                error!("failed to read index.html: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read index.html").into_response()
            }
        }
    } else {
        Html(placeholder_index()).into_response()
    }
}

/// Serve a file from the project root.
async fn serve_file(
    State(state): State<Arc<ServerState>>,
    axum::extract::Path(path): axum::extract::Path<String>,
) -> Response {
    let file_path = state.root.join(&path);

    if !file_path.exists() || !is_subpath(&file_path, &state.root) {
        return (StatusCode::NOT_FOUND, format!("File not found: {}", path)).into_response();
    }

    let content_type = content_type_for(&file_path);

    // Pages get the reload client injected; everything else passes through
    if content_type.starts_with("text/html") {
        return match std::fs::read_to_string(&file_path) {
            Ok(content) => Html(inject_reload_client(&content)).into_response(),
            Err(e) => {
                error!("failed to read {}: {}", path, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
            }
        };
    }

    match std::fs::read(&file_path) {
        Ok(content) => {
            let mut response = content.into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            response
        }
        Err(e) => {
            error!("failed to read {}: {}", path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
        }
    }
}

/// Content type for a served file
fn content_type_for(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

/// Script injected into every served page.
const RELOAD_CLIENT: &str = r#"
<script>
// prefab live reload
(function () {
  var socket = new WebSocket("ws://" + location.host + "/__prefab_reload");

  socket.onmessage = function (event) {
    var message = JSON.parse(event.data);

    switch (message.type) {
      case "reload":
        console.log("[prefab] reload:", message.reason);
        location.reload();
        break;

      case "css-update":
        console.log("[prefab] css update:", message.path);
        document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
          var url = new URL(link.href);
          url.searchParams.set("t", Date.now());
          link.href = url.toString();
        });
        break;

      case "connected":
        console.log("[prefab] live reload connected");
        break;
    }
  };

  socket.onclose = function () {
    console.log("[prefab] live reload disconnected, retrying...");
    setTimeout(function () { location.reload(); }, 1000);
  };
})();
</script>
"#;

/// Insert the reload client before `</body>`, or append when absent.
fn inject_reload_client(html: &str) -> String {
    if let Some(pos) = html.rfind("</body>") {
        let mut result = html.to_string();
        result.insert_str(pos, RELOAD_CLIENT);
        result
    } else {
        format!("{}{}", html, RELOAD_CLIENT)
    }
}

/// Placeholder page for projects without an index.html.
fn placeholder_index() -> String {
    let body = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>prefab dev</title>
    <link rel="stylesheet" href="/dist/app.bundle.css" />
  </head>
  <body>
    <div id="app"></div>
    <script src="/dist/app.bundle.js"></script>
  </body>
</html>
"#;
    inject_reload_client(body)
}

/// Open URL in the platform browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_client_lands_before_closing_body() {
        let page = "<html><body><p>hi</p></body></html>";
        let injected = inject_reload_client(page);
        let script_at = injected.find("__prefab_reload").unwrap();
        let body_close_at = injected.rfind("</body>").unwrap();
        assert!(script_at < body_close_at);
    }

    #[test]
    fn test_reload_client_appended_without_body_tag() {
        let fragment = "<p>bare fragment</p>";
        let injected = inject_reload_client(fragment);
        assert!(injected.starts_with(fragment));
        assert!(injected.contains("__prefab_reload"));
    }

    #[test]
    fn test_content_types_cover_bundle_artifacts() {
        assert_eq!(
            content_type_for(Path::new("app.bundle.js")),
            "application/javascript; charset=utf-8"
        );
        assert_eq!(
            content_type_for(Path::new("app.bundle.css")),
            "text/css; charset=utf-8"
        );
        assert_eq!(
            content_type_for(Path::new("app.bundle.js.map")),
            "application/json; charset=utf-8"
        );
        assert_eq!(
            content_type_for(Path::new("unknown.blob")),
            "application/octet-stream"
        );
    }
}
