//! Administrative HTTP API.
//!
//! | route                 | effect                                          |
//! |-----------------------|-------------------------------------------------|
//! | `GET /status`         | snapshot, watched files and match-cache metrics |
//! | `GET\|POST /refresh`  | reparse the main configuration now              |
//! | `PUT /stubs`          | replace all stubs with the uploaded YAML        |
//! | `GET /metrics`        | Prometheus text exposition                      |

use crate::matching::CacheMetrics;
use crate::metrics::collect_metrics;
use crate::server::{accept_loop, build_response_with_headers};
use crate::service::{ReloadSource, Reloader};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Serve the admin API from `listener` until `token` is cancelled.
pub async fn serve_admin(listener: TcpListener, reloader: Arc<Reloader>, token: CancellationToken) {
    accept_loop(listener, token, "admin", move |req| {
        let reloader = Arc::clone(&reloader);
        async move { route_request(req, reloader).await }
    })
    .await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub version: &'static str,
    pub config_path: String,
    pub stubs: usize,
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub external_files: Vec<WatchedFile>,
    pub match_cache: CacheMetrics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedFile {
    pub path: String,
    /// Last observed modification time; absent when the file was unreadable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ReloadReport {
    pub stubs: usize,
    pub generation: u64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Main request router
pub async fn route_request(req: Request<Incoming>, reloader: Arc<Reloader>) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("Admin API: {} {}", method, path);

    match (&method, path.trim_end_matches('/')) {
        (&Method::GET, "/status") => handle_status(&reloader),
        (&Method::GET, "/refresh") | (&Method::POST, "/refresh") => handle_refresh(reloader).await,
        (&Method::PUT, "/stubs") => handle_replace_stubs(req, reloader).await,
        (&Method::GET, "/metrics") => handle_metrics(),
        _ => not_found(),
    }
}

/// GET /status
fn handle_status(reloader: &Reloader) -> Response<Full<Bytes>> {
    let snapshot = reloader.service().snapshot();
    let mut external_files: Vec<WatchedFile> = snapshot
        .external_files
        .iter()
        .map(|(path, modified)| WatchedFile {
            path: path.display().to_string(),
            modified: modified.map(DateTime::<Utc>::from),
        })
        .collect();
    external_files.sort_by(|a, b| a.path.cmp(&b.path));

    let report = StatusReport {
        version: env!("CARGO_PKG_VERSION"),
        config_path: reloader.config_path().display().to_string(),
        stubs: snapshot.len(),
        generation: snapshot.generation,
        loaded_at: snapshot.loaded_at,
        external_files,
        match_cache: reloader.service().cache_metrics(),
    };
    json_response(StatusCode::OK, &report)
}

/// GET|POST /refresh
async fn handle_refresh(reloader: Arc<Reloader>) -> Response<Full<Bytes>> {
    let task_reloader = Arc::clone(&reloader);
    let result = tokio::task::spawn_blocking(move || task_reloader.reload(ReloadSource::Admin)).await;
    match result {
        Ok(Ok(stubs)) => reload_report(&reloader, stubs),
        Ok(Err(e)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// PUT /stubs
async fn handle_replace_stubs(req: Request<Incoming>, reloader: Arc<Reloader>) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(body) => body,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };
    let text = match String::from_utf8(body.to_vec()) {
        Ok(text) => text,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Body must be UTF-8 YAML"),
    };

    let task_reloader = Arc::clone(&reloader);
    let result = tokio::task::spawn_blocking(move || {
        task_reloader.replace_from_text(&text, ReloadSource::Admin)
    })
    .await;
    match result {
        Ok(Ok(stubs)) => reload_report(&reloader, stubs),
        Ok(Err(e)) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// GET /metrics
fn handle_metrics() -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        collect_metrics(),
    )
}

fn reload_report(reloader: &Reloader, stubs: usize) -> Response<Full<Bytes>> {
    let report = ReloadReport {
        stubs,
        generation: reloader.service().snapshot().generation,
    };
    json_response(StatusCode::OK, &report)
}

/// Create a JSON response
fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Create an error response
fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: status.as_str().to_string(),
            message: message.to_string(),
        }],
    };
    json_response(status, &error)
}

fn not_found() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

async fn collect_body(req: Request<Incoming>) -> Result<Bytes, String> {
    req.collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))
}
