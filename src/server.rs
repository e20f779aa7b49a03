//! HTTP transport.
//!
//! | Method | Path      | Response |
//! |--------|-----------|----------|
//! | GET    | `/health` | liveness plus model facts |
//! | GET    | `/labels` | the label table in model order |
//! | POST   | `/upload` | multipart upload → [`UploadResponse`] JSON |
//!
//! Pipeline failures are answered with HTTP 200 and a degraded
//! [`UploadResponse`]. A malformed or empty multipart body is a 400, an
//! oversized one a 413.

use crate::classify::classify_upload;
use crate::config::ExtractOptions;
use crate::labels::DocumentLabel;
use crate::model::ModelState;
use crate::output::{UploadResponse, UploadedDocument};
use crate::workspace::RequestWorkspace;
use axum::extract::{DefaultBodyLimit, Extension, Multipart, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Instrument, Level};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Default cap on an upload request body: 50 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelState>,
    pub workspace: Arc<RequestWorkspace>,
    pub extract: Arc<ExtractOptions>,
}

impl AppState {
    pub fn new(model: ModelState, workspace: RequestWorkspace, extract: ExtractOptions) -> Self {
        Self {
            model: Arc::new(model),
            workspace: Arc::new(workspace),
            extract: Arc::new(extract),
        }
    }
}

/// Build the router with tracing, request ids and the body limit applied.
pub fn create_router(state: AppState, body_limit: usize) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route("/labels", get(labels_handler))
        .route("/upload", post(upload_handler))
        .route("/upload/", post(upload_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .with_state(state)
}

/// Serve `router` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
            }
        })
        .await
}

// ── Middleware ───────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Tag the request with an id (taken from `x-request-id` or generated), run
/// it inside a span carrying that id, and echo the id on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri().path()
    );

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub labels: usize,
    pub max_len: usize,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        labels: DocumentLabel::COUNT,
        max_len: state.model.max_len(),
    })
}

#[derive(Serialize)]
pub struct LabelEntry {
    pub index: usize,
    pub label: DocumentLabel,
    pub display_name: String,
}

pub async fn labels_handler() -> Json<Vec<LabelEntry>> {
    Json(
        DocumentLabel::ALL
            .iter()
            .map(|&label| LabelEntry {
                index: label.index(),
                label,
                display_name: label.display_name(),
            })
            .collect(),
    )
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// 400 for a malformed body, 413 when the body limit was hit.
fn multipart_error(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

/// Classify the first file in a multipart body.
///
/// Plain form fields are skipped; the first field named `file` or carrying
/// a filename is classified.
pub async fn upload_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Response {
    let document = loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => {
                tracing::warn!("Upload request with no file");
                return multipart_error(StatusCode::BAD_REQUEST, "No file uploaded".to_string());
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read multipart");
                return multipart_error(e.status(), format!("Failed to read multipart: {e}"));
            }
        };

        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => break UploadedDocument::new(filename, bytes.to_vec()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read file bytes");
                return multipart_error(e.status(), format!("Failed to read file: {e}"));
            }
        }
    };

    tracing::debug!(
        filename = %document.filename,
        bytes = document.bytes.len(),
        extension = %document.declared_extension,
        "File received"
    );

    let response: UploadResponse =
        classify_upload(document, &state.workspace, &state.model, &state.extract).await;
    match response.label() {
        Some(label) => tracing::info!(
            request_id = %request_id.0,
            filename = %response.filename(),
            %label,
            "Upload classified"
        ),
        None => tracing::info!(
            request_id = %request_id.0,
            filename = %response.filename(),
            "Upload answered without a label"
        ),
    }
    (StatusCode::OK, Json(response)).into_response()
}
