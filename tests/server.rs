//! HTTP surface tests, driven through `tower::ServiceExt::oneshot`.

#![cfg(feature = "server")]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{blank_png, keyword_model};
use edgequake_docclass::server::{create_router, AppState, DEFAULT_BODY_LIMIT, REQUEST_ID_HEADER};
use edgequake_docclass::{ExtractOptions, RequestWorkspace};
use serde_json::Value;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

const BOUNDARY: &str = "X-DOCCLASS-TEST-BOUNDARY";

fn app(tmp: &TempDir, body_limit: usize) -> axum::Router {
    let (model, _) = keyword_model();
    let ws = RequestWorkspace::open(tmp.path().join("process")).unwrap();
    create_router(AppState::new(model, ws, ExtractOptions::default()), body_limit)
}

fn multipart_body(field: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    match filename {
        Some(f) => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{f}\"\r\n")
                .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"\r\n").as_bytes(),
        ),
    }
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_model_facts() {
    let tmp = TempDir::new().unwrap();
    let response = app(&tmp, DEFAULT_BODY_LIMIT)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["labels"], 12);
    assert_eq!(json["max_len"], common::MAX_LEN);
}

#[tokio::test]
async fn labels_are_listed_in_model_order() {
    let tmp = TempDir::new().unwrap();
    let response = app(&tmp, DEFAULT_BODY_LIMIT)
        .oneshot(Request::builder().uri("/labels").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = json_body(response).await;
    let labels = json.as_array().unwrap();
    assert_eq!(labels.len(), 12);
    assert_eq!(labels[0]["label"], "ATA_DE_REUNIAO");
    assert_eq!(labels[3]["label"], "CONTRATO");
    assert_eq!(labels[11]["label"], "UNKNOWN");
    assert_eq!(labels[9]["display_name"], "NOTA DE EMPENHO");
}

#[tokio::test]
async fn upload_returns_label_and_percentage() {
    let tmp = TempDir::new().unwrap();
    let body = multipart_body("file", Some("contrato.txt"), "CONTRATO social".as_bytes());
    let response = app(&tmp, DEFAULT_BODY_LIMIT)
        .oneshot(upload_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["filename"], "contrato.txt");
    assert_eq!(json["classification_label"], "CONTRATO");
    let pct = json["confidence_percentage"].as_str().unwrap();
    let value: f32 = pct.trim_end_matches('%').parse().unwrap();
    assert!(value > 50.0, "got {pct}");
}

#[tokio::test]
async fn unsupported_and_blank_uploads_are_degraded_not_failed() {
    let tmp = TempDir::new().unwrap();
    let router = app(&tmp, DEFAULT_BODY_LIMIT);

    for (name, content) in [("a.zip", b"PK\x03\x04".to_vec()), ("blank.png", blank_png())] {
        let response = router
            .clone()
            .oneshot(upload_request(multipart_body("file", Some(name), &content)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["filename"], name);
        assert_eq!(json["classification"], "text not extracted");
    }
}

#[tokio::test]
async fn form_fields_without_file_are_a_bad_request() {
    let tmp = TempDir::new().unwrap();
    let body = multipart_body("comment", None, b"hello");
    let response = app(&tmp, DEFAULT_BODY_LIMIT)
        .oneshot(upload_request(body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "No file uploaded");
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let body = multipart_body("file", Some("big.txt"), &vec![b'a'; 4096]);
    let response = app(&tmp, 1024).oneshot(upload_request(body)).await.unwrap();
    assert!(response.status().is_client_error(), "got {}", response.status());
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let tmp = TempDir::new().unwrap();
    let router = app(&tmp, DEFAULT_BODY_LIMIT);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let generated = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}

/// In-memory log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn upload_log_line_carries_request_id() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let tmp = TempDir::new().unwrap();
    let mut request = upload_request(multipart_body("file", Some("c.txt"), b"contrato"));
    request
        .headers_mut()
        .insert(REQUEST_ID_HEADER, "req-log-42".parse().unwrap());
    let response = app(&tmp, DEFAULT_BODY_LIMIT).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let out = logs.contents();
    let line = out
        .lines()
        .find(|l| l.contains("Upload classified"))
        .unwrap_or_else(|| panic!("no classification log line in:\n{out}"));
    assert!(line.contains("req-log-42"), "{line}");
    assert!(line.contains("CONTRATO"), "{line}");
}
