//! # edgequake-docclass
//!
//! Classify business documents into a fixed set of document types using a
//! fine-tuned BigBird sequence classifier exported to ONNX.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Stage      write into a private workspace scope
//!  ├─ 2. Extract    OCR (png/jpg), pdfium (pdf), docx, xlsx, txt
//!  ├─ 3. Normalize  collapse whitespace to single spaces
//!  ├─ 4. Tokenize   704 subword ids + attention mask
//!  ├─ 5. Infer      one ONNX forward pass → 12 logits
//!  ├─ 6. Decode     softmax + argmax → label and confidence
//!  └─ 7. Sweep      remove the scope, whatever happened
//! ```
//!
//! A document without extractable text never reaches the model: it is
//! reported as `UNKNOWN` with confidence `0.0`, and at the upload boundary
//! as `"text not extracted"`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docclass::{
//!     classify_upload, ClassifierConfig, ModelState, RequestWorkspace, UploadedDocument,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClassifierConfig::default();
//!     let model = ModelState::load(&config)?;
//!     let workspace = RequestWorkspace::open(&config.workspace_dir)?;
//!
//!     let doc = UploadedDocument::new("contrato.pdf", std::fs::read("contrato.pdf")?);
//!     let response = classify_upload(doc, &workspace, &model, &config.extract_options()).await;
//!     println!("{}", serde_json::to_string(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP transport ([`server`]) |
//! | `cli`    | on      | The `docclass` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable both when embedding only the library:
//! ```toml
//! edgequake-docclass = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod classify;
pub mod config;
pub mod error;
pub mod labels;
pub mod model;
pub mod output;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use classify::{classify_file, classify_text, classify_upload, classify_upload_sync};
pub use config::{ClassifierConfig, ClassifierConfigBuilder, ExtractOptions, DEFAULT_MAX_LEN};
pub use error::{ClassifyError, ExtractionError};
pub use labels::{DocumentLabel, ParseLabelError};
pub use model::ModelState;
pub use output::{
    ClassificationResult, ExtractionStatus, PipelineOutcome, PipelineTimings, UploadResponse,
    UploadedDocument, TEXT_NOT_EXTRACTED,
};
pub use pipeline::decode::{decode, softmax};
pub use pipeline::extract::{extract, DocumentFormat, Extraction};
pub use pipeline::inference::{LogitVector, OnnxClassifier, SequenceClassifier};
pub use pipeline::normalize::normalize;
pub use pipeline::tokenize::{HfTokenizer, TextEncoder, TokenizedInput};
pub use workspace::{RequestWorkspace, WorkspaceScope};
