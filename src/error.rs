//! Error types for the edgequake-docclass library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ClassifyError`]: **Fatal or request-level**: the model artifacts are
//!   missing or mismatched (startup must abort), the configuration is
//!   invalid, or a single request failed while tokenising, running the model
//!   or staging its upload. Startup errors are returned from
//!   [`crate::model::ModelState::load`]; request errors are turned into a
//!   degraded [`crate::output::UploadResponse`] at the request boundary.
//!
//! * [`ExtractionError`]: **Non-fatal**: a document could not be read
//!   (unsupported extension, corrupt file, OCR unavailable). Extraction
//!   never propagates it; it is carried inside
//!   [`crate::pipeline::extract::Extraction`] so the reason stays visible to
//!   logging while the caller only sees "no text".

use std::path::PathBuf;
use thiserror::Error;

/// Fatal and request-level errors returned by the library.
#[derive(Debug, Error)]
pub enum ClassifyError {
    // ── Model artifacts (startup-fatal) ───────────────────────────────────
    /// The ONNX model file does not exist.
    #[error("Model file not found: '{path}'\nSet --model-path or DOCCLASS_MODEL_PATH.")]
    ModelNotFound { path: PathBuf },

    /// The tokenizer directory does not contain a `tokenizer.json`.
    #[error("Tokenizer not found: '{path}'\nSet --tokenizer-dir or DOCCLASS_TOKENIZER_DIR.")]
    TokenizerNotFound { path: PathBuf },

    /// ONNX Runtime refused to build a session from the model file.
    #[error("Failed to load model '{path}': {detail}")]
    ModelLoadFailed { path: PathBuf, detail: String },

    /// The tokenizer file exists but could not be parsed.
    #[error("Failed to load tokenizer '{path}': {detail}")]
    TokenizerLoadFailed { path: PathBuf, detail: String },

    /// Tokenizer and model artifacts disagree (inputs, dtypes, vocabulary,
    /// label count).
    #[error("Model and tokenizer artifacts are incompatible: {0}")]
    ArtifactMismatch(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Request errors ────────────────────────────────────────────────────
    /// Tokenisation or the forward pass failed for a single request.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Staging an upload into the workspace failed.
    #[error("Workspace error at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task join failure, runtime creation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClassifyError {
    /// `true` for the errors that must keep the service from becoming ready.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            ClassifyError::ModelNotFound { .. }
                | ClassifyError::TokenizerNotFound { .. }
                | ClassifyError::ModelLoadFailed { .. }
                | ClassifyError::TokenizerLoadFailed { .. }
                | ClassifyError::ArtifactMismatch(_)
        )
    }
}

impl From<ort::Error> for ClassifyError {
    fn from(e: ort::Error) -> Self {
        ClassifyError::Inference(format!("ONNX Runtime: {e}"))
    }
}

/// Why a document yielded no text.
///
/// Never returned as `Err` from extraction; see
/// [`crate::pipeline::extract::Extraction`].
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The extension is not one of the supported formats.
    #[error("unsupported file type '{extension}'")]
    Unsupported { extension: String },

    /// The staged file could not be read.
    #[error("I/O error: {0}")]
    Io(String),

    /// The image could not be decoded.
    #[error("image decode failed: {0}")]
    Image(String),

    /// The OCR engine is missing or failed.
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// pdfium could not bind, open or read the document.
    #[error("PDF read failed: {0}")]
    Pdf(String),

    /// The DOCX archive or its XML is corrupt.
    #[error("DOCX read failed: {0}")]
    Docx(String),

    /// The workbook could not be opened or has no worksheet.
    #[error("XLSX read failed: {0}")]
    Xlsx(String),

    /// The extraction task panicked or was cancelled.
    #[error("extraction task aborted: {0}")]
    Aborted(String),
}
