//! Data carried into and out of the classification pipeline.

use crate::labels::DocumentLabel;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Message returned when a document yields no usable text.
pub const TEXT_NOT_EXTRACTED: &str = "text not extracted";

/// A single uploaded file, owned by the request that received it.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Lower-cased extension including the dot (`.pdf`), or empty.
    pub declared_extension: String,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let filename = filename.into();
        let declared_extension = extension_of(Path::new(&filename));
        Self {
            filename,
            bytes: bytes.into(),
            declared_extension,
        }
    }
}

/// Lower-cased extension of `path` with its leading dot, or `""`.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// The label chosen for a document and the probability mass behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: DocumentLabel,
    /// Softmax probability of `label`, in `[0, 1]`.
    pub confidence: f32,
}

impl ClassificationResult {
    /// The result used when there is nothing to classify.
    pub fn unknown() -> Self {
        Self {
            label: DocumentLabel::Unknown,
            confidence: 0.0,
        }
    }

    /// Confidence rendered as a percentage with two decimals, e.g. `87.50%`.
    pub fn confidence_percentage(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}

/// How extraction went for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Text was found.
    Extracted,
    /// The document was read but contained no text.
    Empty,
    /// The extension is not supported.
    Unsupported,
    /// A format-specific reader failed.
    Failed(String),
}

impl ExtractionStatus {
    pub fn has_text(&self) -> bool {
        matches!(self, ExtractionStatus::Extracted)
    }
}

/// Wall-clock time spent per stage, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTimings {
    pub extract_ms: u64,
    pub tokenize_ms: u64,
    pub infer_ms: u64,
    pub total_ms: u64,
}

/// Everything the pipeline learned about one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub classification: ClassificationResult,
    pub status: ExtractionStatus,
    pub timings: PipelineTimings,
}

/// The structured answer to one upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Classified {
        filename: String,
        classification_label: DocumentLabel,
        confidence_percentage: String,
    },
    /// Extraction produced no text ([`TEXT_NOT_EXTRACTED`]).
    NotExtracted {
        filename: String,
        classification: String,
    },
    /// The pipeline failed; `classification` is `internal error: <message>`.
    Failed {
        filename: String,
        classification: String,
    },
}

impl UploadResponse {
    pub fn classified(filename: impl Into<String>, result: &ClassificationResult) -> Self {
        UploadResponse::Classified {
            filename: filename.into(),
            classification_label: result.label,
            confidence_percentage: result.confidence_percentage(),
        }
    }

    pub fn not_extracted(filename: impl Into<String>) -> Self {
        UploadResponse::NotExtracted {
            filename: filename.into(),
            classification: TEXT_NOT_EXTRACTED.to_string(),
        }
    }

    pub fn failed(filename: impl Into<String>, message: impl std::fmt::Display) -> Self {
        UploadResponse::Failed {
            filename: filename.into(),
            classification: format!("internal error: {message}"),
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            UploadResponse::Classified { filename, .. }
            | UploadResponse::NotExtracted { filename, .. }
            | UploadResponse::Failed { filename, .. } => filename,
        }
    }

    /// The predicted label, when the document was classified.
    pub fn label(&self) -> Option<DocumentLabel> {
        match self {
            UploadResponse::Classified {
                classification_label,
                ..
            } => Some(*classification_label),
            _ => None,
        }
    }
}
