//! Classification entry points.
//!
//! Three levels, each built on the one below:
//!
//! * [`classify_text`]: normalise, tokenise, infer, decode.
//! * [`classify_file`]: extract text from a file on disk, then classify it.
//! * [`classify_upload`]: stage an upload in a private workspace scope,
//!   classify it, sweep the scope, and turn the result into the
//!   [`UploadResponse`] a client sees. Never fails: pipeline errors become a
//!   degraded response.

use crate::config::ExtractOptions;
use crate::error::ClassifyError;
use crate::model::ModelState;
use crate::output::{
    ClassificationResult, ExtractionStatus, PipelineOutcome, PipelineTimings, UploadResponse,
    UploadedDocument,
};
use crate::pipeline::{decode, extract, normalize};
use crate::workspace::RequestWorkspace;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Classify already-extracted text.
///
/// Text that normalises to nothing is `UNKNOWN` with confidence `0.0`; the
/// model is not invoked for it. Runs on the calling thread.
pub fn classify_text(text: &str, model: &ModelState) -> Result<ClassificationResult, ClassifyError> {
    let (result, _, _) = run_model(&normalize::normalize(text), model)?;
    Ok(result)
}

/// Extract, normalise and classify the file at `path`.
///
/// Extraction problems are not errors: they yield `UNKNOWN` with the reason
/// in [`PipelineOutcome::status`]. Only tokenisation or inference failures
/// are returned as `Err`.
pub async fn classify_file(
    path: &Path,
    model: &ModelState,
    options: &ExtractOptions,
) -> Result<PipelineOutcome, ClassifyError> {
    let total_start = Instant::now();

    // ── Step 1: Extract ──────────────────────────────────────────────────
    let extract_start = Instant::now();
    let extraction = extract::extract(path, options).await;
    let extract_ms = extract_start.elapsed().as_millis() as u64;
    let status = extraction.status();
    let text = normalize::normalize(extraction.text());
    debug!(file = %path.display(), extract_ms, chars = text.len(), "Extracted");

    // ── Step 2: Short-circuit empty documents ────────────────────────────
    if text.is_empty() {
        info!(file = %path.display(), status = ?status, "No text extracted; skipping model");
        return Ok(PipelineOutcome {
            classification: ClassificationResult::unknown(),
            status,
            timings: PipelineTimings {
                extract_ms,
                total_ms: total_start.elapsed().as_millis() as u64,
                ..Default::default()
            },
        });
    }

    // ── Step 3: Tokenise + infer off the async runtime ───────────────────
    let model = model.clone();
    let (classification, tokenize_ms, infer_ms) =
        tokio::task::spawn_blocking(move || run_model(&text, &model))
            .await
            .map_err(|e| ClassifyError::Internal(format!("inference task failed: {e}")))??;

    let timings = PipelineTimings {
        extract_ms,
        tokenize_ms,
        infer_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        file = %path.display(),
        label = %classification.label,
        confidence = classification.confidence,
        total_ms = timings.total_ms,
        "Classified"
    );

    Ok(PipelineOutcome {
        classification,
        status,
        timings,
    })
}

/// Classify one uploaded document end to end.
///
/// The upload is written into a fresh scope of `workspace`, classified, and
/// the scope is swept whatever the outcome.
pub async fn classify_upload(
    document: UploadedDocument,
    workspace: &RequestWorkspace,
    model: &ModelState,
    options: &ExtractOptions,
) -> UploadResponse {
    let filename = document.filename.clone();

    let scope = match workspace.scope() {
        Ok(scope) => scope,
        Err(e) => {
            error!(filename = %filename, error = %e, "Cannot open workspace scope");
            return UploadResponse::failed(filename, e);
        }
    };

    let outcome = match scope.stage(&document.filename, &document.bytes).await {
        Ok(staged) => classify_file(&staged, model, options).await,
        Err(e) => Err(e),
    };
    scope.sweep();

    match outcome {
        Ok(outcome) if outcome.status.has_text() => {
            UploadResponse::classified(filename, &outcome.classification)
        }
        Ok(outcome) => {
            if let ExtractionStatus::Failed(reason) = &outcome.status {
                warn!(filename = %filename, reason = %reason, "Text not extracted");
            }
            UploadResponse::not_extracted(filename)
        }
        Err(e) => {
            error!(filename = %filename, error = %e, "Classification failed");
            UploadResponse::failed(filename, e)
        }
    }
}

/// Synchronous wrapper around [`classify_upload`].
///
/// Creates a temporary tokio runtime internally.
pub fn classify_upload_sync(
    document: UploadedDocument,
    workspace: &RequestWorkspace,
    model: &ModelState,
    options: &ExtractOptions,
) -> Result<UploadResponse, ClassifyError> {
    Ok(tokio::runtime::Runtime::new()
        .map_err(|e| ClassifyError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(classify_upload(document, workspace, model, options)))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Tokenise and score normalised `text`; returns the result with the
/// tokenise and inference times in ms.
fn run_model(
    text: &str,
    model: &ModelState,
) -> Result<(ClassificationResult, u64, u64), ClassifyError> {
    if text.is_empty() {
        return Ok((ClassificationResult::unknown(), 0, 0));
    }

    let start = Instant::now();
    let input = model.encoder().encode(text)?;
    let tokenize_ms = start.elapsed().as_millis() as u64;
    info!(tokenize_ms, real_tokens = input.real_tokens(), "Tokenization finished");

    let start = Instant::now();
    let logits = model.classifier().infer(&input)?;
    let infer_ms = start.elapsed().as_millis() as u64;
    info!(infer_ms, "Inference finished");

    Ok((decode::decode(&logits), tokenize_ms, infer_ms))
}
