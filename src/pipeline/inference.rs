//! Forward pass of the sequence classifier.
//!
//! [`SequenceClassifier`] is the seam between the pipeline and the model
//! runtime. [`OnnxClassifier`] is the production implementation: one ONNX
//! Runtime session, loaded once and validated against the label table and
//! the configured sequence length before the service accepts traffic.

use crate::error::ClassifyError;
use crate::labels::DocumentLabel;
use crate::pipeline::tokenize::TokenizedInput;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Tensor, ValueType};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Raw, unnormalised per-class scores, positionally aligned with
/// [`DocumentLabel::ALL`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogitVector(pub Vec<f32>);

impl LogitVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Scores a tokenised document.
///
/// Implementations must be shareable across concurrent requests; anything
/// that needs exclusive access internally (an ONNX session) synchronises
/// itself.
pub trait SequenceClassifier: Send + Sync {
    fn infer(&self, input: &TokenizedInput) -> Result<LogitVector, ClassifyError>;

    /// Short description for startup logs.
    fn describe(&self) -> String {
        "sequence classifier".to_string()
    }
}

/// An ONNX sequence-classification model taking `input_ids` (int64) and
/// `attention_mask` (float32), both shaped `[1, max_len]`.
#[derive(Debug)]
pub struct OnnxClassifier {
    // `Session::run` needs `&mut self`.
    session: Mutex<Session>,
    model_path: PathBuf,
    max_len: usize,
}

impl OnnxClassifier {
    /// Load and validate the model at `path`.
    pub fn load(path: &Path, max_len: usize, intra_threads: usize) -> Result<Self, ClassifyError> {
        if !path.is_file() {
            return Err(ClassifyError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        let load_failed = |e: ort::Error| ClassifyError::ModelLoadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        };
        let session = Session::builder()
            .map_err(load_failed)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_failed)?
            .with_intra_threads(intra_threads.max(1))
            .map_err(load_failed)?
            .commit_from_file(path)
            .map_err(load_failed)?;

        info!(
            model = %path.display(),
            inputs = ?session.inputs.iter().map(|i| &i.name).collect::<Vec<_>>(),
            outputs = ?session.outputs.iter().map(|o| &o.name).collect::<Vec<_>>(),
            "Loaded ONNX model"
        );

        validate_session(&session, max_len)?;

        Ok(Self {
            session: Mutex::new(session),
            model_path: path.to_path_buf(),
            max_len,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl SequenceClassifier for OnnxClassifier {
    fn infer(&self, input: &TokenizedInput) -> Result<LogitVector, ClassifyError> {
        if input.len() != self.max_len {
            return Err(ClassifyError::Inference(format!(
                "input length {} != model sequence length {}",
                input.len(),
                self.max_len
            )));
        }

        let ids = Tensor::from_array(([1usize, self.max_len], input.token_ids.clone()))?;
        let mask: Vec<f32> = input.attention_mask.iter().map(|&m| m as f32).collect();
        let mask = Tensor::from_array(([1usize, self.max_len], mask))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifyError::Internal("model session lock poisoned".into()))?;
        let outputs = session.run(ort::inputs![
            "input_ids" => ids.into_dyn(),
            "attention_mask" => mask.into_dyn(),
        ])?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        debug!(shape = ?shape, "Model output");
        Ok(LogitVector(data.to_vec()))
    }

    fn describe(&self) -> String {
        format!("onnx:{} (seq_len={})", self.model_path.display(), self.max_len)
    }
}

// ── Startup validation ──────────────────────────────────────────────────────

fn validate_session(session: &Session, max_len: usize) -> Result<(), ClassifyError> {
    for (name, want) in [
        ("input_ids", TensorElementType::Int64),
        ("attention_mask", TensorElementType::Float32),
    ] {
        let input = session
            .inputs
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| ClassifyError::ArtifactMismatch(format!("model has no input '{name}'")))?;
        match &input.input_type {
            ValueType::Tensor { ty, shape, .. } => {
                if *ty != want {
                    return Err(ClassifyError::ArtifactMismatch(format!(
                        "input '{name}' is {ty:?}, expected {want:?}"
                    )));
                }
                let dims: Vec<i64> = shape.iter().copied().collect();
                check_sequence_dim(name, &dims, max_len)?;
            }
            other => {
                return Err(ClassifyError::ArtifactMismatch(format!(
                    "input '{name}' is not a tensor: {other:?}"
                )))
            }
        }
    }

    let output = session
        .outputs
        .first()
        .ok_or_else(|| ClassifyError::ArtifactMismatch("model declares no outputs".into()))?;
    if let ValueType::Tensor { shape, .. } = &output.output_type {
        let dims: Vec<i64> = shape.iter().copied().collect();
        check_label_dim(&dims)?;
    }
    Ok(())
}

/// The sequence dimension (last) must be dynamic (`-1`) or equal `max_len`.
fn check_sequence_dim(name: &str, dims: &[i64], max_len: usize) -> Result<(), ClassifyError> {
    match dims.last() {
        Some(&d) if d >= 0 && d as usize != max_len => Err(ClassifyError::ArtifactMismatch(
            format!("input '{name}' has sequence length {d}, configured max_len is {max_len}"),
        )),
        _ => Ok(()),
    }
}

/// The class dimension (last), when static, must equal the label count.
fn check_label_dim(dims: &[i64]) -> Result<(), ClassifyError> {
    match dims.last() {
        Some(&d) if d >= 0 && d as usize != DocumentLabel::COUNT => {
            Err(ClassifyError::ArtifactMismatch(format!(
                "model emits {d} classes, label table has {}",
                DocumentLabel::COUNT
            )))
        }
        _ => Ok(()),
    }
}
