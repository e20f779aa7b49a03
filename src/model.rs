//! Process-wide model state.
//!
//! [`ModelState`] is built once at startup and shared as `Arc<ModelState>`
//! by every request. Nothing mutates it afterwards. A failure while building
//! it is fatal: the service must not start without a working model.

use crate::config::ClassifierConfig;
use crate::error::ClassifyError;
use crate::labels::DocumentLabel;
use crate::pipeline::inference::{OnnxClassifier, SequenceClassifier};
use crate::pipeline::tokenize::{HfTokenizer, TextEncoder};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Tokenizer and classifier, loaded together and checked against each other.
#[derive(Clone)]
pub struct ModelState {
    encoder: Arc<dyn TextEncoder>,
    classifier: Arc<dyn SequenceClassifier>,
}

impl std::fmt::Debug for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelState")
            .field("max_len", &self.encoder.max_len())
            .field("vocab_size", &self.encoder.vocab_size())
            .field("classifier", &self.classifier.describe())
            .finish()
    }
}

impl ModelState {
    /// Load the tokenizer and ONNX model named by `config`.
    ///
    /// # Errors
    /// Every error returned here is startup-fatal
    /// ([`ClassifyError::is_startup_fatal`]).
    pub fn load(config: &ClassifierConfig) -> Result<Self, ClassifyError> {
        let start = Instant::now();

        let tokenizer = HfTokenizer::from_file(&config.tokenizer_file(), config.max_len)?;
        info!(
            tokenizer = %config.tokenizer_file().display(),
            vocab_size = tokenizer.vocab_size(),
            pad_id = tokenizer.pad_id(),
            "Loaded tokenizer"
        );

        let config_file = config.model_config_file();
        if config_file.is_file() {
            check_model_config(&config_file, tokenizer.vocab_size())?;
        } else {
            debug!(path = %config_file.display(), "No model config.json; skipping vocab checks");
        }

        let classifier =
            OnnxClassifier::load(&config.model_path, config.max_len, config.intra_threads)?;

        let state = Self::from_parts(Arc::new(tokenizer), Arc::new(classifier));
        state.warm_up()?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            max_len = config.max_len,
            labels = DocumentLabel::COUNT,
            "Model ready"
        );
        Ok(state)
    }

    /// Assemble a state from already-loaded parts, without validation.
    pub fn from_parts(
        encoder: Arc<dyn TextEncoder>,
        classifier: Arc<dyn SequenceClassifier>,
    ) -> Self {
        Self {
            encoder,
            classifier,
        }
    }

    /// Run one forward pass on empty input and check the output width.
    pub fn warm_up(&self) -> Result<(), ClassifyError> {
        let start = Instant::now();
        let logits = self
            .encoder
            .encode("")
            .and_then(|input| self.classifier.infer(&input))
            .map_err(|e| ClassifyError::ArtifactMismatch(format!("warm-up pass failed: {e}")))?;

        if logits.len() != DocumentLabel::COUNT {
            return Err(ClassifyError::ArtifactMismatch(format!(
                "model produced {} logits, label table has {}",
                logits.len(),
                DocumentLabel::COUNT
            )));
        }
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Warm-up pass finished");
        Ok(())
    }

    pub fn encoder(&self) -> &dyn TextEncoder {
        self.encoder.as_ref()
    }

    pub fn classifier(&self) -> &dyn SequenceClassifier {
        self.classifier.as_ref()
    }

    pub fn max_len(&self) -> usize {
        self.encoder.max_len()
    }
}

/// Cross-check the HuggingFace `config.json` shipped next to the tokenizer.
fn check_model_config(path: &Path, tokenizer_vocab: usize) -> Result<(), ClassifyError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ClassifyError::ModelLoadFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let config: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| ClassifyError::ModelLoadFailed {
            path: path.to_path_buf(),
            detail: format!("invalid JSON: {e}"),
        })?;

    if let Some(vocab) = config["vocab_size"].as_u64() {
        if (vocab as usize) < tokenizer_vocab {
            return Err(ClassifyError::ArtifactMismatch(format!(
                "tokenizer has {tokenizer_vocab} tokens but the model embeds only {vocab}"
            )));
        }
    }

    let labels = config["num_labels"]
        .as_u64()
        .map(|n| n as usize)
        .or_else(|| config["id2label"].as_object().map(|m| m.len()));
    if let Some(n) = labels {
        if n != DocumentLabel::COUNT {
            return Err(ClassifyError::ArtifactMismatch(format!(
                "model config declares {n} labels, label table has {}",
                DocumentLabel::COUNT
            )));
        }
    }
    Ok(())
}
