//! Configuration for the classification service.
//!
//! Every knob lives in [`ClassifierConfig`], built through its
//! [`ClassifierConfigBuilder`]. The artifact paths are read exactly once, by
//! [`crate::model::ModelState::load`] at startup; nothing in the request path
//! looks at the filesystem outside the workspace.

use crate::error::ClassifyError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sequence length the shipped BigBird classifier was exported with.
pub const DEFAULT_MAX_LEN: usize = 704;

/// Configuration for loading the model and running the pipeline.
///
/// # Example
/// ```rust
/// use edgequake_docclass::ClassifierConfig;
///
/// let config = ClassifierConfig::builder()
///     .model_path("models/bigbird_trained.onnx")
///     .tokenizer_dir("models/bigbird_trained")
///     .workspace_dir("/tmp/docclass")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_len, 704);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// ONNX model file. Default: `models/bigbird_trained.onnx`.
    pub model_path: PathBuf,

    /// Directory holding `tokenizer.json` (and optionally `config.json`).
    /// Default: `models/bigbird_trained`.
    pub tokenizer_dir: PathBuf,

    /// Fixed token sequence length fed to the model. Default: 704.
    ///
    /// Must match the sequence dimension the model was exported with when
    /// that dimension is static; checked at startup.
    pub max_len: usize,

    /// Root of the scratch directory uploads are staged in. Default: `process`.
    pub workspace_dir: PathBuf,

    /// ONNX Runtime intra-op threads. Default: 1.
    pub intra_threads: usize,

    /// OCR executable invoked for images. Default: `tesseract`.
    pub tesseract_cmd: String,

    /// Tesseract language pack. Default: `por`.
    pub ocr_language: String,

    /// Directory containing the pdfium shared library. When `None` the
    /// system library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/bigbird_trained.onnx"),
            tokenizer_dir: PathBuf::from("models/bigbird_trained"),
            max_len: DEFAULT_MAX_LEN,
            workspace_dir: PathBuf::from("process"),
            intra_threads: 1,
            tesseract_cmd: "tesseract".to_string(),
            ocr_language: "por".to_string(),
            pdfium_lib_path: None,
        }
    }
}

impl ClassifierConfig {
    /// Create a new builder for `ClassifierConfig`.
    pub fn builder() -> ClassifierConfigBuilder {
        ClassifierConfigBuilder {
            config: Self::default(),
        }
    }

    /// Path of the tokenizer definition inside [`Self::tokenizer_dir`].
    pub fn tokenizer_file(&self) -> PathBuf {
        self.tokenizer_dir.join("tokenizer.json")
    }

    /// Path of the optional model config inside [`Self::tokenizer_dir`].
    pub fn model_config_file(&self) -> PathBuf {
        self.tokenizer_dir.join("config.json")
    }

    /// The subset of settings the extractor needs.
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            tesseract_cmd: self.tesseract_cmd.clone(),
            ocr_language: self.ocr_language.clone(),
            pdfium_lib_path: self.pdfium_lib_path.clone(),
        }
    }
}

/// Builder for [`ClassifierConfig`].
#[derive(Debug)]
pub struct ClassifierConfigBuilder {
    config: ClassifierConfig,
}

impl ClassifierConfigBuilder {
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.model_path = path.into();
        self
    }

    pub fn tokenizer_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tokenizer_dir = dir.into();
        self
    }

    pub fn max_len(mut self, n: usize) -> Self {
        self.config.max_len = n;
        self
    }

    pub fn workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_dir = dir.into();
        self
    }

    pub fn intra_threads(mut self, n: usize) -> Self {
        self.config.intra_threads = n.max(1);
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn pdfium_lib_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClassifierConfig, ClassifyError> {
        let c = &self.config;
        if c.max_len < 2 {
            return Err(ClassifyError::InvalidConfig(format!(
                "max_len must be ≥ 2 (room for special tokens), got {}",
                c.max_len
            )));
        }
        if c.tesseract_cmd.trim().is_empty() {
            return Err(ClassifyError::InvalidConfig(
                "tesseract command must not be empty".into(),
            ));
        }
        if c.workspace_dir.as_os_str().is_empty() {
            return Err(ClassifyError::InvalidConfig(
                "workspace directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Settings consumed by [`crate::pipeline::extract`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    pub tesseract_cmd: String,
    pub ocr_language: String,
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ClassifierConfig::default().extract_options()
    }
}
