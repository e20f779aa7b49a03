//! Subword tokenisation to a fixed-length model input.
//!
//! Every [`TokenizedInput`] produced here is exactly `max_len` long: longer
//! texts are truncated, shorter ones padded, and the attention mask marks
//! which positions hold real tokens.

use crate::error::ClassifyError;
use std::path::Path;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::debug;

/// Token ids and attention mask for one document, both of length `max_len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedInput {
    pub token_ids: Vec<i64>,
    /// `1` for real tokens, `0` for padding.
    pub attention_mask: Vec<u32>,
}

impl TokenizedInput {
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Number of non-padding positions.
    pub fn real_tokens(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }
}

/// Turns normalised text into model input.
pub trait TextEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<TokenizedInput, ClassifyError>;

    /// Fixed output length of [`TextEncoder::encode`].
    fn max_len(&self) -> usize;

    /// Size of the vocabulary, including added tokens.
    fn vocab_size(&self) -> usize;
}

/// A HuggingFace `tokenizer.json` tokenizer, truncating and padding to
/// `max_len`.
#[derive(Debug, Clone)]
pub struct HfTokenizer {
    inner: Tokenizer,
    max_len: usize,
    pad_id: u32,
}

impl HfTokenizer {
    /// Load `tokenizer.json` from `path`.
    pub fn from_file(path: &Path, max_len: usize) -> Result<Self, ClassifyError> {
        if !path.is_file() {
            return Err(ClassifyError::TokenizerNotFound {
                path: path.to_path_buf(),
            });
        }
        let tokenizer =
            Tokenizer::from_file(path).map_err(|e| ClassifyError::TokenizerLoadFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        Self::new(tokenizer, max_len)
    }

    /// Wrap an already-built tokenizer.
    ///
    /// Fails with [`ClassifyError::ArtifactMismatch`] when no padding token
    /// can be resolved.
    pub fn new(mut tokenizer: Tokenizer, max_len: usize) -> Result<Self, ClassifyError> {
        let pad_id = resolve_pad_id(&tokenizer).ok_or_else(|| {
            ClassifyError::ArtifactMismatch(
                "tokenizer declares no padding token ('<pad>' or '[PAD]')".into(),
            )
        })?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(|e| ClassifyError::InvalidConfig(format!("truncation: {e}")))?;
        // Padding is applied by `fit_to_length` so the output length never
        // depends on how the tokenizer file configures it.
        tokenizer.with_padding(None);

        Ok(Self {
            inner: tokenizer,
            max_len,
            pad_id,
        })
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }
}

impl TextEncoder for HfTokenizer {
    fn encode(&self, text: &str) -> Result<TokenizedInput, ClassifyError> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| ClassifyError::Inference(format!("tokenization failed: {e}")))?;

        let input = fit_to_length(
            encoding.get_ids(),
            encoding.get_attention_mask(),
            self.max_len,
            self.pad_id,
        );
        debug!(
            real_tokens = input.real_tokens(),
            max_len = self.max_len,
            "Tokenized"
        );
        Ok(input)
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

/// Padding id declared by the tokenizer, falling back to the usual names.
fn resolve_pad_id(tokenizer: &Tokenizer) -> Option<u32> {
    if let Some(params) = tokenizer.get_padding() {
        return Some(params.pad_id);
    }
    ["<pad>", "[PAD]"]
        .iter()
        .find_map(|t| tokenizer.token_to_id(t))
}

/// Truncate or pad `ids`/`mask` to exactly `max_len`.
pub fn fit_to_length(ids: &[u32], mask: &[u32], max_len: usize, pad_id: u32) -> TokenizedInput {
    let mut token_ids: Vec<i64> = ids.iter().take(max_len).map(|&id| id as i64).collect();
    let mut attention_mask: Vec<u32> = mask.iter().take(token_ids.len()).copied().collect();
    // Tokenizers always emit one mask entry per id; guard anyway.
    attention_mask.resize(token_ids.len(), 1);

    token_ids.resize(max_len, pad_id as i64);
    attention_mask.resize(max_len, 0);

    TokenizedInput {
        token_ids,
        attention_mask,
    }
}
