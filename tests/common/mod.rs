//! Shared fixtures: a word-level tokenizer and a keyword "model" that
//! scores labels by counting their keywords in the token ids.

#![allow(dead_code)]

use edgequake_docclass::{
    ClassifyError, DocumentLabel, HfTokenizer, LogitVector, ModelState, SequenceClassifier,
    TokenizedInput,
};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokenizers::Tokenizer;

pub const MAX_LEN: usize = 32;

/// Vocabulary ids ≥ 2 are keywords; see [`keyword_label`].
pub const TOKENIZER_JSON: &str = r#"{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [],
  "normalizer": {"type": "Lowercase"},
  "pre_tokenizer": {"type": "Whitespace"},
  "post_processor": null,
  "decoder": null,
  "model": {
    "type": "WordLevel",
    "vocab": {
      "[PAD]": 0, "[UNK]": 1,
      "contrato": 2, "ata": 3, "reuniao": 4, "manual": 5,
      "empenho": 6, "certidao": 7, "aceite": 8
    },
    "unk_token": "[UNK]"
  }
}"#;

fn keyword_label(id: i64) -> Option<DocumentLabel> {
    match id {
        2 => Some(DocumentLabel::Contrato),
        3 | 4 => Some(DocumentLabel::AtaDeReuniao),
        5 => Some(DocumentLabel::Manual),
        6 => Some(DocumentLabel::NotaDeEmpenho),
        7 => Some(DocumentLabel::CertidaoNegativa),
        8 => Some(DocumentLabel::Aceite),
        _ => None,
    }
}

pub fn tokenizer() -> HfTokenizer {
    HfTokenizer::new(Tokenizer::from_str(TOKENIZER_JSON).unwrap(), MAX_LEN).unwrap()
}

/// Adds 5.0 to a label's logit per keyword occurrence; counts calls.
#[derive(Default)]
pub struct KeywordClassifier {
    pub calls: AtomicUsize,
}

impl KeywordClassifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SequenceClassifier for KeywordClassifier {
    fn infer(&self, input: &TokenizedInput) -> Result<LogitVector, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(input.token_ids.len(), MAX_LEN);
        assert_eq!(input.attention_mask.len(), MAX_LEN);

        let mut logits = vec![0.0f32; DocumentLabel::COUNT];
        for (&id, &mask) in input.token_ids.iter().zip(&input.attention_mask) {
            if mask == 1 {
                if let Some(label) = keyword_label(id) {
                    logits[label.index()] += 5.0;
                }
            }
        }
        Ok(LogitVector(logits))
    }
}

/// Always fails, to exercise the degraded-response path.
pub struct BrokenClassifier;

impl SequenceClassifier for BrokenClassifier {
    fn infer(&self, _input: &TokenizedInput) -> Result<LogitVector, ClassifyError> {
        Err(ClassifyError::Inference("tensor shape mismatch".into()))
    }
}

pub fn keyword_model() -> (ModelState, Arc<KeywordClassifier>) {
    let classifier = Arc::new(KeywordClassifier::default());
    let state = ModelState::from_parts(Arc::new(tokenizer()), classifier.clone());
    (state, classifier)
}

pub fn broken_model() -> ModelState {
    ModelState::from_parts(Arc::new(tokenizer()), Arc::new(BrokenClassifier))
}

/// Route library logs to the test harness output.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A white PNG with no text on it.
pub fn blank_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(64, 64, image::Rgb([255, 255, 255]));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}
