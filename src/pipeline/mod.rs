//! Pipeline stages for document classification.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the model runtime can be swapped behind the
//! [`tokenize::TextEncoder`] and [`inference::SequenceClassifier`] traits.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ normalize ──▶ tokenize ──▶ inference ──▶ decode
//! (by ext)    (whitespace)  (fixed len)  (ONNX)        (softmax)
//! ```
//!
//! 1. [`extract`]: read text from the staged file; runs in
//!    `spawn_blocking` because pdfium, OCR and archive parsing block
//! 2. [`normalize`]: collapse newlines and whitespace runs to single spaces
//! 3. [`tokenize`]: subword ids and attention mask, truncated and padded
//!    to `max_len`
//! 4. [`inference`]: one forward pass producing a logit per label
//! 5. [`decode`]: softmax and argmax onto the label table
//!
//! An empty text after step 2 stops the pipeline: steps 3–5 never run and
//! the document is reported as `UNKNOWN` with confidence `0.0`.

pub mod decode;
pub mod extract;
pub mod inference;
pub mod normalize;
pub mod tokenize;
