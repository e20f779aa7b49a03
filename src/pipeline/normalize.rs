//! Text normalisation: collapse extracted text onto one canonical line.
//!
//! OCR output and PDF text layers are full of hard line breaks, tab stops
//! and runs of spaces that carry no meaning for the classifier. Collapsing
//! them keeps the token budget for words.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalise `input` to a single line.
///
/// 1. Runs of newlines become one space
/// 2. Any run of whitespace becomes one space
/// 3. Leading and trailing whitespace is removed
///
/// Pure, total and idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let s = RE_NEWLINES.replace_all(input, " ");
    let s = RE_WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}
