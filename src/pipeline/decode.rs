//! Logits → label and confidence.

use crate::labels::DocumentLabel;
use crate::output::ClassificationResult;
use crate::pipeline::inference::LogitVector;

/// Numerically stable softmax. Returns an empty vector for empty input.
///
/// `+inf` logits split the whole mass evenly between them. A NaN logit, or a
/// vector with no finite maximum, yields all zeros.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::INFINITY && !logits.iter().any(|l| l.is_nan()) {
        let winners = logits.iter().filter(|&&l| l == f32::INFINITY).count() as f32;
        return logits
            .iter()
            .map(|&l| if l == f32::INFINITY { 1.0 / winners } else { 0.0 })
            .collect();
    }
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

/// Pick the most probable label.
///
/// Ties go to the lowest index. An argmax beyond the label table (a model
/// wider than the table) and an empty or non-finite vector both decode to
/// [`DocumentLabel::Unknown`].
pub fn decode(logits: &LogitVector) -> ClassificationResult {
    let probs = softmax(logits.as_slice());

    let best = probs
        .iter()
        .enumerate()
        .fold(None::<(usize, f32)>, |best, (i, &p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ if p.is_nan() || p <= 0.0 => best,
            _ => Some((i, p)),
        });

    match best {
        Some((idx, confidence)) => ClassificationResult {
            label: DocumentLabel::from_index_or_unknown(idx),
            confidence,
        },
        None => ClassificationResult::unknown(),
    }
}
