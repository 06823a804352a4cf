//! Scores for predicted class probabilities against integer targets

/// ROC-AUC
pub mod roc;

pub use roc::roc_auc;

/// Probabilities are clipped to this distance from 0 and 1 before taking logarithms
pub const EPSILON: f32 = 1e-7;

/// Index of the largest probability in a row
pub fn argmax(row: &[f32]) -> Option<usize> {
    row.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
            Some((_, max)) if max >= *p => best,
            _ => Some((i, *p)),
        })
        .map(|(i, _)| i)
}

/// Fraction of rows whose most probable class is the target
pub fn accuracy(targets: &[usize], probs: &[Vec<f32>]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }

    let correct = targets
        .iter()
        .zip(probs)
        .filter(|(target, row)| argmax(row) == Some(**target))
        .count();

    correct as f64 / targets.len() as f64
}

/// Mean categorical cross-entropy of the target class probabilities
pub fn categorical_crossentropy(targets: &[usize], probs: &[Vec<f32>]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }

    let total: f64 = targets
        .iter()
        .zip(probs)
        .map(|(target, row)| {
            let p = row.get(*target).copied().unwrap_or(0.0);

            -(p.clamp(EPSILON, 1.0 - EPSILON) as f64).ln()
        })
        .sum();

    total / targets.len() as f64
}
