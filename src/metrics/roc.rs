/// Area under the ROC curve of scores for a binary labeling.
///
/// Computed from the rank-sum statistic, with tied scores sharing their average rank. Returns
/// `None` unless both positives and negatives are present.
pub fn binary_auc(scores: &[f32], positives: &[bool]) -> Option<f64> {
    let n_pos = positives.iter().filter(|p| **p).count();
    let n_neg = positives.len() - n_pos;

    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));

    let mut rank_sum = 0.0;
    let mut i = 0;

    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }

        // Ranks are 1-based, ties share the mean of their span
        let rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += rank * order[i..=j].iter().filter(|k| positives[**k]).count() as f64;

        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;

    Some((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Macro-averaged one-vs-rest ROC-AUC over `n_classes` probability columns.
///
/// Classes without both positive and negative examples are left out of the average.
pub fn roc_auc(targets: &[usize], probs: &[Vec<f32>], n_classes: usize) -> Option<f64> {
    let aucs: Vec<f64> = (0..n_classes)
        .filter_map(|class| {
            let scores: Vec<f32> = probs
                .iter()
                .map(|row| row.get(class).copied().unwrap_or(0.0))
                .collect();
            let positives: Vec<bool> = targets.iter().map(|target| *target == class).collect();

            binary_auc(&scores, &positives)
        })
        .collect();

    if aucs.is_empty() {
        return None;
    }

    Some(aucs.iter().sum::<f64>() / aucs.len() as f64)
}
