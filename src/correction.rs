//! Holm step-down correction for multiple comparisons
//!
//! Holm, S. (1979). A simple sequentially rejective multiple test procedure.
//! Scandinavian Journal of Statistics, 6(2), 65-70.

/// Rank of each p-value in descending order, ties taking the highest rank
///
/// The largest p-value gets rank 1 and the smallest gets rank `n`, so
/// multiplying by the rank gives Holm's `(n - i + 1)` factor for the `i`-th
/// smallest value.
pub fn rank_descending_max(pvalues: &[f64]) -> Vec<usize> {
    pvalues
        .iter()
        .map(|&p| pvalues.iter().filter(|&&q| q >= p).count())
        .collect()
}

/// Holm-adjusted p-values, in input order
///
/// Each p-value is multiplied by its descending rank, made non-decreasing
/// along ascending p (step-down running maximum) and clipped to 1. NaN inputs
/// stay NaN and do not take part in the ranking.
///
/// # Example
/// ```
/// use connectome_ksample::correction::holm;
///
/// let adjusted = holm(&[0.01, 0.04, 0.03, 0.5]);
/// assert_eq!(adjusted, vec![0.04, 0.09, 0.09, 0.5]);
/// ```
pub fn holm(pvalues: &[f64]) -> Vec<f64> {
    let finite: Vec<usize> = (0..pvalues.len())
        .filter(|&i| !pvalues[i].is_nan())
        .collect();
    let values: Vec<f64> = finite.iter().map(|&i| pvalues[i]).collect();
    let ranks = rank_descending_max(&values);

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut adjusted = vec![f64::NAN; pvalues.len()];
    let mut running = 0.0f64;
    for &k in &order {
        running = running.max(values[k] * ranks[k] as f64);
        adjusted[finite[k]] = running.min(1.0);
    }
    adjusted
}
