// Automatic dimension selection from a scree plot
//
// Zhu, M. & Ghodsi, A. (2006). Automatic dimensionality selection from the
// scree plot via the use of profile likelihood. CSDA, 51(2), 918-930.
//
// The sorted values are split at every position q into two groups modelled as
// normals with separate means and a pooled variance; the elbow is the split
// maximising the profile log-likelihood. Further elbows repeat the search on
// the values after the previous elbow.

use statrs::distribution::{Continuous, Normal};

/// Profile log-likelihood of splitting `values` after each position
///
/// Entry `q - 1` holds the likelihood of the split `values[..q] | values[q..]`.
pub fn profile_likelihood(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    (1..=n)
        .map(|q| {
            let (low, high) = values.split_at(q);
            let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len().max(1) as f64;
            let (mu1, mu2) = (mean(low), mean(high));
            let ss = |s: &[f64], mu: f64| s.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>();

            let dof = n.saturating_sub(1 + usize::from(q < n)).max(1);
            let sd = ((ss(low, mu1) + ss(high, mu2)) / dof as f64).sqrt();
            let sd = sd.max(f64::EPSILON);

            let log_pdf = |s: &[f64], mu: f64| match Normal::new(mu, sd) {
                Ok(normal) => s.iter().map(|&v| normal.ln_pdf(v)).sum::<f64>(),
                Err(_) => f64::NEG_INFINITY,
            };
            log_pdf(low, mu1) + log_pdf(high, mu2)
        })
        .collect()
}

/// Elbow positions (1-based counts) of `values`, sorted descending
///
/// At most `n_elbows` elbows are returned; the search stops early once fewer
/// than two values remain.
///
/// # Example
/// ```
/// use connectome_ksample::embed::select_dimension;
///
/// let values = [10.0, 9.5, 9.0, 1.0, 0.9, 0.8, 0.7];
/// assert_eq!(select_dimension(&values, 1), vec![3]);
/// ```
pub fn select_dimension(values: &[f64], n_elbows: usize) -> Vec<usize> {
    let mut elbows = Vec::with_capacity(n_elbows);
    let mut start = 0;

    for _ in 0..n_elbows {
        let remaining = &values[start..];
        if remaining.len() <= 1 {
            break;
        }
        let likelihood = profile_likelihood(remaining);
        let best = likelihood
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
                if v > bv {
                    (i, v)
                } else {
                    (bi, bv)
                }
            })
            .0;
        start += best + 1;
        elbows.push(start);
    }

    elbows
}
