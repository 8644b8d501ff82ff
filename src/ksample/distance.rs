// Pairwise distance and kernel matrices

use ndarray::{Array2, ArrayView2};

/// Euclidean distance matrix between the rows of `x`
pub fn euclidean_distances(x: ArrayView2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut dist = Array2::zeros((n, n));
    for i in 0..n {
        let xi = x.row(i);
        for j in (i + 1)..n {
            let d = xi
                .iter()
                .zip(x.row(j).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            dist[[i, j]] = d;
            dist[[j, i]] = d;
        }
    }
    dist
}

/// Median of the strictly positive off-diagonal distances
///
/// Returns `None` when every pair of rows coincides.
pub fn median_distance(dist: &Array2<f64>) -> Option<f64> {
    let n = dist.nrows();
    let mut values: Vec<f64> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .map(|(i, j)| dist[[i, j]])
        .filter(|d| *d > 0.0)
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Gaussian kernel matrix with the median heuristic bandwidth
///
/// `k(a, b) = exp(-gamma * |a - b|^2)` with `gamma = 1 / (2 * median^2)`.
/// Returns `None` when all rows are identical.
pub fn gaussian_kernel(x: ArrayView2<f64>) -> Option<Array2<f64>> {
    let dist = euclidean_distances(x);
    let median = median_distance(&dist)?;
    let gamma = 1.0 / (2.0 * median * median);
    Some(dist.mapv(|d| (-gamma * d * d).exp()))
}

/// Convert a kernel matrix into a dissimilarity, `1 - K / max(K)`
pub fn kernel_to_distance(kernel: &Array2<f64>) -> Array2<f64> {
    let max = kernel.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max <= 0.0 {
        return Array2::zeros(kernel.raw_dim());
    }
    kernel.mapv(|k| 1.0 - k / max)
}
