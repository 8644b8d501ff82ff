// Unbiased distance correlation
//
// Distance matrices are U-centered (Székely & Rizzo 2014):
//   Ã_ij = a_ij - a_i./(n-2) - a_.j/(n-2) + a_../((n-1)(n-2)),   Ã_ii = 0
// and the statistic is <Ã, B̃> / sqrt(<Ã, Ã> <B̃, B̃>). The 1/(n(n-3))
// normalisation of the unbiased covariance cancels in the ratio.

use super::distance::euclidean_distances;
use super::{ensure_not_constant, IndependenceTest, PreparedStatistic, Result, TestError};
use ndarray::{Array2, ArrayView2, Axis};

/// Unbiased distance correlation (Dcorr)
#[derive(Debug, Clone, Copy, Default)]
pub struct Dcorr;

impl IndependenceTest for Dcorr {
    fn prepare(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Box<dyn PreparedStatistic>> {
        let distx = euclidean_distances(x);
        let disty = euclidean_distances(y);
        ensure_not_constant(&distx, "x")?;
        ensure_not_constant(&disty, "y")?;
        Ok(Box::new(DcorrPrepared::from_distances(&distx, &disty)?))
    }
}

/// U-centered distance matrices ready for permutation
pub(crate) struct DcorrPrepared {
    a: Array2<f64>,
    b: Array2<f64>,
    norm: f64,
}

impl DcorrPrepared {
    pub(crate) fn from_distances(distx: &Array2<f64>, disty: &Array2<f64>) -> Result<Self> {
        let a = u_center(distx);
        let b = u_center(disty);
        let norm = (frobenius_sq(&a) * frobenius_sq(&b)).sqrt();
        if !norm.is_finite() || norm <= f64::EPSILON {
            return Err(TestError::Degenerate("x or y"));
        }
        Ok(Self { a, b, norm })
    }
}

impl PreparedStatistic for DcorrPrepared {
    fn n_samples(&self) -> usize {
        self.a.nrows()
    }

    fn statistic(&self, perm: &[usize]) -> f64 {
        let n = self.a.nrows();
        let mut cov = 0.0;
        for i in 0..n {
            let pi = perm[i];
            for j in 0..n {
                cov += self.a[[i, j]] * self.b[[pi, perm[j]]];
            }
        }
        cov / self.norm
    }
}

/// U-centering of a distance matrix (diagonal forced to zero)
pub(crate) fn u_center(dist: &Array2<f64>) -> Array2<f64> {
    let n = dist.nrows();
    let nf = n as f64;
    let row_sums = dist.sum_axis(Axis(1));
    let col_sums = dist.sum_axis(Axis(0));
    let total = dist.sum();

    let mut centered = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            if i != j {
                centered[[i, j]] = dist[[i, j]] - row_sums[i] / (nf - 2.0) - col_sums[j] / (nf - 2.0)
                    + total / ((nf - 1.0) * (nf - 2.0));
            }
        }
    }
    centered
}

fn frobenius_sq(m: &Array2<f64>) -> f64 {
    m.iter().map(|v| v * v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_u_center_rows_sum_to_zero() {
        let x = Array2::from_shape_fn((6, 1), |(i, _)| (i * i) as f64);
        let d = euclidean_distances(x.view());
        let c = u_center(&d);
        for i in 0..6 {
            let row_sum: f64 = c.row(i).sum();
            assert!(row_sum.abs() < 1e-9, "row {} sums to {}", i, row_sum);
        }
    }

    #[test]
    fn test_dcorr_perfect_linear_dependence() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let y = x.mapv(|v| 2.0 * v + 1.0);
        let prepared = Dcorr.prepare(x.view(), y.view()).unwrap();
        assert!((prepared.observed() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dcorr_constant_input_is_degenerate() {
        let x = Array2::from_elem((8, 2), 3.0);
        let y = Array2::from_shape_fn((8, 1), |(i, _)| i as f64);
        assert!(matches!(
            Dcorr.prepare(x.view(), y.view()),
            Err(TestError::Degenerate("x"))
        ));
    }

    #[test]
    fn test_dcorr_permutation_changes_statistic() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = x.clone();
        let prepared = Dcorr.prepare(x.view(), y.view()).unwrap();
        let reversed: Vec<usize> = (0..10).rev().collect();
        // reversing a line is still an isometry of the distances
        assert!((prepared.statistic(&reversed) - 1.0).abs() < 1e-9);
        let shuffled = vec![3, 7, 1, 9, 0, 5, 2, 8, 4, 6];
        assert!(prepared.statistic(&shuffled) < 0.9);
    }
}
