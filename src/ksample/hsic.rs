// Hilbert-Schmidt independence criterion
//
// Gaussian kernels (median heuristic) are mapped to dissimilarities
// 1 - K/max(K), after which HSIC coincides with distance correlation on the
// induced metric (Sejdinovic et al. 2013, "Equivalence of distance-based and
// RKHS-based statistics in hypothesis testing").

use super::dcorr::DcorrPrepared;
use super::distance::{gaussian_kernel, kernel_to_distance};
use super::{ensure_not_constant, IndependenceTest, PreparedStatistic, Result, TestError};
use ndarray::ArrayView2;

/// Kernel independence statistic (HSIC)
#[derive(Debug, Clone, Copy, Default)]
pub struct Hsic;

impl IndependenceTest for Hsic {
    fn prepare(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Box<dyn PreparedStatistic>> {
        let kernx = gaussian_kernel(x).ok_or(TestError::Degenerate("x"))?;
        let kerny = gaussian_kernel(y).ok_or(TestError::Degenerate("y"))?;
        let distx = kernel_to_distance(&kernx);
        let disty = kernel_to_distance(&kerny);
        ensure_not_constant(&distx, "x")?;
        ensure_not_constant(&disty, "y")?;
        Ok(Box::new(DcorrPrepared::from_distances(&distx, &disty)?))
    }
}
