// Truncated normal sampling
//
// Inverse-CDF sampling on the truncated interval: draw u ~ U(0, 1) and map it
// through Φ⁻¹(Φ(α) + u (Φ(β) - Φ(α))), with α, β the standardised bounds.
// One uniform draw per sample keeps the stream layout predictable for seeded
// reproduction.

use anyhow::{bail, Result};
use rand::Rng;
use statrs::distribution::{ContinuousCDF, Normal};

/// Normal distribution restricted to `[lower, upper]`
#[derive(Debug, Clone)]
pub struct TruncatedNormal {
    mu: f64,
    sigma: f64,
    cdf_lower: f64,
    cdf_upper: f64,
    standard: Normal,
}

impl TruncatedNormal {
    /// Truncated normal with location `mu`, scale `sigma`, support `[lower, upper]`
    pub fn new(mu: f64, sigma: f64, lower: f64, upper: f64) -> Result<Self> {
        if !(sigma > 0.0) {
            bail!("sigma must be positive, got {}", sigma);
        }
        if !(lower < upper) {
            bail!("lower bound {} must be below upper bound {}", lower, upper);
        }

        let standard = Normal::new(0.0, 1.0).map_err(|e| anyhow::anyhow!("{}", e))?;
        let cdf_lower = standard.cdf((lower - mu) / sigma);
        let cdf_upper = standard.cdf((upper - mu) / sigma);
        if cdf_upper - cdf_lower <= 0.0 {
            bail!(
                "interval [{}, {}] carries no mass for N({}, {}^2)",
                lower,
                upper,
                mu,
                sigma
            );
        }

        Ok(Self {
            mu,
            sigma,
            cdf_lower,
            cdf_upper,
            standard,
        })
    }

    /// Draw a single value
    pub fn sample_one<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.gen();
        let p = self.cdf_lower + u * (self.cdf_upper - self.cdf_lower);
        self.mu + self.sigma * self.standard.inverse_cdf(p)
    }

    /// Draw `n` values
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.sample_one(rng)).collect()
    }
}
