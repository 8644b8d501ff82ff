// Nonparametric K-sample testing via independence tests
//
// A K-sample problem (are groups G_1..G_K drawn from the same distribution?)
// is recast as an independence problem between the pooled observations and a
// one-hot group indicator. Any consistent independence statistic then yields a
// consistent K-sample test, with the null distribution obtained by permuting
// the indicator rows.
//
// Scientific Foundation:
// [1] Panda, S., Shen, C., Perry, R., Zorn, J., Lutz, A., Priebe, C. E., &
//     Vogelstein, J. T. (2021). Nonpar MANOVA via independence testing.
// [2] Shen, C., Priebe, C. E., & Vogelstein, J. T. (2020). From distance
//     correlation to multiscale graph correlation. JASA, 115(529).
// [3] Székely, G. J., & Rizzo, M. L. (2014). Partial distance correlation with
//     methods for dissimilarities. Annals of Statistics, 42(6).
//
// Available statistics: MGC (default), unbiased distance correlation, HSIC.

mod dcorr;
mod distance;
mod hsic;
mod mgc;
mod permutation;

pub use dcorr::Dcorr;
pub use distance::{euclidean_distances, gaussian_kernel};
pub use hsic::Hsic;
pub use mgc::{Mgc, MgcStat};
pub use permutation::{permutation_null, permutation_pvalue, Workers};

use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Total sample count must exceed this for any test to run
pub const MIN_SAMPLES: usize = 5;

/// Errors raised by the K-sample test before any permutation is drawn
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestError {
    #[error("K-sample test needs at least 2 groups, got {found}")]
    TooFewGroups { found: usize },

    #[error("Number of samples is too low: need more than {required}, got {actual}")]
    TooFewSamples { required: usize, actual: usize },

    #[error("Group {index} is empty")]
    EmptyGroup { index: usize },

    #[error("Groups must share a dimension: expected {expected} columns, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Input contains NaN or infinite values")]
    NonFinite,

    #[error("Distance matrix of {0} is constant")]
    Degenerate(&'static str),

    #[error("Distribution function failed: {0}")]
    Distribution(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Result type for K-sample operations
pub type Result<T> = std::result::Result<T, TestError>;

/// Which independence statistic drives the K-sample test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    /// Multiscale Graph Correlation
    #[default]
    Mgc,
    /// Unbiased distance correlation
    Dcorr,
    /// Hilbert-Schmidt independence criterion (Gaussian kernel)
    Hsic,
}

impl TestKind {
    /// Instantiate the statistic
    pub fn build(self) -> Box<dyn IndependenceTest> {
        match self {
            TestKind::Mgc => Box::new(Mgc),
            TestKind::Dcorr => Box::new(Dcorr),
            TestKind::Hsic => Box::new(Hsic),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TestKind::Mgc => "MGC",
            TestKind::Dcorr => "Dcorr",
            TestKind::Hsic => "Hsic",
        }
    }
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An independence statistic that can be precomputed once and then
/// re-evaluated cheaply under row permutations of `y`
pub trait IndependenceTest: Send + Sync {
    /// Precompute distance (or kernel) structure for `x` and `y`
    fn prepare(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Box<dyn PreparedStatistic>>;
}

/// Statistic with its pairwise structure already computed
pub trait PreparedStatistic: Send + Sync {
    /// Number of paired observations
    fn n_samples(&self) -> usize;

    /// Statistic with `y` rows reordered so row `i` becomes `y[perm[i]]`
    fn statistic(&self, perm: &[usize]) -> f64;

    /// Statistic on the observed pairing
    fn observed(&self) -> f64 {
        let identity: Vec<usize> = (0..self.n_samples()).collect();
        self.statistic(&identity)
    }
}

/// Outcome of a K-sample permutation test
#[derive(Debug, Clone)]
pub struct KSampleResult {
    /// Observed test statistic
    pub statistic: f64,

    /// Permutation p-value, `(1 + #{null >= statistic}) / (1 + reps)`
    pub pvalue: f64,

    /// Statistics under permuted group labels
    pub null_distribution: Vec<f64>,
}

/// Stack groups into a pooled sample `x` and a one-hot indicator `y`
///
/// # Example
/// ```
/// use connectome_ksample::ksample::k_sample_transform;
/// use ndarray::array;
///
/// let a = array![[0.0, 1.0], [2.0, 3.0]];
/// let b = array![[4.0, 5.0]];
/// let (x, y) = k_sample_transform(&[a, b]).unwrap();
/// assert_eq!(x.nrows(), 3);
/// assert_eq!(y.row(2).to_vec(), vec![0.0, 1.0]);
/// ```
pub fn k_sample_transform(groups: &[Array2<f64>]) -> Result<(Array2<f64>, Array2<f64>)> {
    if groups.len() < 2 {
        return Err(TestError::TooFewGroups {
            found: groups.len(),
        });
    }

    let dim = groups[0].ncols();
    for (index, group) in groups.iter().enumerate() {
        if group.nrows() == 0 {
            return Err(TestError::EmptyGroup { index });
        }
        if group.ncols() != dim {
            return Err(TestError::DimensionMismatch {
                expected: dim,
                found: group.ncols(),
            });
        }
    }

    let n: usize = groups.iter().map(|g| g.nrows()).sum();
    let k = groups.len();
    let mut x = Array2::zeros((n, dim));
    let mut y = Array2::zeros((n, k));
    let mut row = 0;
    for (label, group) in groups.iter().enumerate() {
        let rows = group.nrows();
        x.slice_mut(s![row..row + rows, ..]).assign(group);
        y.slice_mut(s![row..row + rows, label]).fill(1.0);
        row += rows;
    }

    Ok((x, y))
}

/// Permutation K-sample test
///
/// # Example
/// ```
/// use connectome_ksample::ksample::{KSample, TestKind};
/// use ndarray::Array2;
///
/// let a = Array2::from_shape_fn((10, 2), |(i, j)| (i * 2 + j) as f64 * 0.1);
/// let b = Array2::from_shape_fn((10, 2), |(i, j)| 5.0 + (i * 2 + j) as f64 * 0.1);
/// let result = KSample::new(TestKind::Dcorr)
///     .with_reps(200)
///     .with_seed(7)
///     .test(&[a, b])
///     .unwrap();
/// assert!(result.pvalue < 0.05);
/// ```
#[derive(Debug, Clone)]
pub struct KSample {
    kind: TestKind,
    reps: usize,
    workers: Workers,
    seed: u64,
}

impl KSample {
    pub fn new(kind: TestKind) -> Self {
        Self {
            kind,
            reps: 1000,
            workers: Workers::All,
            seed: 0,
        }
    }

    pub fn with_reps(mut self, reps: usize) -> Self {
        self.reps = reps;
        self
    }

    pub fn with_workers(mut self, workers: Workers) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn kind(&self) -> TestKind {
        self.kind
    }

    pub fn reps(&self) -> usize {
        self.reps
    }

    /// Run the test on two or more groups of equal dimension
    pub fn test(&self, groups: &[Array2<f64>]) -> Result<KSampleResult> {
        let (x, y) = k_sample_transform(groups)?;

        if x.nrows() <= MIN_SAMPLES {
            return Err(TestError::TooFewSamples {
                required: MIN_SAMPLES,
                actual: x.nrows(),
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(TestError::NonFinite);
        }

        let prepared = self.kind.build().prepare(x.view(), y.view())?;
        let statistic = prepared.observed();
        let null_distribution =
            permutation_null(prepared.as_ref(), self.reps, self.seed, self.workers)?;
        let pvalue = permutation_pvalue(statistic, &null_distribution);

        tracing::trace!(
            test = %self.kind,
            n = x.nrows(),
            groups = groups.len(),
            statistic,
            pvalue,
            "k-sample test"
        );

        Ok(KSampleResult {
            statistic,
            pvalue,
            null_distribution,
        })
    }
}

/// Reject inputs whose off-diagonal distances are all identical
pub(crate) fn ensure_not_constant(dist: &Array2<f64>, which: &'static str) -> Result<()> {
    let n = dist.nrows();
    if n < 2 {
        return Err(TestError::Degenerate(which));
    }
    let first = dist[[0, 1]];
    let constant = (0..n).all(|i| {
        (0..n)
            .filter(|&j| j != i)
            .all(|j| (dist[[i, j]] - first).abs() <= f64::EPSILON * first.abs().max(1.0))
    });
    if constant {
        Err(TestError::Degenerate(which))
    } else {
        Ok(())
    }
}
