// Omnibus joint embedding of multiple graphs
//
// All graphs on a shared vertex set are embedded into one latent space by
// factorising the omnibus matrix, whose (i, j) block is (A_i + A_j) / 2. Row
// block g of the scaled leading eigenvectors gives the latent positions of
// graph g, so positions of the same vertex are directly comparable across
// graphs.
//
// Scientific Foundation:
// [1] Levin, K., Athreya, A., Tang, M., Lyzinski, V., & Priebe, C. E. (2017).
//     A central limit theorem for an omnibus embedding of multiple random
//     dot product graphs. ICDMW.
// [2] Halko, N., Martinsson, P. G., & Tropp, J. A. (2011). Finding structure
//     with randomness. SIAM Review, 53(2), 217-288.
// [3] Zhu, M. & Ghodsi, A. (2006). Automatic dimensionality selection from
//     the scree plot via the use of profile likelihood.

mod dimension;
mod eigen;
mod omnibus;

pub use dimension::{profile_likelihood, select_dimension};
pub use eigen::{jacobi_eigh, orthonormalize, randomized_eigh, EigenPairs};
pub use omnibus::{augment_diagonal, is_connected, OmnibusOperator};

use ndarray::{Array2, Array3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbedError {
    #[error("no graphs to embed")]
    NoGraphs,

    #[error("graph {index} is {rows}x{cols}, expected {expected}x{expected}")]
    ShapeMismatch {
        index: usize,
        rows: usize,
        cols: usize,
        expected: usize,
    },

    #[error("graph {index} contains NaN or infinite weights")]
    NonFinite { index: usize },

    #[error("omnibus matrix has no non-zero spectrum")]
    ZeroSpectrum,
}

pub type Result<T> = std::result::Result<T, EmbedError>;

/// Omnibus embedding with automatic dimension selection
#[derive(Debug, Clone)]
pub struct OmnibusEmbed {
    n_components: Option<usize>,
    n_elbows: usize,
    diag_aug: bool,
    n_iter: usize,
    oversamples: usize,
    seed: u64,
}

impl Default for OmnibusEmbed {
    fn default() -> Self {
        Self {
            n_components: None,
            n_elbows: 2,
            diag_aug: true,
            n_iter: 5,
            oversamples: 10,
            seed: 0,
        }
    }
}

impl OmnibusEmbed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the embedding dimension instead of selecting it from the elbows
    pub fn with_n_components(mut self, n_components: usize) -> Self {
        self.n_components = Some(n_components);
        self
    }

    pub fn with_n_elbows(mut self, n_elbows: usize) -> Self {
        self.n_elbows = n_elbows.max(1);
        self
    }

    pub fn with_diag_aug(mut self, diag_aug: bool) -> Self {
        self.diag_aug = diag_aug;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Latent positions of shape `(n_graphs, n_vertices, d)`
    pub fn fit_transform(&self, graphs: &[Array2<f64>]) -> Result<Array3<f64>> {
        let n = validate(graphs)?;
        let m = graphs.len();

        if !graphs.iter().all(is_connected) {
            warn!("Input graphs are not fully connected. Results may not be optimal. You can compute the largest connected component by using the largest connected component of each graph");
        }

        let prepared: Vec<Array2<f64>> = graphs
            .iter()
            .map(|g| {
                let g = if g == &g.t() {
                    g.clone()
                } else {
                    debug!("symmetrizing directed graph");
                    (g + &g.t()) * 0.5
                };
                if self.diag_aug {
                    augment_diagonal(&g)
                } else {
                    g
                }
            })
            .collect();

        let operator = OmnibusOperator::new(prepared);
        let dim = operator.dim();
        let candidates = match self.n_components {
            Some(k) => k.min(dim),
            None => ((dim as f64).log2().ceil() as usize).clamp(1, dim),
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let pairs = randomized_eigh(
            |x| operator.apply(x),
            dim,
            candidates,
            self.oversamples,
            self.n_iter,
            &mut rng,
        );

        let magnitudes: Vec<f64> = pairs.values.iter().map(|v| v.abs()).collect();
        if magnitudes.first().map_or(true, |&v| v <= f64::EPSILON) {
            return Err(EmbedError::ZeroSpectrum);
        }

        let d = match self.n_components {
            Some(k) => k.min(magnitudes.len()),
            None => select_dimension(&magnitudes, self.n_elbows)
                .last()
                .copied()
                .unwrap_or(1),
        };
        info!(
            graphs = m,
            vertices = n,
            candidates,
            dimension = d,
            "omnibus embedding"
        );

        let mut latent = Array3::zeros((m, n, d));
        for c in 0..d {
            let scale = magnitudes[c].sqrt();
            for g in 0..m {
                for v in 0..n {
                    latent[[g, v, c]] = pairs.vectors[[g * n + v, c]] * scale;
                }
            }
        }
        Ok(latent)
    }
}

/// Common vertex count of a non-empty list of finite square graphs
fn validate(graphs: &[Array2<f64>]) -> Result<usize> {
    let first = graphs.first().ok_or(EmbedError::NoGraphs)?;
    let n = first.nrows();
    for (index, graph) in graphs.iter().enumerate() {
        if graph.nrows() != n || graph.ncols() != n {
            return Err(EmbedError::ShapeMismatch {
                index,
                rows: graph.nrows(),
                cols: graph.ncols(),
                expected: n,
            });
        }
        if graph.iter().any(|v| !v.is_finite()) {
            return Err(EmbedError::NonFinite { index });
        }
    }
    Ok(n)
}
