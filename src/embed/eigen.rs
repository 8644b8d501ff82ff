// Leading eigenpairs of a large symmetric operator
//
// Randomized subspace iteration (Halko, Martinsson & Tropp, 2011): project the
// operator onto a Gaussian test subspace, refine it with a few power
// iterations, then solve the small projected problem exactly with cyclic
// Jacobi rotations (Rayleigh-Ritz).

use ndarray::{Array1, Array2, ArrayView2};
use rand::Rng;
use rand_distr::StandardNormal;

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOL: f64 = 1e-12;

/// Eigenvalues (sorted by magnitude, descending) and matching eigenvectors
#[derive(Debug, Clone)]
pub struct EigenPairs {
    pub values: Array1<f64>,
    pub vectors: Array2<f64>,
}

/// Orthonormalize columns in place (modified Gram-Schmidt, two passes)
///
/// Columns that collapse to numerical zero are left as zero vectors.
pub fn orthonormalize(q: &mut Array2<f64>) {
    let cols = q.ncols();
    for j in 0..cols {
        for _ in 0..2 {
            for k in 0..j {
                let dot = q.column(j).dot(&q.column(k));
                let qk = q.column(k).to_owned();
                q.column_mut(j).scaled_add(-dot, &qk);
            }
        }
        let norm = q.column(j).dot(&q.column(j)).sqrt();
        if norm > 1e-12 {
            q.column_mut(j).mapv_inplace(|v| v / norm);
        } else {
            q.column_mut(j).fill(0.0);
        }
    }
}

/// All eigenpairs of a small symmetric matrix via cyclic Jacobi rotations
///
/// Returns eigenvalues unsorted, with eigenvectors as columns.
pub fn jacobi_eigh(matrix: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::eye(n);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]] * a[[i, j]])
            .sum();
        let scale: f64 = a.iter().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);
        if off <= JACOBI_TOL * JACOBI_TOL * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

/// Leading `k` eigenpairs (by magnitude) of the symmetric operator `apply`
///
/// `dim` is the operator's side length, `oversamples` extra test vectors
/// improve accuracy and `n_iter` power iterations sharpen the subspace.
pub fn randomized_eigh<F, R>(
    apply: F,
    dim: usize,
    k: usize,
    oversamples: usize,
    n_iter: usize,
    rng: &mut R,
) -> EigenPairs
where
    F: Fn(ArrayView2<f64>) -> Array2<f64>,
    R: Rng + ?Sized,
{
    let k = k.min(dim);
    let width = (k + oversamples).min(dim);

    let omega = Array2::from_shape_simple_fn((dim, width), || rng.sample::<f64, _>(StandardNormal));
    let mut q = apply(omega.view());
    orthonormalize(&mut q);
    for _ in 0..n_iter {
        q = apply(q.view());
        orthonormalize(&mut q);
    }

    let mq = apply(q.view());
    let projected = q.t().dot(&mq);
    let symmetric = (&projected + &projected.t()) * 0.5;
    let (values, small_vectors) = jacobi_eigh(&symmetric);
    let vectors = q.dot(&small_vectors);

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].abs().total_cmp(&values[a].abs()));
    order.truncate(k);

    let mut sorted_vectors = Array2::zeros((dim, order.len()));
    let mut sorted_values = Array1::zeros(order.len());
    for (dst, &src) in order.iter().enumerate() {
        sorted_values[dst] = values[src];
        let mut column = vectors.column(src).to_owned();
        // deterministic sign: largest-magnitude entry positive
        let pivot = column
            .iter()
            .copied()
            .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if pivot < 0.0 {
            column.mapv_inplace(|v| -v);
        }
        sorted_vectors.column_mut(dst).assign(&column);
    }

    EigenPairs {
        values: sorted_values,
        vectors: sorted_vectors,
    }
}
