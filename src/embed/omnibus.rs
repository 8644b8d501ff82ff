// Implicit omnibus matrix and graph preprocessing

use ndarray::{Array2, ArrayView2, Axis};
use std::collections::VecDeque;

/// Remove self-loops and put the scaled degree on the diagonal
///
/// Each diagonal entry becomes the mean of in- and out-degree divided by
/// `n - 1`, which fills the diagonal with the expected edge weight of the
/// vertex instead of zero.
pub fn augment_diagonal(graph: &Array2<f64>) -> Array2<f64> {
    let n = graph.nrows();
    let mut augmented = graph.clone();
    augmented.diag_mut().fill(0.0);

    if n < 2 {
        return augmented;
    }

    let out_degree = augmented.sum_axis(Axis(1));
    let in_degree = augmented.sum_axis(Axis(0));
    let divisor = (n - 1) as f64;
    for i in 0..n {
        augmented[[i, i]] = (out_degree[i] + in_degree[i]) / 2.0 / divisor;
    }
    augmented
}

/// Whether every vertex is reachable, treating edges as undirected
pub fn is_connected(graph: &Array2<f64>) -> bool {
    let n = graph.nrows();
    if n == 0 {
        return true;
    }

    let mut seen = vec![false; n];
    let mut queue = VecDeque::from([0]);
    seen[0] = true;
    let mut reached = 1;

    while let Some(u) = queue.pop_front() {
        for v in 0..n {
            if !seen[v] && (graph[[u, v]] != 0.0 || graph[[v, u]] != 0.0) {
                seen[v] = true;
                reached += 1;
                queue.push_back(v);
            }
        }
    }

    reached == n
}

/// The omnibus matrix of `m` graphs on `n` vertices, never materialised
///
/// Block `(i, j)` of the `mn × mn` matrix is `(A_i + A_j) / 2`. Applying it to
/// a stacked vector `x = [x_1; ...; x_m]` gives
/// `(M x)_i = (A_i Σ_j x_j + Σ_j A_j x_j) / 2`, which costs `2m` products with
/// `n × n` matrices instead of `m²`.
#[derive(Debug, Clone)]
pub struct OmnibusOperator {
    graphs: Vec<Array2<f64>>,
    n_vertices: usize,
}

impl OmnibusOperator {
    /// Caller guarantees a non-empty list of equally sized square matrices
    pub fn new(graphs: Vec<Array2<f64>>) -> Self {
        let n_vertices = graphs.first().map_or(0, |g| g.nrows());
        Self { graphs, n_vertices }
    }

    pub fn n_graphs(&self) -> usize {
        self.graphs.len()
    }

    pub fn n_vertices(&self) -> usize {
        self.n_vertices
    }

    /// Side length of the omnibus matrix
    pub fn dim(&self) -> usize {
        self.graphs.len() * self.n_vertices
    }

    /// `M X` for a block of column vectors `X` with `dim()` rows
    pub fn apply(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let n = self.n_vertices;
        let cols = x.ncols();
        let block = |i: usize| x.slice(ndarray::s![i * n..(i + 1) * n, ..]);

        let mut sum_x = Array2::<f64>::zeros((n, cols));
        let mut sum_ax = Array2::<f64>::zeros((n, cols));
        for (i, graph) in self.graphs.iter().enumerate() {
            let xi = block(i);
            sum_x += &xi;
            sum_ax += &graph.dot(&xi);
        }

        let mut out = Array2::zeros((self.dim(), cols));
        for (i, graph) in self.graphs.iter().enumerate() {
            let mut rows = out.slice_mut(ndarray::s![i * n..(i + 1) * n, ..]);
            rows.assign(&graph.dot(&sum_x));
            rows += &sum_ax;
            rows *= 0.5;
        }
        out
    }

    /// Dense omnibus matrix, for small problems and tests
    pub fn to_dense(&self) -> Array2<f64> {
        let n = self.n_vertices;
        let mut dense = Array2::zeros((self.dim(), self.dim()));
        for (i, a) in self.graphs.iter().enumerate() {
            for (j, b) in self.graphs.iter().enumerate() {
                let mut block = dense.slice_mut(ndarray::s![i * n..(i + 1) * n, j * n..(j + 1) * n]);
                block.assign(a);
                block += b;
                block *= 0.5;
            }
        }
        dense
    }
}
