// Multiscale Graph Correlation
//
// For every pair of neighbourhood sizes (k, l) MGC computes a local distance
// correlation restricted to the k nearest neighbours in x and the l nearest
// neighbours in y. The statistic is the largest local correlation inside the
// biggest connected region of "significant" scales, falling back to the
// global correlation when that region is too small to trust.
//
// Scientific Foundation:
// [2] Shen, C., Priebe, C. E., & Vogelstein, J. T. (2020). From distance
//     correlation to multiscale graph correlation. JASA, 115(529), 280-291.
// [4] Vogelstein, J. T., et al. (2019). Discovering and deciphering
//     relationships across disparate data modalities. eLife, 8, e41690.

use super::distance::euclidean_distances;
use super::{ensure_not_constant, IndependenceTest, PreparedStatistic, Result, TestError};
use ndarray::{Array2, ArrayView2};
use statrs::distribution::{Beta, ContinuousCDF};
use std::collections::VecDeque;

/// Empirical constant for both the significance percentile and the minimum
/// region area
const REGION_FRACTION: f64 = 0.02;

/// Multiscale Graph Correlation
#[derive(Debug, Clone, Copy, Default)]
pub struct Mgc;

/// MGC statistic with its diagnostics
#[derive(Debug, Clone)]
pub struct MgcStat {
    /// The MGC test statistic
    pub statistic: f64,

    /// 1-based (k, l) neighbourhood sizes that attain the statistic
    pub optimal_scale: (usize, usize),

    /// Local correlation map, one entry per (k, l)
    pub local_correlations: Array2<f64>,
}

impl Mgc {
    /// Statistic, optimal scale and local correlation map for `(x, y)`
    pub fn compute(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<MgcStat> {
        let prepared = MgcPrepared::new(x, y)?;
        let identity: Vec<usize> = (0..prepared.n).collect();
        let map = prepared.local_correlations(&identity);
        let (statistic, optimal_scale) = prepared.smoothed_statistic(&map);
        Ok(MgcStat {
            statistic,
            optimal_scale,
            local_correlations: map,
        })
    }
}

impl IndependenceTest for Mgc {
    fn prepare(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Box<dyn PreparedStatistic>> {
        Ok(Box::new(MgcPrepared::new(x, y)?))
    }
}

/// Column-centered distances and their ranks for one variable
struct Centered {
    values: Array2<f64>,
    ranks: Array2<usize>,
    levels: usize,
    /// Cumulative sum of entries by rank level
    expectation: Vec<f64>,
    /// Cumulative local variance at each rank level
    variance: Vec<f64>,
}

impl Centered {
    fn new(dist: &Array2<f64>) -> Self {
        let n = dist.nrows();
        let values = column_center(dist);
        let (ranks, levels) = column_ranks(dist);

        let mut expectation = vec![0.0; levels];
        let mut self_cov = Array2::<f64>::zeros((levels, levels));
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                expectation[ranks[[i, j]]] += values[[i, j]];
                self_cov[[ranks[[i, j]], ranks[[j, i]]]] += values[[i, j]] * values[[j, i]];
            }
        }
        cumulative_sum(&mut expectation);
        cumulative_sum_2d(&mut self_cov);

        let n_sq = (n * n) as f64;
        let variance = (0..levels)
            .map(|k| self_cov[[k, k]] - expectation[k] * expectation[k] / n_sq)
            .collect();

        Self {
            values,
            ranks,
            levels,
            expectation,
            variance,
        }
    }
}

struct MgcPrepared {
    n: usize,
    x: Centered,
    y: Centered,
    /// Beta-approximation threshold, before flooring by the global scale
    beta_threshold: f64,
}

impl MgcPrepared {
    fn new(x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Self> {
        let distx = euclidean_distances(x);
        let disty = euclidean_distances(y);
        ensure_not_constant(&distx, "x")?;
        ensure_not_constant(&disty, "y")?;

        let n = distx.nrows();
        Ok(Self {
            n,
            x: Centered::new(&distx),
            y: Centered::new(&disty),
            beta_threshold: beta_threshold(n)?,
        })
    }

    /// Local correlations for every (k, l), with `y` permuted by `perm`
    fn local_correlations(&self, perm: &[usize]) -> Array2<f64> {
        let (ka, kb) = (self.x.levels, self.y.levels);
        let a = &self.x.values;
        let b = &self.y.values;
        let ra = &self.x.ranks;
        let rb = &self.y.ranks;

        let mut cov = Array2::<f64>::zeros((ka, kb));
        for i in 0..self.n {
            let pi = perm[i];
            for j in 0..self.n {
                if i == j {
                    continue;
                }
                let pj = perm[j];
                cov[[ra[[i, j]], rb[[pj, pi]]]] += a[[i, j]] * b[[pj, pi]];
            }
        }
        cumulative_sum_2d(&mut cov);

        let n_sq = (self.n * self.n) as f64;
        let var_scale_a = self.x.variance[ka - 1].abs();
        let var_scale_b = self.y.variance[kb - 1].abs();
        Array2::from_shape_fn((ka, kb), |(k, l)| {
            let var_a = self.x.variance[k];
            let var_b = self.y.variance[l];
            if var_a <= 1e-12 * var_scale_a || var_b <= 1e-12 * var_scale_b {
                return 0.0;
            }
            let centered = cov[[k, l]] - self.x.expectation[k] * self.y.expectation[l] / n_sq;
            centered / (var_a * var_b).sqrt()
        })
    }

    /// Smoothed maximum over the largest significant region
    fn smoothed_statistic(&self, map: &Array2<f64>) -> (f64, (usize, usize)) {
        let (m, l) = map.dim();
        let global = map[[m - 1, l - 1]];
        if m == 1 || l == 1 {
            return (global, (m, l));
        }

        let threshold = self.beta_threshold.max(global);
        let mask = map.mapv(|v| v > threshold);
        let Some(region) = largest_component(&mask) else {
            return (global, (m, l));
        };

        let min_area = (REGION_FRACTION * m.max(l) as f64).ceil() * m.min(l) as f64;
        if (region.len() as f64) < min_area {
            return (global, (m, l));
        }

        let max_corr = region
            .iter()
            .map(|&(k, q)| map[[k, q]])
            .fold(f64::NEG_INFINITY, f64::max);
        if max_corr < global {
            return (global, (m, l));
        }

        // last scale in row-major order attaining the maximum
        let (k, q) = region
            .iter()
            .filter(|&&(k, q)| map[[k, q]] >= max_corr)
            .fold((0, 0), |best, &(k, q)| {
                if k * l + q >= best.0 * l + best.1 {
                    (k, q)
                } else {
                    best
                }
            });
        (max_corr, (k + 1, q + 1))
    }
}

impl PreparedStatistic for MgcPrepared {
    fn n_samples(&self) -> usize {
        self.n
    }

    fn statistic(&self, perm: &[usize]) -> f64 {
        let map = self.local_correlations(perm);
        self.smoothed_statistic(&map).0
    }
}

/// Threshold for a local correlation to count as significant
///
/// Under independence a local correlation is approximately
/// `2 * Beta(a, a) - 1` with `a = m(m-3)/4 - 1/2`, `m = n - 1`.
fn beta_threshold(n: usize) -> Result<f64> {
    let m = n as f64 - 1.0;
    let percentile = 1.0 - REGION_FRACTION / m;
    let shape = m * (m - 3.0) / 4.0 - 0.5;
    let beta = Beta::new(shape, shape).map_err(|e| TestError::Distribution(e.to_string()))?;
    Ok(beta.inverse_cdf(percentile) * 2.0 - 1.0)
}

/// Subtract scaled column means; diagonal set to zero
fn column_center(dist: &Array2<f64>) -> Array2<f64> {
    let n = dist.nrows();
    let denom = (n - 1) as f64;
    let col_means: Vec<f64> = dist.columns().into_iter().map(|c| c.sum() / denom).collect();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            0.0
        } else {
            dist[[i, j]] - col_means[j]
        }
    })
}

/// Dense 0-based ranks of each entry within its column, and the level count
fn column_ranks(dist: &Array2<f64>) -> (Array2<usize>, usize) {
    let n = dist.nrows();
    let mut ranks = Array2::<usize>::zeros((n, n));
    let mut levels = 1;
    let mut order: Vec<usize> = (0..n).collect();
    for j in 0..n {
        order.sort_by(|&p, &q| dist[[p, j]].total_cmp(&dist[[q, j]]));
        let mut rank = 0;
        for pos in 0..n {
            if pos > 0 && dist[[order[pos], j]] > dist[[order[pos - 1], j]] {
                rank += 1;
            }
            ranks[[order[pos], j]] = rank;
        }
        levels = levels.max(rank + 1);
    }
    (ranks, levels)
}

fn cumulative_sum(values: &mut [f64]) {
    for i in 1..values.len() {
        values[i] += values[i - 1];
    }
}

fn cumulative_sum_2d(m: &mut Array2<f64>) {
    let (rows, cols) = m.dim();
    for k in 0..rows {
        for l in 0..cols {
            let mut v = m[[k, l]];
            if k > 0 {
                v += m[[k - 1, l]];
            }
            if l > 0 {
                v += m[[k, l - 1]];
            }
            if k > 0 && l > 0 {
                v -= m[[k - 1, l - 1]];
            }
            m[[k, l]] = v;
        }
    }
}

/// Largest 8-connected component of `true` cells, labelled in raster order
///
/// Diagonal neighbours belong to the same region. Ties go to the component
/// found first.
fn largest_component(mask: &Array2<bool>) -> Option<Vec<(usize, usize)>> {
    let (rows, cols) = mask.dim();
    let mut seen = Array2::<bool>::from_elem((rows, cols), false);
    let mut best: Option<Vec<(usize, usize)>> = None;

    for start_row in 0..rows {
        for start_col in 0..cols {
            if !mask[[start_row, start_col]] || seen[[start_row, start_col]] {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([(start_row, start_col)]);
            seen[[start_row, start_col]] = true;
            while let Some((r, c)) = queue.pop_front() {
                component.push((r, c));
                for nr in r.saturating_sub(1)..(r + 2).min(rows) {
                    for nc in c.saturating_sub(1)..(c + 2).min(cols) {
                        if mask[[nr, nc]] && !seen[[nr, nc]] {
                            seen[[nr, nc]] = true;
                            queue.push_back((nr, nc));
                        }
                    }
                }
            }
            if best.as_ref().map_or(true, |b| component.len() > b.len()) {
                best = Some(component);
            }
        }
    }
    best
}
