// Block simulation: power and false-positive rate of the K-sample test
//
// Two populations of "connectomes" are simulated as rows of truncated-normal
// edge weights on [-1, 1]. Each condition optionally binarizes the weights
// (Otsu threshold) and optionally collapses every row to its mean, then runs
// the K-sample test on the two label groups. Repeating a condition gives the
// rejection rate: a false-positive rate when both populations are equal, a
// true-positive rate otherwise.
//
// Scientific Foundation:
// [1] Panda, S. et al. (2021). Nonpar MANOVA via independence testing.
// [2] Otsu, N. (1979). A threshold selection method from gray-level histograms.

mod otsu;
mod sweep;
mod truncnorm;

pub use otsu::threshold_otsu;
pub use sweep::{run_condition, run_sweep, SweepRow};
pub use truncnorm::TruncatedNormal;

use crate::config::DistributionParams;
use anyhow::{bail, Result};
use ndarray::{Array2, Axis};
use rand::Rng;
use std::collections::BTreeMap;

/// Samples (one per row) with their group labels
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub samples: Array2<f64>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn new(samples: Array2<f64>, labels: Vec<usize>) -> Result<Self> {
        if samples.nrows() != labels.len() {
            bail!(
                "{} samples but {} labels",
                samples.nrows(),
                labels.len()
            );
        }
        Ok(Self { samples, labels })
    }

    pub fn n_rows(&self) -> usize {
        self.samples.nrows()
    }

    /// Sorted distinct labels
    pub fn unique_labels(&self) -> Vec<usize> {
        let mut labels = self.labels.clone();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// First `rows` samples
    pub fn head(&self, rows: usize) -> Dataset {
        let rows = rows.min(self.n_rows());
        Dataset {
            samples: self.samples.slice(ndarray::s![..rows, ..]).to_owned(),
            labels: self.labels[..rows].to_vec(),
        }
    }
}

/// Interleaved draws from the two populations of `params`
///
/// Each subject contributes one row from population 1 (label 0) followed by
/// one row from population 2 (label 1), giving `2 * n_subjects` rows of
/// `n_vertices` columns.
pub fn twin_truncnorm<R: Rng + ?Sized>(
    params: &DistributionParams,
    n_subjects: usize,
    n_vertices: usize,
    bounds: (f64, f64),
    rng: &mut R,
) -> Result<Dataset> {
    let (lower, upper) = bounds;
    let populations = [
        TruncatedNormal::new(params.mu_1, params.sigma_1, lower, upper)?,
        TruncatedNormal::new(params.mu_2, params.sigma_2, lower, upper)?,
    ];

    let mut samples = Array2::zeros((2 * n_subjects, n_vertices));
    let mut labels = Vec::with_capacity(2 * n_subjects);
    for subject in 0..n_subjects {
        for (label, population) in populations.iter().enumerate() {
            let row = 2 * subject + label;
            for value in samples.row_mut(row).iter_mut() {
                *value = population.sample_one(rng);
            }
            labels.push(label);
        }
    }

    Dataset::new(samples, labels)
}

/// Generated data keyed by distribution name
pub type GeneratedData = BTreeMap<String, Dataset>;

/// One dataset of `max_n_subjects` subjects per distribution
pub fn data_generator<R: Rng + ?Sized>(
    max_n_subjects: usize,
    distributions: &[DistributionParams],
    n_vertices: usize,
    bounds: (f64, f64),
    rng: &mut R,
) -> Result<GeneratedData> {
    let mut data = BTreeMap::new();
    for params in distributions {
        let dataset = twin_truncnorm(params, max_n_subjects, n_vertices, bounds, rng)?;
        data.insert(params.name.clone(), dataset);
    }
    Ok(data)
}

/// The first `n_subjects` subjects (`2 * n_subjects` rows) of a distribution
pub fn data_loader(n_subjects: usize, distribution: &str, data: &GeneratedData) -> Result<Dataset> {
    let Some(dataset) = data.get(distribution) else {
        bail!("no generated data for distribution '{}'", distribution);
    };
    let rows = 2 * n_subjects;
    if rows > dataset.n_rows() {
        bail!(
            "requested {} subjects but '{}' only has {}",
            n_subjects,
            distribution,
            dataset.n_rows() / 2
        );
    }
    Ok(dataset.head(rows))
}

/// Split a dataset into per-label groups ready for the K-sample test
///
/// With `binarize`, every value becomes `1.0` if it exceeds the Otsu
/// threshold of the whole sample matrix, else `0.0`. With `average`, each
/// row collapses to its mean and the groups become column vectors.
pub fn prepare_samples(dataset: &Dataset, binarize: bool, average: bool) -> Vec<Array2<f64>> {
    let samples = if binarize {
        let values: Vec<f64> = dataset.samples.iter().copied().collect();
        match threshold_otsu(&values) {
            Some(threshold) => dataset.samples.mapv(|v| if v > threshold { 1.0 } else { 0.0 }),
            None => dataset.samples.clone(),
        }
    } else {
        dataset.samples.clone()
    };

    dataset
        .unique_labels()
        .into_iter()
        .map(|group| {
            let rows: Vec<usize> = dataset
                .labels
                .iter()
                .enumerate()
                .filter(|&(_, &label)| label == group)
                .map(|(i, _)| i)
                .collect();
            let selected = samples.select(Axis(0), &rows);
            if average {
                selected.mean_axis(Axis(1)).map_or_else(
                    || Array2::zeros((selected.nrows(), 1)),
                    |means| means.insert_axis(Axis(1)),
                )
            } else {
                selected
            }
        })
        .collect()
}
