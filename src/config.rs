//! Configuration for the block-simulation sweep
//!
//! Defaults reproduce the published sweep: three truncated-normal scenarios,
//! every binarize/average combination, 10..=100 subjects per group in steps
//! of 10, 20 iterations and 10000 permutations per test.
//!
//! # Example sweep.toml
//!
//! ```toml
//! n_subjects = [10, 50, 100]
//! iterations = 5
//! reps = 500
//! test = "dcorr"
//!
//! [[distribution]]
//! name = "equal"
//! mu_1 = 0.0
//! sigma_1 = 0.25
//! mu_2 = 0.0
//! sigma_2 = 0.25
//! ```

use crate::ksample::{TestKind, Workers};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameters of the two truncated-normal populations in one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionParams {
    /// Scenario name written to the `distribution` column
    pub name: String,
    pub mu_1: f64,
    pub sigma_1: f64,
    pub mu_2: f64,
    pub sigma_2: f64,
}

impl DistributionParams {
    pub fn new(name: &str, mu_1: f64, sigma_1: f64, mu_2: f64, sigma_2: f64) -> Self {
        Self {
            name: name.to_string(),
            mu_1,
            sigma_1,
            mu_2,
            sigma_2,
        }
    }
}

/// Sweep configuration (see module docs for the TOML layout)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Binarize samples with an Otsu threshold before testing
    pub binarize: Vec<bool>,

    /// Collapse each sample to its mean before testing
    pub average: Vec<bool>,

    /// Subjects per group
    pub n_subjects: Vec<usize>,

    /// Repetitions of every condition
    pub iterations: usize,

    /// Columns (vertices) per sample
    pub n_vertices: usize,

    /// Truncation bounds shared by both populations
    pub lower: f64,
    pub upper: f64,

    /// Permutations per K-sample test
    pub reps: usize,

    /// Permutation workers, -1 for all
    pub workers: Workers,

    /// Base seed for data generation and permutations
    pub seed: u64,

    /// Independence statistic used for the K-sample test
    pub test: TestKind,

    /// Draw fresh data for every iteration.
    ///
    /// When false a single dataset per scenario is reused and iterations only
    /// differ in their permutation streams.
    pub resample_each_iteration: bool,

    #[serde(rename = "distribution")]
    pub distributions: Vec<DistributionParams>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            binarize: vec![true, false],
            average: vec![true, false],
            n_subjects: (1..=10).map(|i| i * 10).collect(),
            iterations: 20,
            n_vertices: 10,
            lower: -1.0,
            upper: 1.0,
            reps: 10_000,
            workers: Workers::All,
            seed: 0,
            test: TestKind::Mgc,
            resample_each_iteration: true,
            distributions: vec![
                DistributionParams::new("equal", 0.0, 0.25, 0.0, 0.25),
                DistributionParams::new("same_mean", 0.0, 0.25, 0.0, 0.5),
                DistributionParams::new("diff_mean", 0.0, 0.25, 0.25, 0.25),
            ],
        }
    }
}

impl SimulationConfig {
    /// Small sweep for smoke runs: two sample sizes, few permutations
    pub fn quick() -> Self {
        Self {
            n_subjects: vec![10, 20],
            iterations: 2,
            reps: 100,
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file; missing keys use defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid sweep configuration in {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    /// Largest subject count in the grid
    pub fn max_n_subjects(&self) -> usize {
        self.n_subjects.iter().copied().max().unwrap_or(0)
    }

    /// Number of rows the sweep will produce
    pub fn n_conditions(&self) -> usize {
        self.binarize.len()
            * self.average.len()
            * self.n_subjects.len()
            * self.distributions.len()
            * self.iterations
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.binarize.is_empty() || self.average.is_empty() {
            return Err("binarize and average grids must not be empty".to_string());
        }

        if self.n_subjects.is_empty() || self.n_subjects.contains(&0) {
            return Err(format!(
                "n_subjects must be a non-empty list of positive counts, got {:?}",
                self.n_subjects
            ));
        }

        if self.iterations == 0 {
            return Err("iterations must be >= 1".to_string());
        }

        if self.n_vertices == 0 {
            return Err("n_vertices must be >= 1".to_string());
        }

        if self.reps == 0 {
            return Err("reps must be >= 1".to_string());
        }

        if self.lower >= self.upper {
            return Err(format!(
                "lower bound {} must be below upper bound {}",
                self.lower, self.upper
            ));
        }

        if self.distributions.is_empty() {
            return Err("at least one [[distribution]] is required".to_string());
        }

        for dist in &self.distributions {
            if dist.sigma_1 <= 0.0 || dist.sigma_2 <= 0.0 {
                return Err(format!(
                    "distribution '{}': sigma must be positive",
                    dist.name
                ));
            }
            for mu in [dist.mu_1, dist.mu_2] {
                if !(self.lower..=self.upper).contains(&mu) {
                    return Err(format!(
                        "distribution '{}': mu {} outside [{}, {}]",
                        dist.name, mu, self.lower, self.upper
                    ));
                }
            }
        }

        let mut names: Vec<&str> = self.distributions.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err("distribution names must be unique".to_string());
        }

        Ok(())
    }
}
