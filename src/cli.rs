//! CLI argument parsing for connectome-ksample

use crate::ksample::{TestKind, Workers};
use crate::plot::BOOTSTRAP_RESAMPLES;
use clap::builder::TypedValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for the comparison report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "connectome-ksample")]
#[command(version)]
#[command(
    about = "Nonparametric K-sample testing on simulated and real mouse connectomes",
    long_about = None
)]
pub struct Cli {
    /// Enable trace-level logging to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sweep block simulations to estimate power and false-positive rate
    Simulate(SimulateArgs),

    /// Plot rejection rates from a sweep results file
    Plot(PlotArgs),

    /// Aggregate edge weights into per-label block matrices (Circos tables)
    Aggregate(AggregateArgs),

    /// Omnibus-embed all graphs and test every vertex across labels
    Vertex(VertexArgs),

    /// Compare nonparametric and parametric vertex significance
    Compare(CompareArgs),
}

/// Options shared by every subcommand that runs K-sample tests
#[derive(Args, Debug, Clone)]
pub struct TestArgs {
    /// Independence statistic behind the K-sample test
    #[arg(long = "test", value_enum)]
    pub test: Option<TestKind>,

    /// Permutations per test
    #[arg(long, value_name = "N")]
    pub reps: Option<usize>,

    /// Permutation workers (-1 for all cores)
    #[arg(long, value_name = "N", allow_hyphen_values = true, value_parser = parse_workers)]
    pub workers: Option<Workers>,

    /// Base random seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Sweep configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Start from the small smoke-test sweep instead of the full one
    #[arg(long, conflicts_with = "config")]
    pub quick: bool,

    /// Results file ("-" for stdout)
    #[arg(short, long, default_value = "block_simulation.csv")]
    pub output: PathBuf,

    /// Iterations per condition
    #[arg(long, value_name = "N")]
    pub iterations: Option<usize>,

    /// Subjects per group (comma separated)
    #[arg(long, value_name = "N,...", value_delimiter = ',')]
    pub n_subjects: Option<Vec<usize>>,

    #[command(flatten)]
    pub test: TestArgs,
}

#[derive(Args, Debug)]
pub struct PlotArgs {
    /// Sweep results file written by `simulate`
    pub input: PathBuf,

    /// Figure path (SVG)
    #[arg(short, long, default_value = "community_sim.svg")]
    pub output: PathBuf,

    /// Plot a single distribution instead of all panels
    #[arg(long, value_name = "DISTRIBUTION")]
    pub only: Option<String>,

    /// Rejection level
    #[arg(long, default_value = "0.05")]
    pub alpha: f64,

    /// Bootstrap resamples for the confidence bands
    #[arg(long, default_value_t = BOOTSTRAP_RESAMPLES)]
    pub resamples: usize,

    /// Bootstrap seed
    #[arg(long, default_value = "0")]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Dataset directory
    pub dataset: PathBuf,

    /// Directory receiving one <label>.csv per label
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Divide summed matrices by this count instead of the graphs per label
    #[arg(long, value_name = "N")]
    pub replicates: Option<usize>,

    /// Prettify block names ("caudate_putamen" -> "Caudate Putamen (LEFT)")
    #[arg(long)]
    pub pretty_names: bool,
}

#[derive(Args, Debug)]
pub struct VertexArgs {
    /// Dataset directory
    pub dataset: PathBuf,

    /// Results file ("-" for stdout)
    #[arg(short, long, default_value = "nonpar_manova.csv")]
    pub output: PathBuf,

    /// Fix the embedding dimension instead of selecting it automatically
    #[arg(long, value_name = "D")]
    pub n_components: Option<usize>,

    /// Number of scree-plot elbows; the last one sets the dimension
    #[arg(
        long,
        default_value_t = 2,
        value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize)
    )]
    pub n_elbows: usize,

    /// Keep the zero diagonal instead of filling it with scaled degrees
    #[arg(long)]
    pub no_diag_aug: bool,

    #[command(flatten)]
    pub test: TestArgs,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Nonparametric results (ROI,stat,pval)
    #[arg(long, default_value = "nonpar_manova.csv")]
    pub nonparametric: PathBuf,

    /// Parametric results (ROI,pvalue,order.p)
    #[arg(long, default_value = "parametric_manova.csv")]
    pub parametric: PathBuf,

    /// Atlas file (ROI,Structure)
    #[arg(long)]
    pub atlas: PathBuf,

    /// Family-wise error level
    #[arg(long, default_value = "0.05")]
    pub alpha: f64,

    /// Report format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Also write the merged per-ROI table to this file
    #[arg(long, value_name = "FILE")]
    pub merged: Option<PathBuf>,
}

fn parse_workers(value: &str) -> Result<Workers, String> {
    let n: i32 = value
        .parse()
        .map_err(|_| format!("'{}' is not an integer", value))?;
    Workers::try_from(n)
}
