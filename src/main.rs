use anyhow::{Context, Result};
use clap::Parser;
use connectome_ksample::aggregate::{
    aggregate_by_label, block_names, pretty_block_names, write_label_matrices,
};
use connectome_ksample::cli::{
    AggregateArgs, Cli, Command, CompareArgs, OutputFormat, PlotArgs, SimulateArgs, TestArgs,
    VertexArgs,
};
use connectome_ksample::compare::{compare, load_nonparametric, load_parametric};
use connectome_ksample::config::SimulationConfig;
use connectome_ksample::csv_output::{write_comparison_csv, write_sweep_csv};
use connectome_ksample::dataset::{Atlas, Connectome};
use connectome_ksample::embed::OmnibusEmbed;
use connectome_ksample::ksample::{KSample, TestKind, Workers};
use connectome_ksample::plot::{plot_rates, read_sweep_rows, summarize};
use connectome_ksample::simulation::run_sweep;
use connectome_ksample::table::Table;
use connectome_ksample::vertex::{run_vertex_tests, DEFAULT_VERTEX_REPS};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; --debug forces TRACE, otherwise RUST_LOG or info
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Buffered writer for `path`, or stdout for "-"
fn open_output(path: &Path) -> Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn run_simulate(args: SimulateArgs, quiet: bool) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None if args.quick => SimulationConfig::quick(),
        None => SimulationConfig::default(),
    };

    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(n_subjects) = args.n_subjects {
        config.n_subjects = n_subjects;
    }
    let TestArgs {
        test,
        reps,
        workers,
        seed,
    } = args.test;
    config.test = test.unwrap_or(config.test);
    config.reps = reps.unwrap_or(config.reps);
    config.workers = workers.unwrap_or(config.workers);
    config.seed = seed.unwrap_or(config.seed);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid sweep configuration: {}", e))?;

    let rows = run_sweep(&config, quiet)?;

    let mut writer = open_output(&args.output)?;
    write_sweep_csv(&mut writer, &rows)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(rows = rows.len(), path = %args.output.display(), "wrote sweep results");
    Ok(())
}

fn run_plot(args: PlotArgs) -> Result<()> {
    let rows = read_sweep_rows(&args.input)?;
    let points = summarize(&rows, args.alpha, args.resamples, args.seed);
    plot_rates(&points, &args.output, args.only.as_deref())
}

fn run_aggregate(args: AggregateArgs) -> Result<()> {
    let connectome = Connectome::load(&args.dataset)?;
    let matrices = aggregate_by_label(&connectome, args.replicates)?;
    let names = if args.pretty_names {
        pretty_block_names(&connectome.blocks)
    } else {
        block_names(&connectome.blocks)
    };
    write_label_matrices(&args.output_dir, &names, &matrices)?;
    Ok(())
}

fn run_vertex(args: VertexArgs, quiet: bool) -> Result<()> {
    let connectome = Connectome::load(&args.dataset)?;
    let seed = args.test.seed.unwrap_or(0);

    let mut embedder = OmnibusEmbed::new()
        .with_n_elbows(args.n_elbows)
        .with_diag_aug(!args.no_diag_aug)
        .with_seed(seed);
    if let Some(d) = args.n_components {
        embedder = embedder.with_n_components(d);
    }
    let latent = embedder
        .fit_transform(&connectome.graphs)
        .context("Omnibus embedding failed")?;
    info!(shape = ?latent.dim(), "embedded graphs");

    let test = KSample::new(args.test.test.unwrap_or(TestKind::Mgc))
        .with_reps(args.test.reps.unwrap_or(DEFAULT_VERTEX_REPS))
        .with_workers(args.test.workers.unwrap_or(Workers::All))
        .with_seed(seed);

    let writer = open_output(&args.output)?;
    let rows = run_vertex_tests(&latent, &connectome.labels, &test, writer, quiet)?;
    info!(rows, path = %args.output.display(), "wrote vertex results");
    Ok(())
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let atlas = Atlas::from_table(&Table::from_file(&args.atlas)?)
        .with_context(|| format!("Invalid atlas {}", args.atlas.display()))?;
    let nonparametric = load_nonparametric(&args.nonparametric)?;
    let parametric = load_parametric(&args.parametric)?;
    let comparison = compare(&nonparametric, &parametric, &atlas, args.alpha)?;

    match args.format {
        OutputFormat::Text => print!("{}", comparison.to_text()),
        OutputFormat::Json => println!("{}", comparison.to_json()?),
    }

    if let Some(path) = &args.merged {
        let mut writer = open_output(path)?;
        write_comparison_csv(&mut writer, &comparison.merged_rows())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    match args.command {
        Command::Simulate(sim) => run_simulate(sim, args.quiet),
        Command::Plot(plot) => run_plot(plot),
        Command::Aggregate(agg) => run_aggregate(agg),
        Command::Vertex(vertex) => run_vertex(vertex, args.quiet),
        Command::Compare(cmp) => run_compare(cmp),
    }
}
