//! tidycov CLI binary.
//!
//! Imports covariate tables into SQLite stores, tidies them, computes
//! population statistics and compares cohorts.

mod integration;

use clap::{Parser, Subcommand};
use integration::config::{CliConfig, TidyOverrides};
use integration::progress::BarProgress;
use integration::store_manager::{fill_new_store, open_store, resolve_population};
use std::path::{Path, PathBuf};
use std::process;
use tidycov::Cohort;
use tidycov_data::import::{CsvSources, import_csv};
use tidycov_data::{CovariateSink, CovariateStore};
use tidycov_output::{ComparisonSummary, ExportFormat, Exporter, TidySummary, export_aggregates};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tidycov")]
#[command(about = "tidycov: sparse covariate tidying and cohort statistics", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import covariate CSV tables into a new store
    Import {
        /// Covariate rows (row_id,covariate_id[,time_id],covariate_value)
        #[arg(long)]
        rows: PathBuf,

        /// Covariate catalog CSV
        #[arg(long)]
        covariate_ref: PathBuf,

        /// Analysis catalog CSV
        #[arg(long)]
        analysis_ref: PathBuf,

        /// Number of subjects in the cohort
        #[arg(long)]
        population: Option<usize>,

        /// Store to create
        #[arg(long)]
        db: PathBuf,
    },

    /// Filter, normalize and de-duplicate a store into a new one
    Tidy {
        /// Source store
        #[arg(long)]
        db: PathBuf,

        /// Store to create
        #[arg(long)]
        out: PathBuf,

        /// Minimum fraction of subjects a covariate must reach
        #[arg(long)]
        min_fraction: Option<f64>,

        /// Keep original values
        #[arg(long)]
        no_normalize: bool,

        /// Keep constant covariates and exhaustive groups
        #[arg(long)]
        no_redundancy: bool,

        /// TOML file holding a [tidy] table
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the removal record here as JSON
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Cohort size, when the store does not record it
        #[arg(long)]
        population: Option<usize>,
    },

    /// Compute population statistics for every covariate
    Aggregate {
        /// Source store
        #[arg(long)]
        db: PathBuf,

        /// Cohort size, when the store does not record it
        #[arg(long)]
        population: Option<usize>,

        /// Directory for the exported tables
        #[arg(long)]
        out_dir: PathBuf,

        /// Output format (csv or json)
        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// Standardized differences between two cohorts
    Compare {
        /// Target cohort store
        #[arg(long)]
        target: PathBuf,

        /// Comparator cohort store
        #[arg(long)]
        comparator: PathBuf,

        /// Number of covariates to show
        #[arg(long, default_value = "20")]
        top: usize,

        /// Output format (text, markdown or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Describe a store
    Summary {
        /// Store to describe
        #[arg(long)]
        db: PathBuf,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            rows,
            covariate_ref,
            analysis_ref,
            population,
            db,
        } => {
            let sources = CsvSources {
                rows: &rows,
                covariate_ref: &covariate_ref,
                analysis_ref: &analysis_ref,
            };
            import_store(sources, population, &db)?;
        }
        Commands::Tidy {
            db,
            out,
            min_fraction,
            no_normalize,
            no_redundancy,
            config,
            metadata,
            population,
        } => {
            let config = CliConfig::load(config.as_deref())?;
            let overrides = TidyOverrides {
                min_fraction,
                no_normalize,
                no_redundancy,
            };
            tidy_store(
                &db,
                &out,
                &config,
                overrides,
                metadata.as_deref(),
                population,
            )?;
        }
        Commands::Aggregate {
            db,
            population,
            out_dir,
            format,
        } => {
            aggregate_store(&db, population, &out_dir, format.parse()?)?;
        }
        Commands::Compare {
            target,
            comparator,
            top,
            format,
        } => {
            compare_stores(&target, &comparator, top, &format)?;
        }
        Commands::Summary { db } => {
            let store = open_store(&db)?;
            println!("{}", store.summary()?);
        }
    }

    Ok(())
}

fn import_store(
    sources: CsvSources<'_>,
    population: Option<usize>,
    db: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let (store, imported) = fill_new_store(db, |store| {
        let imported = import_csv(sources, store)?;
        if let Some(population) = population {
            store.set_population_size(population)?;
        }
        store.validate()?;
        Ok(imported)
    })?;

    println!("Imported {} rows into {}", imported, db.display());
    println!("{}", store.summary()?);
    Ok(())
}

fn tidy_store(
    db: &Path,
    out: &Path,
    config: &CliConfig,
    overrides: TidyOverrides,
    metadata_path: Option<&Path>,
    population: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config.tidy_settings(overrides);
    let source = open_store(db)?;
    let population = resolve_population(&source, population)?;
    let cohort = Cohort::new(source, population);
    let before = cohort.summary()?;

    let (sink, metadata) = fill_new_store(out, |sink| {
        cohort.tidy_into(settings, sink, BarProgress::new())
    })?;

    let summary = TidySummary::new(&metadata, &before, &sink.summary()?);
    println!("{}", summary.to_ascii_table());

    if let Some(path) = metadata_path {
        metadata.export_to_file(path, ExportFormat::PrettyJson)?;
        println!("Removal record written to {}", path.display());
    }
    Ok(())
}

fn aggregate_store(
    db: &Path,
    population: Option<usize>,
    out_dir: &Path,
    format: ExportFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(db)?;
    let population = resolve_population(&store, population)?;
    let aggregated = Cohort::new(store, population).aggregate_with_progress(BarProgress::new())?;

    println!(
        "Aggregated {} binary and {} continuous covariates over {} subjects",
        aggregated.binary.len(),
        aggregated.continuous.len(),
        population
    );
    for path in export_aggregates(&aggregated, out_dir, format)? {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

fn compare_stores(
    target: &Path,
    comparator: &Path,
    top: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = Cohort::from_store(open_store(target)?)?;
    let comparator = Cohort::from_store(open_store(comparator)?)?;
    let report = target.compare(&comparator)?;

    match format.to_ascii_lowercase().as_str() {
        "json" => println!("{}", report.export_to_string(ExportFormat::PrettyJson)?),
        "markdown" | "md" => println!("{}", ComparisonSummary::new(&report, top).to_markdown()),
        "text" => println!("{}", ComparisonSummary::new(&report, top).to_ascii_table()),
        other => return Err(format!("unknown output format: {}", other).into()),
    }
    Ok(())
}
