//! CLI entry point for the satellite catalog build.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use satcat_processing::{
    BuildSummary, BuildTarget, CatalogPipeline, DesignationConverter, PipelineConfig,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Satellite catalog reconciliation and aggregation",
    long_about = "Cleans the GCAT and CelesTrak catalogs, merges them into one dataset \
                  keyed by launch designator and derives summary tables.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  SATCAT_DATA_DIR        Directory holding the source catalogs\n  \
                  SATCAT_ARTIFACTS_DIR   Directory receiving build outputs\n\n\
                  EXAMPLES:\n  \
                  # Full build, skipping aggregates that already exist\n  \
                  satcat-processing build\n\n  \
                  # Rebuild everything from a custom data directory\n  \
                  satcat-processing --data-dir ./catalogs build --force\n\n  \
                  # Convert legacy designations\n  \
                  satcat-processing convert '1957 ALP 2' '1958 BET'"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the source catalogs
    #[arg(long, global = true, env = "SATCAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory receiving the combined dataset and aggregates
    #[arg(long, global = true, env = "SATCAT_ARTIFACTS_DIR")]
    artifacts_dir: Option<PathBuf>,

    /// Pipeline configuration file (JSON); flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog rules file (JSON) replacing the built-in tables
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print the result as JSON to stdout instead of a summary
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the combined dataset and any missing aggregates
    Build {
        /// Rebuild aggregates even when all of them exist
        #[arg(long)]
        force: bool,
    },
    /// Build only the combined dataset
    Reconcile,
    /// Rebuild only the aggregate tables
    Aggregate,
    /// Convert Harvard designations to launch designators
    Convert {
        /// Object IDs to convert
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "error" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    // stdout is reserved for the JSON result
    if json_output {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn main() -> Result<()> {
    // Load .env before parsing so env-backed flags see it
    dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    match &args.command {
        Command::Convert { ids } => run_convert(ids, args.json),
        Command::Build { force } => run_build(&args, BuildTarget::All, *force),
        Command::Reconcile => run_build(&args, BuildTarget::CombinedDataset, false),
        Command::Aggregate => run_build(&args, BuildTarget::Aggregates, false),
    }
}

fn load_config(args: &Args, force: bool) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Reading config file {}", path.display()))?;
            serde_json::from_str::<PipelineConfig>(&text)
                .with_context(|| format!("Parsing config file {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &args.artifacts_dir {
        config.artifacts_dir = dir.clone();
    }
    if let Some(path) = &args.rules {
        config.rules_path = Some(path.clone());
    }
    config.force_rebuild |= force;

    config.validate()?;
    Ok(config)
}

fn run_build(args: &Args, target: BuildTarget, force: bool) -> Result<()> {
    let config = load_config(args, force)?;
    info!(
        "Building from {} into {}",
        config.data_dir.display(),
        config.artifacts_dir.display()
    );

    let pipeline = CatalogPipeline::builder().config(config).build()?;
    let summary = pipeline.run(target).map_err(|e| {
        error!("Build failed: {}", e);
        anyhow!("Build failed: {}", e)
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_human_readable_summary(&summary, &pipeline);
    }
    Ok(())
}

fn run_convert(ids: &[String], json: bool) -> Result<()> {
    let converter = DesignationConverter::default();
    let converted: Vec<(&str, String)> = ids
        .iter()
        .map(|id| (id.as_str(), converter.convert(id)))
        .collect();

    if json {
        let map: serde_json::Map<String, serde_json::Value> = converted
            .into_iter()
            .map(|(id, canonical)| (id.to_string(), serde_json::Value::String(canonical)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        for (id, canonical) in converted {
            println!("{id}\t{canonical}");
        }
    }
    Ok(())
}

/// Print the build summary.
///
/// Uses `println!` rather than tracing so the summary shows regardless of
/// log level.
fn print_human_readable_summary(summary: &BuildSummary, pipeline: &CatalogPipeline) {
    println!();
    println!("{}", "=".repeat(80));
    println!("CATALOG BUILD COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Artifacts: {}", pipeline.store().root().display());
    println!("Duration:  {}ms", summary.duration_ms);
    println!();

    if !summary.source_rows.is_empty() {
        println!("Sources:");
        for (source, rows) in &summary.source_rows {
            let converted = summary.designations_converted.get(source).copied().unwrap_or(0);
            let duplicates = summary.duplicate_ids.get(source).copied().unwrap_or(0);
            println!(
                "  {:<10} {:>7} rows, {} designations converted, {} duplicate IDs",
                source.name(),
                rows,
                converted,
                duplicates
            );
        }
        println!();
    }

    if summary.merged_rows > 0 {
        println!("Combined Dataset:");
        println!("  Merged objects: {}", summary.merged_rows);
        println!(
            "  Status filter: {} without status, {} on the drop list",
            summary.rows_without_status, summary.rows_with_invalid_status
        );
        println!("  Final rows: {}", summary.final_rows);
        if !summary.dropped_columns.is_empty() {
            println!("  Constant columns removed: {}", summary.dropped_columns.join(", "));
        }
        println!();
    }

    if summary.aggregates.is_empty() {
        println!("Aggregates: unchanged");
    } else {
        println!("Aggregates:");
        for name in &summary.aggregates {
            println!("  {name}");
        }
    }

    if !summary.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  {warning}");
        }
    }
    println!();
}
