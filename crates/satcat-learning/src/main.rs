//! CLI for training the status classifier and running one-off predictions.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use satcat_learning::{
    Prediction, PredictionRequest, Predictor, Trainer, TrainingConfig, TrainingResult,
};
use satcat_processing::ArtifactStore;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Train and query the satellite status classifier",
    long_about = "Trains a random forest on combined_df.csv and writes the model \
                  artifacts into the same directory.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  SATCAT_ARTIFACTS_DIR   Directory holding combined_df.csv and the model\n\n\
                  EXAMPLES:\n  \
                  satcat-learning train --n-jobs 4\n\n  \
                  echo '{\"total_mass\": 83.6, \"span\": 0.58, \"period_mins\": 96.2, \
                  \"perigee_km\": 215, \"apogee_km\": 939, \"inclination\": 65.1, \
                  \"object_type\": \"PAY\"}' | satcat-learning predict"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Directory holding combined_df.csv and the model artifacts
    #[arg(long, global = true, env = "SATCAT_ARTIFACTS_DIR", default_value = "artifacts")]
    artifacts: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the classifier and write the model artifacts
    Train {
        /// Training configuration file (JSON); flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Parallel grid-search workers (-1 for all cores)
        #[arg(long, allow_negative_numbers = true)]
        n_jobs: Option<i32>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Predict the status of one object
    Predict {
        /// JSON request file; reads stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
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
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);
    let store = ArtifactStore::new(&args.artifacts);

    match &args.command {
        Command::Train {
            config,
            n_jobs,
            seed,
        } => run_train(&store, config.as_ref(), *n_jobs, *seed, args.json),
        Command::Predict { input } => run_predict(&store, input.as_ref()),
    }
}

fn run_train(
    store: &ArtifactStore,
    config_path: Option<&PathBuf>,
    n_jobs: Option<i32>,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Reading config file {}", path.display()))?;
            serde_json::from_str::<TrainingConfig>(&text)
                .with_context(|| format!("Parsing config file {}", path.display()))?
        }
        None => TrainingConfig::default(),
    };
    if let Some(jobs) = n_jobs {
        config.n_jobs = jobs;
    }
    if let Some(seed) = seed {
        config.random_seed = seed;
    }

    info!("Training from {}", store.root().display());
    let output = Trainer::builder()
        .config(config)
        .on_progress(|update| {
            if let Some((done, total)) = update.candidates_completed {
                info!("[{}] {}/{}", update.stage.as_str(), done, total);
            } else {
                info!("[{}] {}", update.stage.as_str(), update.message);
            }
        })
        .build()?
        .train_from_store(store)
        .context("Training failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output.result)?);
    } else {
        print_report(&output.result);
    }
    Ok(())
}

fn run_predict(store: &ArtifactStore, input: Option<&PathBuf>) -> Result<()> {
    let body = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Reading request {}", path.display()))?,
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Reading request from stdin")?;
            body
        }
    };
    let request: PredictionRequest =
        serde_json::from_str(&body).context("Parsing prediction request")?;

    let predictor = Predictor::load(store)?;
    let prediction = Prediction {
        prediction: predictor.predict_request(&request)?,
    };
    println!("{}", serde_json::to_string(&prediction)?);
    Ok(())
}

fn print_report(result: &TrainingResult) {
    println!();
    println!("{}", "=".repeat(80));
    println!("TRAINING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();
    println!("Rows:        {} train / {} test", result.train_rows, result.test_rows);
    println!("Best params: {}", result.best_params);
    println!("CV macro-F1: {:.4}", result.cv_score);
    println!("Accuracy:    {:.4}", result.metrics.accuracy);
    println!("Macro-F1:    {:.4}", result.metrics.macro_f1);
    println!("Duration:    {:.1}s", result.training_time_seconds);
    println!();

    println!("{:<8} {:>9} {:>9} {:>9} {:>9}", "Class", "Precision", "Recall", "F1", "Support");
    for class in &result.metrics.per_class {
        println!(
            "{:<8} {:>9.3} {:>9.3} {:>9.3} {:>9}",
            class.label, class.precision, class.recall, class.f1, class.support
        );
    }
    println!();

    println!("Feature importance:");
    for (feature, importance) in &result.feature_importance {
        println!("  {feature:<14} {importance:.4}");
    }

    if !result.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &result.warnings {
            println!("  {warning}");
        }
    }
    println!();
}
