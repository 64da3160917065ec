//! Propval trainer CLI
//!
//! Fits every candidate regressor and writes the winning pipeline, its digest
//! and the feature metadata record.

use anyhow::{Context, Result};
use clap::Parser;
use propval_trainer::{train_from_csv, BoostingConfig, ForestConfig, TrainingParams};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "propval-train")]
#[command(author = "Propval Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train candidate price models and keep the best by test R²", long_about = None)]
struct Args {
    /// Input CSV dataset path (header row, `Price_in_Lakhs` target)
    #[arg(short, long, default_value = "data/delhi_housing_synthetic.csv")]
    input: PathBuf,

    /// Output directory for model, hash and metadata
    #[arg(short, long, default_value = "models")]
    output: PathBuf,

    /// Random seed for the split and the randomised candidates
    #[arg(long, default_value = "42")]
    seed: i64,

    /// Held-out fraction of rows
    #[arg(long, default_value = "0.2")]
    test_fraction: f64,

    /// Number of boosting trees
    #[arg(long, default_value = "200")]
    boosting_trees: usize,

    /// Maximum depth of boosting trees
    #[arg(long, default_value = "5")]
    boosting_depth: usize,

    /// Learning rate (fixed-point, e.g., 100000 = 0.1)
    #[arg(long, default_value = "100000")]
    learning_rate: i64,

    /// Number of trees per forest candidate
    #[arg(long, default_value = "60")]
    forest_trees: usize,

    /// Maximum depth of forest trees
    #[arg(long, default_value = "12")]
    forest_depth: usize,

    /// Minimum samples per leaf
    #[arg(long, default_value = "2")]
    min_samples_leaf: usize,

    /// Quantization step for split thresholds (fixed-point)
    #[arg(long, default_value = "1000")]
    quant_step: i64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Propval Trainer v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading dataset from: {}", args.input.display());

    let params = TrainingParams {
        seed: args.seed,
        test_fraction: args.test_fraction,
        boosting: BoostingConfig {
            num_trees: args.boosting_trees,
            max_depth: args.boosting_depth,
            min_samples_leaf: args.min_samples_leaf,
            learning_rate: args.learning_rate,
            quant_step: args.quant_step,
        },
        forest: ForestConfig {
            num_trees: args.forest_trees,
            max_depth: args.forest_depth,
            min_samples_leaf: args.min_samples_leaf,
            quant_step: args.quant_step,
        },
    };

    let started = chrono::Utc::now();
    let outcome = train_from_csv(&args.input, params).context("Training failed")?;

    info!("Model performance comparison (by test R²):");
    for report in &outcome.ranking {
        info!(
            "  {:<18} train_r2={:.4} test_r2={:.4} test_mae={:.3} test_rmse={:.3}",
            report.name,
            report.metrics.train_r2,
            report.metrics.test_r2,
            report.metrics.test_mae,
            report.metrics.test_rmse
        );
    }
    info!("Best model: {}", outcome.metadata.best_model);

    let persisted = outcome
        .persist(&args.output)
        .with_context(|| format!("Failed to write artifacts to {}", args.output.display()))?;

    let elapsed = chrono::Utc::now() - started;
    info!("Training completed in {}s", elapsed.num_seconds());
    info!("  Model: {}", persisted.model_path.display());
    info!("  Hash: {}", persisted.model_hash);
    info!("  Metadata: {}", persisted.metadata_path.display());

    Ok(())
}
