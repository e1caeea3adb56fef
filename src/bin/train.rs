//! Network training binary.
//!
//! Trains a feedforward network on a numeric CSV file with online gradient
//! descent, optionally holds out a tail fraction for evaluation, and saves a
//! checkpoint directory. Writes JSONL metrics per epoch when asked to.

use anyhow::{bail, Context, Result};
use clap::Parser;
use neuralnet::data::{load_csv, one_hot_column, train_eval_split};
use neuralnet::{train_with_callback, Activation, Loss, Network, NetworkConfig, TrainConfig};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "neuralnet-train",
    about = "Train a feedforward network on a CSV dataset"
)]
struct Args {
    /// CSV file: input columns first, then target columns
    #[arg(long)]
    data: PathBuf,

    /// Number of leading input columns
    #[arg(long)]
    num_inputs: usize,

    /// The CSV has a header row
    #[arg(long, default_value_t = false)]
    has_headers: bool,

    /// Treat the single target column as a class index and one-hot encode it
    #[arg(long)]
    num_classes: Option<usize>,

    /// Hidden layer sizes, comma separated
    #[arg(long, value_delimiter = ',')]
    hidden: Vec<usize>,

    /// Output activation (sigmoid or softmax)
    #[arg(long, default_value = "sigmoid")]
    activation: Activation,

    /// Hidden activation (defaults to the output activation)
    #[arg(long)]
    hidden_activation: Option<Activation>,

    /// Loss function (binary_cross_entropy or cross_entropy)
    #[arg(long, default_value = "binary_cross_entropy")]
    loss: Loss,

    /// Number of training epochs
    #[arg(long, default_value_t = 100)]
    epochs: usize,

    /// Learning rate
    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    /// Seed for parameter initialization
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Reshuffle the example order every epoch
    #[arg(long, default_value_t = false)]
    shuffle: bool,

    /// Seed for the shuffling order, independent of --seed
    #[arg(long, default_value_t = 0)]
    shuffle_seed: u64,

    /// Fraction of rows (taken from the end) held out for evaluation
    #[arg(long, default_value_t = 0.0)]
    eval_fraction: f64,

    /// Log a summary every N epochs
    #[arg(long, default_value_t = 10)]
    log_every: usize,

    /// Checkpoint directory to write
    #[arg(long, default_value = "data/checkpoints/latest")]
    output_dir: PathBuf,

    /// Resume from a checkpoint directory instead of a fresh network
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Output metrics file (JSONL)
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !(0.0..1.0).contains(&args.eval_fraction) {
        bail!("--eval-fraction must be in [0, 1), got {}", args.eval_fraction);
    }

    let dataset = load_csv(&args.data, args.num_inputs, args.has_headers)
        .with_context(|| format!("Failed to load {}", args.data.display()))?;
    let targets = match args.num_classes {
        Some(classes) => one_hot_column(&dataset.targets, classes).context("Invalid class labels")?,
        None => dataset.targets,
    };

    let (train_inputs, train_targets, eval_inputs, eval_targets) =
        train_eval_split(&dataset.inputs, &targets, args.eval_fraction);
    log::info!(
        "{} training examples, {} evaluation examples",
        train_inputs.nrows(),
        eval_inputs.nrows()
    );

    let mut network = match &args.resume {
        Some(dir) => {
            log::info!("Resuming from checkpoint: {}", dir.display());
            Network::load(dir)
                .with_context(|| format!("Failed to load checkpoint {}", dir.display()))?
        }
        None => {
            let mut config = NetworkConfig::new(
                args.num_inputs,
                args.hidden.clone(),
                targets.ncols(),
                args.activation,
                args.loss,
                args.seed,
            );
            if let Some(hidden) = args.hidden_activation {
                config = config.with_hidden_activation(hidden);
            }
            Network::new(&config).context("Failed to build network")?
        }
    };
    log::info!(
        "Network: layers {:?}, activation {}, hidden {}, loss {}",
        network.layers(),
        network.activation(),
        network.hidden_activation(),
        network.loss()
    );

    let mut metrics_out = match &args.metrics_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create metrics directory {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open metrics file {}", path.display()))?;
            Some(file)
        }
        None => None,
    };

    let config = TrainConfig {
        epochs: args.epochs,
        learning_rate: args.learning_rate,
        shuffle: args.shuffle,
        shuffle_seed: args.shuffle_seed,
        log_every: args.log_every,
    };
    let start = Instant::now();

    train_with_callback(
        &mut network,
        &train_inputs,
        &train_targets,
        &config,
        |network, metrics| -> Result<()> {
            let eval_accuracy = if config.is_report_epoch(metrics.epoch) && eval_inputs.nrows() > 0 {
                let accuracy = network
                    .evaluate_classification(&eval_inputs, &eval_targets)?
                    .accuracy();
                log::info!("epoch {:>5}: eval accuracy = {:.4}", metrics.epoch, accuracy);
                Some(accuracy)
            } else {
                None
            };

            if let Some(out) = metrics_out.as_mut() {
                let event = serde_json::json!({
                    "type": "epoch",
                    "epoch": metrics.epoch,
                    "mean_loss": metrics.mean_loss,
                    "accuracy": metrics.accuracy,
                    "eval_accuracy": eval_accuracy,
                    "elapsed_secs": start.elapsed().as_secs_f64(),
                });
                writeln!(out, "{event}").context("Failed to write metrics")?;
                out.flush().context("Failed to flush metrics")?;
            }
            Ok(())
        },
    )
    .context("Training failed")?;

    if eval_inputs.nrows() > 0 {
        let eval_loss = network.mean_loss(&eval_inputs, &eval_targets)?;
        log::info!("Evaluation mean loss: {:.6}", eval_loss);
    }

    network
        .save(&args.output_dir)
        .with_context(|| format!("Failed to save checkpoint {}", args.output_dir.display()))?;
    log::info!(
        "Saved checkpoint to {} in {:.1}s",
        args.output_dir.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
