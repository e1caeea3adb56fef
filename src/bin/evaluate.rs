//! Evaluate a saved network on a CSV dataset.
//!
//! Usage:
//!   neuralnet-evaluate --checkpoint data/checkpoints/latest --data test.csv

use anyhow::{Context, Result};
use clap::Parser;
use neuralnet::data::{load_csv, one_hot_column};
use neuralnet::Network;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "neuralnet-evaluate",
    about = "Report accuracy and mean loss of a saved network"
)]
struct Args {
    /// Checkpoint directory written by neuralnet-train
    #[arg(long)]
    checkpoint: PathBuf,

    /// CSV file: input columns first, then target columns
    #[arg(long)]
    data: PathBuf,

    /// The CSV has a header row
    #[arg(long, default_value_t = false)]
    has_headers: bool,

    /// The single target column holds class indices to one-hot encode
    #[arg(long, default_value_t = false)]
    class_labels: bool,

    /// Print every misclassified row index
    #[arg(long, default_value_t = false)]
    show_errors: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let network = Network::load(&args.checkpoint)
        .with_context(|| format!("Failed to load checkpoint {}", args.checkpoint.display()))?;
    log::info!("Loaded network with layers {:?}", network.layers());

    let dataset = load_csv(&args.data, network.num_inputs(), args.has_headers)
        .with_context(|| format!("Failed to load {}", args.data.display()))?;

    let targets = if args.class_labels {
        one_hot_column(&dataset.targets, network.num_outputs())
            .context("Invalid class labels")?
    } else {
        dataset.targets
    };

    let evaluation = network
        .evaluate_classification(&dataset.inputs, &targets)
        .context("Evaluation failed")?;
    let mean_loss = network.mean_loss(&dataset.inputs, &targets)?;

    if args.show_errors {
        for (row, ok) in evaluation.per_example.iter().enumerate() {
            if !ok {
                log::info!(
                    "row {row}: predicted {:?}, target {:?}",
                    evaluation.predictions.row(row).to_vec(),
                    targets.row(row).to_vec()
                );
            }
        }
    }

    println!(
        "accuracy: {:.4} ({}/{})",
        evaluation.accuracy(),
        evaluation.correct,
        evaluation.per_example.len()
    );
    println!("mean loss: {:.6}", mean_loss);
    Ok(())
}
