//! Online training loop and per-epoch metrics.
//!
//! Every example runs one full cycle before the next is looked at:
//! ```text
//! prediction = forward(input)
//! error      = loss'(prediction, target)
//! backward(error)
//! apply_update(learning_rate)
//! ```
//! There is no batching: parameters change after every single example.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::core::{NetError, NetResult, Network};
use crate::inference::{check_targets, discretize};
use crate::TrainConfig;

/// Result of a single forward/backward/update cycle.
#[derive(Debug, Clone)]
pub struct SampleMetrics {
    /// Loss of the prediction made before the update
    pub loss: f64,
    /// Network output before the update
    pub prediction: Array1<f64>,
}

/// Summary of one pass over the training set.
#[derive(Debug, Clone, Serialize)]
pub struct EpochMetrics {
    /// Zero-based epoch index
    pub epoch: usize,
    /// Mean pre-update loss over the epoch
    pub mean_loss: f64,
    /// Fraction of examples whose pre-update prediction discretized to the target
    pub accuracy: f64,
}

/// Train the network on a single example.
///
/// # Errors
/// Propagates shape errors from the forward pass, the loss, or the backward
/// pass, and `InvalidHyperparameter` for a bad learning rate. Parameters are
/// only touched once every earlier step has succeeded.
pub fn train_sample(
    network: &mut Network,
    input: ArrayView1<f64>,
    target: ArrayView1<f64>,
    learning_rate: f64,
) -> NetResult<SampleMetrics> {
    let prediction = network.forward(&input)?;
    let loss_fn = network.loss();
    let loss = loss_fn.evaluate(prediction.view(), target)?;
    let output_error = loss_fn.derivative(prediction.view(), target)?;
    network.backward(&output_error)?;
    network.apply_update(learning_rate)?;
    Ok(SampleMetrics { loss, prediction })
}

/// Run one epoch over the rows of `inputs`/`targets` in the given order.
///
/// # Errors
/// Same as [`train_sample`]; an index in `order` past the last row is a
/// `DimensionMismatch`.
pub fn train_epoch(
    network: &mut Network,
    inputs: &Array2<f64>,
    targets: &Array2<f64>,
    order: &[usize],
    learning_rate: f64,
    epoch: usize,
) -> NetResult<EpochMetrics> {
    let mut total_loss = 0.0;
    let mut correct = 0usize;

    for &row in order {
        if row >= inputs.nrows() {
            return Err(NetError::DimensionMismatch(format!(
                "row index {row} out of range for {} examples",
                inputs.nrows()
            )));
        }
        let target = targets.row(row);
        let metrics = train_sample(network, inputs.row(row), target, learning_rate)?;
        total_loss += metrics.loss;

        let label = discretize(metrics.prediction.view().insert_axis(Axis(0)));
        if label.row(0) == target {
            correct += 1;
        }
    }

    let n = order.len().max(1) as f64;
    Ok(EpochMetrics {
        epoch,
        mean_loss: total_loss / n,
        accuracy: correct as f64 / n,
    })
}

/// Train for `config.epochs` epochs with online gradient descent.
///
/// When `config.shuffle` is set the example order is reshuffled every epoch
/// with a generator seeded from `config.shuffle_seed`; the network's own
/// random source is left untouched.
///
/// # Errors
/// - `InvalidHyperparameter` if `epochs` is zero or the learning rate is not positive
/// - `DimensionMismatch` if inputs and targets disagree with each other or the topology
pub fn train(
    network: &mut Network,
    inputs: &Array2<f64>,
    targets: &Array2<f64>,
    config: &TrainConfig,
) -> NetResult<Vec<EpochMetrics>> {
    train_with_callback(network, inputs, targets, config, |_, _| Ok::<(), NetError>(()))
}

/// [`train`], calling `on_epoch` with the updated network after every epoch.
///
/// An error from the callback stops training and is returned as is.
pub fn train_with_callback<F, E>(
    network: &mut Network,
    inputs: &Array2<f64>,
    targets: &Array2<f64>,
    config: &TrainConfig,
    mut on_epoch: F,
) -> Result<Vec<EpochMetrics>, E>
where
    F: FnMut(&Network, &EpochMetrics) -> Result<(), E>,
    E: From<NetError>,
{
    if config.epochs == 0 {
        return Err(NetError::InvalidHyperparameter("epochs must be at least 1".to_string()).into());
    }
    if !(config.learning_rate.is_finite() && config.learning_rate > 0.0) {
        return Err(NetError::InvalidHyperparameter(format!(
            "learning rate must be positive and finite, got {}",
            config.learning_rate
        ))
        .into());
    }
    check_targets(network, inputs, targets)?;

    let mut order: Vec<usize> = (0..inputs.nrows()).collect();
    let mut rng = StdRng::seed_from_u64(config.shuffle_seed);
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        if config.shuffle {
            order.shuffle(&mut rng);
        }
        let metrics = train_epoch(
            network,
            inputs,
            targets,
            &order,
            config.learning_rate,
            epoch,
        )?;

        if config.is_report_epoch(epoch) {
            log::info!(
                "epoch {:>5}: loss = {:.6}, accuracy = {:.4}",
                epoch,
                metrics.mean_loss,
                metrics.accuracy
            );
        } else {
            log::debug!("epoch {}: loss = {:.6}", epoch, metrics.mean_loss);
        }

        on_epoch(network, &metrics)?;
        history.push(metrics);
    }

    Ok(history)
}
