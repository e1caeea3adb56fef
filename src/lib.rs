//! # neuralnet
//!
//! A fully-connected feedforward neural network trained by backpropagation,
//! implemented from first principles on dense `ndarray` arrays.
//!
//! ## Overview
//!
//! A [`Network`] owns its weights, biases, gradient accumulators, and the
//! forward caches that backpropagation reads. Training is plain online gradient
//! descent: one forward pass, one backward pass, and one parameter update per
//! example. Activations (sigmoid, softmax) and losses (binary and categorical
//! cross-entropy) are closed enums selected at construction.
//!
//! ## Structure
//!
//! - [`core`]: Network kernel, activation and loss libraries, error type
//! - [`training`]: Online training loop and per-epoch metrics
//! - [`inference`]: Batched prediction, discretization, classification scoring
//! - [`checkpoint`]: Save/load of configuration and parameters
//! - [`data`]: CSV dataset loading and preprocessing
//! - [`utils`]: Scalar math helpers

pub mod checkpoint;
pub mod core;
pub mod data;
pub mod inference;
pub mod training;
pub mod utils;

pub use crate::core::{
    Activation, Loss, NetError, NetResult, Network, NetworkConfig, Phase,
};
pub use checkpoint::{load_checkpoint, save_checkpoint};
pub use inference::{discretize, Evaluation};
pub use training::{
    train, train_epoch, train_sample, train_with_callback, EpochMetrics, SampleMetrics,
};

/// Training configuration for the online gradient-descent loop.
///
/// Used by [`train`].
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Reshuffle the example order at the start of every epoch
    pub shuffle: bool,
    /// Seed for the shuffling generator (independent of the network seed)
    pub shuffle_seed: u64,
    /// Log a summary every N epochs at info level (0 = debug level only)
    pub log_every: usize,
}

impl TrainConfig {
    /// Whether `epoch` gets an info-level summary: every `log_every` epochs
    /// and the final one.
    pub fn is_report_epoch(&self, epoch: usize) -> bool {
        self.log_every > 0 && (epoch % self.log_every == 0 || epoch + 1 == self.epochs)
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 0.1,
            shuffle: false,
            shuffle_seed: 0,
            log_every: 10,
        }
    }
}
