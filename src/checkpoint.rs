//! Checkpoint save/load for networks.
//!
//! A checkpoint is a directory holding two JSON files:
//! - `config.json`: layer sizes, activation/loss identifiers, and seed
//! - `parameters.json`: every weight matrix and bias vector keyed by layer index
//!
//! Floats are written with `serde_json`'s round-trip formatting, so a loaded
//! network is bit-for-bit identical to the saved one.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::{validate_layers, Activation, Loss, NetError, NetResult, Network, NetworkConfig};

/// File name of the configuration part of a checkpoint.
pub const CONFIG_FILE: &str = "config.json";
/// File name of the parameter part of a checkpoint.
pub const PARAMETERS_FILE: &str = "parameters.json";

/// Serializable topology and function choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Layer sizes, input first.
    pub layers: Vec<usize>,
    /// Output activation ("sigmoid" or "softmax").
    pub activation: String,
    /// Hidden activation; defaults to the output activation when absent.
    #[serde(default)]
    pub hidden_activation: Option<String>,
    /// Loss function ("binary_cross_entropy" or "cross_entropy").
    pub loss: String,
    /// Seed the network was constructed with.
    pub seed: u64,
}

/// Weights and biases of one layer transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParameters {
    /// Transition index: layer `layer` → layer `layer + 1`.
    pub layer: usize,
    /// Weight matrix as nested Vec, one inner Vec per source neuron.
    pub weights: Vec<Vec<f64>>,
    /// Bias vector of the destination layer.
    pub biases: Vec<f64>,
}

/// Serializable parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointParameters {
    pub layers: Vec<LayerParameters>,
}

/// Convert an Array2 to Vec<Vec<f64>> for serialization.
fn array2_to_vecs(arr: &Array2<f64>) -> Vec<Vec<f64>> {
    arr.rows().into_iter().map(|row| row.to_vec()).collect()
}

/// Convert Vec<Vec<f64>> back to Array2, rejecting ragged rows.
fn vecs_to_array2(vecs: &[Vec<f64>]) -> Result<Array2<f64>, String> {
    if vecs.is_empty() {
        return Ok(Array2::zeros((0, 0)));
    }
    let nrows = vecs.len();
    let ncols = vecs[0].len();
    if let Some(r) = vecs.iter().position(|row| row.len() != ncols) {
        return Err(format!(
            "row {r} has {} entries, expected {ncols}",
            vecs[r].len()
        ));
    }
    let flat: Vec<f64> = vecs.iter().flat_map(|r| r.iter().copied()).collect();
    Array2::from_shape_vec((nrows, ncols), flat)
        .map_err(|e| format!("Failed to reconstruct weight matrix: {e}"))
}

fn persistence(msg: impl Into<String>) -> NetError {
    NetError::Persistence(msg.into())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> NetResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| persistence(format!("Failed to serialize {}: {e}", path.display())))?;
    std::fs::write(path, json)
        .map_err(|e| persistence(format!("Failed to write {}: {e}", path.display())))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> NetResult<T> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| persistence(format!("Failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&json)
        .map_err(|e| persistence(format!("Failed to parse {}: {e}", path.display())))
}

/// Save a network's configuration and parameters under `dir`.
///
/// The directory (and any missing parents) is created if needed; existing
/// checkpoint files in it are overwritten.
///
/// # Errors
/// `Persistence` if the directory or files cannot be written.
pub fn save_checkpoint(network: &Network, dir: &Path) -> NetResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        persistence(format!(
            "Failed to create checkpoint directory {}: {e}",
            dir.display()
        ))
    })?;

    let config = CheckpointConfig {
        layers: network.layers().to_vec(),
        activation: network.activation().name().to_string(),
        hidden_activation: Some(network.hidden_activation().name().to_string()),
        loss: network.loss().name().to_string(),
        seed: network.seed(),
    };
    let parameters = CheckpointParameters {
        layers: network
            .weights()
            .iter()
            .zip(network.biases())
            .enumerate()
            .map(|(layer, (w, b))| LayerParameters {
                layer,
                weights: array2_to_vecs(w),
                biases: b.to_vec(),
            })
            .collect(),
    };

    write_json(&dir.join(CONFIG_FILE), &config)?;
    write_json(&dir.join(PARAMETERS_FILE), &parameters)?;

    log::debug!(
        "saved checkpoint to {} (layers {:?})",
        dir.display(),
        network.layers()
    );
    Ok(())
}

/// Load a network previously written by [`save_checkpoint`].
///
/// # Errors
/// `Persistence` if a file is missing or malformed, an identifier is unknown,
/// a layer index is missing or duplicated, or a block's shape disagrees with
/// the declared layer sizes.
pub fn load_checkpoint(dir: &Path) -> NetResult<Network> {
    let config: CheckpointConfig = read_json(&dir.join(CONFIG_FILE))?;
    let parameters: CheckpointParameters = read_json(&dir.join(PARAMETERS_FILE))?;

    validate_layers(&config.layers).map_err(|e| persistence(e.to_string()))?;
    let activation = Activation::from_name(&config.activation)
        .ok_or_else(|| persistence(format!("Unknown activation function: {}", config.activation)))?;
    let hidden_activation = match &config.hidden_activation {
        Some(name) => Activation::from_name(name)
            .ok_or_else(|| persistence(format!("Unknown activation function: {name}")))?,
        None => activation,
    };
    let loss = Loss::from_name(&config.loss)
        .ok_or_else(|| persistence(format!("Unknown loss function: {}", config.loss)))?;

    let n = config.layers.len();
    let network_config = NetworkConfig {
        num_inputs: config.layers[0],
        num_hidden: config.layers[1..n - 1].to_vec(),
        num_outputs: config.layers[n - 1],
        activation,
        hidden_activation,
        loss,
        seed: config.seed,
    };
    let mut network = Network::new(&network_config).map_err(|e| persistence(e.to_string()))?;

    let transitions = n - 1;
    let mut slots: Vec<Option<&LayerParameters>> = vec![None; transitions];
    for entry in &parameters.layers {
        let Some(slot) = slots.get_mut(entry.layer) else {
            return Err(persistence(format!(
                "parameters for layer {} but network has {transitions} transitions",
                entry.layer
            )));
        };
        if slot.is_some() {
            return Err(persistence(format!(
                "duplicate parameters for layer {}",
                entry.layer
            )));
        }
        *slot = Some(entry);
    }

    let mut weights = Vec::with_capacity(transitions);
    let mut biases = Vec::with_capacity(transitions);
    for (layer, slot) in slots.into_iter().enumerate() {
        let entry = slot.ok_or_else(|| persistence(format!("missing parameters for layer {layer}")))?;
        weights.push(
            vecs_to_array2(&entry.weights)
                .map_err(|e| persistence(format!("layer {layer}: {e}")))?,
        );
        biases.push(Array1::from(entry.biases.clone()));
    }

    network
        .set_parameters(weights, biases)
        .map_err(|e| persistence(e.to_string()))?;

    log::debug!(
        "loaded checkpoint from {} (layers {:?})",
        dir.display(),
        network.layers()
    );
    Ok(network)
}

impl Network {
    /// Save this network under `dir`. See [`save_checkpoint`].
    pub fn save(&self, dir: impl AsRef<Path>) -> NetResult<()> {
        save_checkpoint(self, dir.as_ref())
    }

    /// Load a network from `dir`. See [`load_checkpoint`].
    pub fn load(dir: impl AsRef<Path>) -> NetResult<Self> {
        load_checkpoint(dir.as_ref())
    }
}
