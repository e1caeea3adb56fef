//! Core network implementation.
//!
//! This module provides the fundamental structures and operations:
//! - Topology construction and seeded parameter initialization
//! - Forward propagation with cached linear combinations and activations
//! - Backward propagation through per-layer activation jacobians
//! - Plain gradient-descent parameter updates
//!
//! ## Backpropagation
//!
//! For a network with layers `0..L`, transition `t` maps layer `t` to layer `t+1`:
//! ```text
//! z^{t+1} = a^t · W^t + b^t
//! a^{t+1} = f(z^{t+1})
//! ```
//!
//! Given the output error `e^{L-1} = ∂loss/∂a^{L-1}`, the backward pass walks the
//! transitions in reverse:
//! ```text
//! δ^{t+1}  = J_f(z^{t+1})ᵀ · e^{t+1}
//! ∂W^t     = a^t ⊗ δ^{t+1}
//! ∂b^t     = δ^{t+1}
//! e^t      = W^t · δ^{t+1}
//! ```
//!
//! The caches written by `forward` are only valid for the example that produced
//! them, so the network tracks a [`Phase`] and refuses to backpropagate or update
//! from stale state.

pub mod activation;
pub mod loss;

pub use activation::Activation;
pub use loss::Loss;

use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Axis, Data, Ix1};
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::utils;

/// Error type for network operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetError {
    /// A layer size is zero or the layer list is too short
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),
    /// Vector or matrix shape disagrees with the declared topology
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// Backward pass or update invoked without the state it depends on
    #[error("Stale state: {0}")]
    StaleState(String),
    /// Learning rate, epoch count, or similar out of range
    #[error("Invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),
    /// Checkpoint could not be written, read, or reconciled with its topology
    #[error("Persistence error: {0}")]
    Persistence(String),
    /// Dataset file could not be read or parsed
    #[error("Dataset error: {0}")]
    Dataset(String),
}

pub type NetResult<T> = Result<T, NetError>;

/// Construction parameters for a [`Network`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Number of input neurons
    pub num_inputs: usize,
    /// Hidden layer sizes, in order (may be empty)
    pub num_hidden: Vec<usize>,
    /// Number of output neurons
    pub num_outputs: usize,
    /// Activation applied to the output layer
    pub activation: Activation,
    /// Activation applied to every hidden layer
    pub hidden_activation: Activation,
    /// Loss used to derive the output error during training
    pub loss: Loss,
    /// Seed for the network's own random source
    pub seed: u64,
}

impl NetworkConfig {
    /// Create a configuration that uses `activation` for every layer.
    pub fn new(
        num_inputs: usize,
        num_hidden: Vec<usize>,
        num_outputs: usize,
        activation: Activation,
        loss: Loss,
        seed: u64,
    ) -> Self {
        Self {
            num_inputs,
            num_hidden,
            num_outputs,
            activation,
            hidden_activation: activation,
            loss,
            seed,
        }
    }

    /// Single sigmoid output trained with binary cross-entropy.
    pub fn binary_classification(num_inputs: usize, num_hidden: Vec<usize>, seed: u64) -> Self {
        Self::new(
            num_inputs,
            num_hidden,
            1,
            Activation::Sigmoid,
            Loss::BinaryCrossEntropy,
            seed,
        )
    }

    /// Softmax output over `num_classes` trained with categorical cross-entropy.
    pub fn multiclass_classification(
        num_inputs: usize,
        num_hidden: Vec<usize>,
        num_classes: usize,
        seed: u64,
    ) -> Self {
        Self::new(
            num_inputs,
            num_hidden,
            num_classes,
            Activation::Softmax,
            Loss::CategoricalCrossEntropy,
            seed,
        )
    }

    /// Override the activation used by the hidden layers.
    pub fn with_hidden_activation(mut self, activation: Activation) -> Self {
        self.hidden_activation = activation;
        self
    }

    /// Layer sizes `[num_inputs, num_hidden..., num_outputs]`.
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut layers = Vec::with_capacity(self.num_hidden.len() + 2);
        layers.push(self.num_inputs);
        layers.extend_from_slice(&self.num_hidden);
        layers.push(self.num_outputs);
        layers
    }
}

/// Which cached state is currently valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No valid caches or gradients
    Idle,
    /// Caches hold the most recent forward pass
    Forwarded,
    /// Gradients hold the most recent backward pass (or were set explicitly)
    Backpropagated,
}

/// A fully-connected feedforward network.
///
/// # Architecture
///
/// - **Layers:** indexed 0 (input) to L-1 (output)
/// - **Weights:** `weights[t]` maps layer `t` to layer `t+1`, shape `(d_t, d_{t+1})`
/// - **Biases:** `biases[t]` has shape `(d_{t+1})`
/// - **Caches:** `linear_comb[t]` holds the pre-activations of layer `t+1`;
///   `activations[l]` holds the output of layer `l` (layer 0 is the raw input)
///
/// # Initialization
///
/// Weights and biases are drawn from Xavier/Glorot uniform `U(-limit, limit)`
/// with `limit = sqrt(6 / (fan_in + fan_out))`, using an `StdRng` seeded from
/// the configuration and owned by the instance.
#[derive(Clone)]
pub struct Network {
    layers: Vec<usize>,
    activation: Activation,
    hidden_activation: Activation,
    loss: Loss,
    seed: u64,
    rng: StdRng,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    weight_grads: Vec<Array2<f64>>,
    bias_grads: Vec<Array1<f64>>,
    linear_comb: Vec<Array1<f64>>,
    activations: Vec<Array1<f64>>,
    phase: Phase,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("layers", &self.layers)
            .field("activation", &self.activation)
            .field("hidden_activation", &self.hidden_activation)
            .field("loss", &self.loss)
            .field("seed", &self.seed)
            .field("weights", &format!("<{} weight matrices>", self.weights.len()))
            .field("biases", &format!("<{} bias vectors>", self.biases.len()))
            .field("phase", &self.phase)
            .finish()
    }
}

impl Network {
    /// Build a network and draw its initial parameters.
    ///
    /// # Errors
    /// - `InvalidTopology` if any layer size is zero
    pub fn new(config: &NetworkConfig) -> NetResult<Self> {
        let layers = config.layer_sizes();
        validate_layers(&layers)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let (weights, biases) = init_parameters(&layers, &mut rng);

        let weight_grads = weights.iter().map(|w| Array2::zeros(w.dim())).collect();
        let bias_grads = biases.iter().map(|b| Array1::zeros(b.len())).collect();
        let linear_comb = layers[1..].iter().map(|&d| Array1::zeros(d)).collect();
        let activations = layers.iter().map(|&d| Array1::zeros(d)).collect();

        Ok(Self {
            layers,
            activation: config.activation,
            hidden_activation: config.hidden_activation,
            loss: config.loss,
            seed: config.seed,
            rng,
            weights,
            biases,
            weight_grads,
            bias_grads,
            linear_comb,
            activations,
            phase: Phase::Idle,
        })
    }

    /// Configuration that reproduces this network's topology and choices.
    pub fn config(&self) -> NetworkConfig {
        NetworkConfig {
            num_inputs: self.num_inputs(),
            num_hidden: self.num_hidden().to_vec(),
            num_outputs: self.num_outputs(),
            activation: self.activation,
            hidden_activation: self.hidden_activation,
            loss: self.loss,
            seed: self.seed,
        }
    }

    /// Layer sizes, input first.
    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    pub fn num_inputs(&self) -> usize {
        self.layers[0]
    }

    pub fn num_hidden(&self) -> &[usize] {
        &self.layers[1..self.layers.len() - 1]
    }

    pub fn num_outputs(&self) -> usize {
        self.layers[self.layers.len() - 1]
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn hidden_activation(&self) -> Activation {
        self.hidden_activation
    }

    pub fn loss(&self) -> Loss {
        self.loss
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn weights(&self) -> &[Array2<f64>] {
        &self.weights
    }

    pub fn biases(&self) -> &[Array1<f64>] {
        &self.biases
    }

    pub fn weight_gradients(&self) -> &[Array2<f64>] {
        &self.weight_grads
    }

    pub fn bias_gradients(&self) -> &[Array1<f64>] {
        &self.bias_grads
    }

    /// Pre-activations of every non-input layer from the last forward pass.
    pub fn linear_combinations(&self) -> &[Array1<f64>] {
        &self.linear_comb
    }

    /// Activations of every layer from the last forward pass.
    pub fn activations(&self) -> &[Array1<f64>] {
        &self.activations
    }

    /// Replace all weights and biases.
    ///
    /// Invalidates the forward caches and any pending gradients.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the number or shape of any block disagrees with the topology
    pub fn set_parameters(
        &mut self,
        weights: Vec<Array2<f64>>,
        biases: Vec<Array1<f64>>,
    ) -> NetResult<()> {
        self.check_blocks(&weights, &biases, "parameter")?;
        self.weights = weights;
        self.biases = biases;
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Replace the gradient accumulators, as if a backward pass had produced them.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the number or shape of any block disagrees with the topology
    pub fn set_gradients(
        &mut self,
        weight_grads: Vec<Array2<f64>>,
        bias_grads: Vec<Array1<f64>>,
    ) -> NetResult<()> {
        self.check_blocks(&weight_grads, &bias_grads, "gradient")?;
        self.weight_grads = weight_grads;
        self.bias_grads = bias_grads;
        self.phase = Phase::Backpropagated;
        Ok(())
    }

    /// Redraw every weight and bias from the instance's random source.
    ///
    /// The source is not reseeded, so successive resets yield different parameters.
    pub fn reset_parameters(&mut self) {
        let (weights, biases) = init_parameters(&self.layers, &mut self.rng);
        self.weights = weights;
        self.biases = biases;
        self.phase = Phase::Idle;
    }

    /// Forward propagation with caching.
    ///
    /// # Algorithm
    ///
    /// ```text
    /// a^0 = inputs
    /// for t in 0..L-1:
    ///     z^{t+1} = a^t · W^t + b^t
    ///     a^{t+1} = f_{t+1}(z^{t+1})
    /// ```
    ///
    /// `f` is the hidden activation for every layer except the last, which uses
    /// the output activation. Overwrites the linear-combination and activation
    /// caches and marks them fresh for [`Network::backward`].
    ///
    /// # Errors
    /// - `DimensionMismatch` if `inputs.len() != num_inputs`
    pub fn forward<S>(&mut self, inputs: &ArrayBase<S, Ix1>) -> NetResult<Array1<f64>>
    where
        S: Data<Elem = f64>,
    {
        self.check_input(inputs.len())?;
        self.activations[0].assign(inputs);

        for t in 0..self.weights.len() {
            let (z, a) = self.propagate(t, self.activations[t].view());
            self.linear_comb[t] = z;
            self.activations[t + 1] = a;
        }

        self.phase = Phase::Forwarded;
        Ok(self.activations[self.layers.len() - 1].clone())
    }

    /// Forward propagation without touching the caches.
    ///
    /// Used by batched prediction, where rows are processed independently and
    /// possibly in parallel.
    ///
    /// # Errors
    /// - `DimensionMismatch` if `inputs.len() != num_inputs`
    pub fn infer(&self, inputs: ArrayView1<f64>) -> NetResult<Array1<f64>> {
        self.check_input(inputs.len())?;
        let mut a = inputs.to_owned();
        for t in 0..self.weights.len() {
            let (_, next) = self.propagate(t, a.view());
            a = next;
        }
        Ok(a)
    }

    /// Backward propagation of an output-layer error.
    ///
    /// # Algorithm
    ///
    /// For transitions t from L-2 down to 0:
    /// ```text
    /// δ        = J_f(z^{t+1})ᵀ · e
    /// ∂b^t     = δ
    /// ∂W^t     = a^t ⊗ δ          (outer product, shape (d_t, d_{t+1}))
    /// e        = W^t · δ          (error handed to layer t)
    /// ```
    ///
    /// Both supported jacobians are symmetric, so the transpose only matters for
    /// activations that might be added later.
    ///
    /// Gradients are overwritten, not accumulated.
    ///
    /// # Returns
    /// The error propagated into the input layer (length `num_inputs`).
    ///
    /// # Errors
    /// - `DimensionMismatch` if `output_error.len() != num_outputs`
    /// - `StaleState` unless the previous state-changing call was a successful `forward`
    pub fn backward<S>(&mut self, output_error: &ArrayBase<S, Ix1>) -> NetResult<Array1<f64>>
    where
        S: Data<Elem = f64>,
    {
        if output_error.len() != self.num_outputs() {
            return Err(NetError::DimensionMismatch(format!(
                "output error has {} entries, network has {} outputs",
                output_error.len(),
                self.num_outputs()
            )));
        }
        if self.phase != Phase::Forwarded {
            return Err(NetError::StaleState(format!(
                "backward requires a fresh forward pass (current phase: {:?})",
                self.phase
            )));
        }

        let mut error = output_error.to_owned();
        for t in (0..self.weights.len()).rev() {
            let jacobian = self.layer_activation(t).jacobian(&self.linear_comb[t]);
            let delta = jacobian.t().dot(&error);

            let a_col = self.activations[t].view().insert_axis(Axis(1));
            let delta_row = delta.view().insert_axis(Axis(0));
            let weight_grad = &a_col * &delta_row;

            self.weight_grads[t].assign(&weight_grad);
            self.bias_grads[t].assign(&delta);

            error = self.weights[t].dot(&delta);
        }

        self.phase = Phase::Backpropagated;
        Ok(error)
    }

    /// Gradient-descent step: `θ ← θ - learning_rate · ∂θ` for every weight and bias.
    ///
    /// Consumes the gradients; a further update needs another backward pass.
    ///
    /// # Errors
    /// - `InvalidHyperparameter` if `learning_rate` is not a positive finite number
    /// - `StaleState` if no fresh gradients are available
    pub fn apply_update(&mut self, learning_rate: f64) -> NetResult<()> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(NetError::InvalidHyperparameter(format!(
                "learning rate must be positive and finite, got {learning_rate}"
            )));
        }
        if self.phase != Phase::Backpropagated {
            return Err(NetError::StaleState(format!(
                "apply_update requires fresh gradients (current phase: {:?})",
                self.phase
            )));
        }

        for (w, g) in self.weights.iter_mut().zip(&self.weight_grads) {
            w.scaled_add(-learning_rate, g);
        }
        for (b, g) in self.biases.iter_mut().zip(&self.bias_grads) {
            b.scaled_add(-learning_rate, g);
        }

        self.phase = Phase::Idle;
        Ok(())
    }

    /// Activation used by the layer that transition `t` feeds.
    fn layer_activation(&self, t: usize) -> Activation {
        if t + 2 == self.layers.len() {
            self.activation
        } else {
            self.hidden_activation
        }
    }

    /// Linear combination and activation of the layer fed by transition `t`.
    ///
    /// The weighted sum of finite inputs can still overflow, so it is saturated
    /// before it is cached or activated.
    fn propagate(&self, t: usize, input: ArrayView1<f64>) -> (Array1<f64>, Array1<f64>) {
        let z = (input.dot(&self.weights[t]) + &self.biases[t]).mapv_into(utils::saturate);
        let a = self.layer_activation(t).apply(&z);
        (z, a)
    }

    fn check_input(&self, len: usize) -> NetResult<()> {
        if len != self.num_inputs() {
            return Err(NetError::DimensionMismatch(format!(
                "input has {} entries, network has {} inputs",
                len,
                self.num_inputs()
            )));
        }
        Ok(())
    }

    fn check_blocks(
        &self,
        matrices: &[Array2<f64>],
        vectors: &[Array1<f64>],
        what: &str,
    ) -> NetResult<()> {
        let transitions = self.layers.len() - 1;
        if matrices.len() != transitions || vectors.len() != transitions {
            return Err(NetError::DimensionMismatch(format!(
                "expected {} {what} matrices and vectors, got {} and {}",
                transitions,
                matrices.len(),
                vectors.len()
            )));
        }
        for (t, pair) in self.layers.windows(2).enumerate() {
            let expected = (pair[0], pair[1]);
            if matrices[t].dim() != expected {
                return Err(NetError::DimensionMismatch(format!(
                    "{what} matrix {t} has shape {:?}, expected {:?}",
                    matrices[t].dim(),
                    expected
                )));
            }
            if vectors[t].len() != pair[1] {
                return Err(NetError::DimensionMismatch(format!(
                    "{what} vector {t} has length {}, expected {}",
                    vectors[t].len(),
                    pair[1]
                )));
            }
        }
        Ok(())
    }
}

/// Check that a layer list describes a usable network.
pub(crate) fn validate_layers(layers: &[usize]) -> NetResult<()> {
    if layers.len() < 2 {
        return Err(NetError::InvalidTopology(
            "Must have at least 2 layers (input and output)".to_string(),
        ));
    }
    if let Some(l) = layers.iter().position(|&d| d == 0) {
        return Err(NetError::InvalidTopology(format!(
            "layer {l} has zero neurons (layers: {layers:?})"
        )));
    }
    Ok(())
}

fn init_parameters(layers: &[usize], rng: &mut StdRng) -> (Vec<Array2<f64>>, Vec<Array1<f64>>) {
    let mut weights = Vec::with_capacity(layers.len() - 1);
    let mut biases = Vec::with_capacity(layers.len() - 1);

    for pair in layers.windows(2) {
        let (fan_in, fan_out) = (pair[0], pair[1]);
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let dist = Uniform::new(-limit, limit);
        weights.push(Array2::random_using((fan_in, fan_out), dist, rng));
        biases.push(Array1::random_using(fan_out, dist, rng));
    }

    (weights, biases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sigmoid_net(hidden: Vec<usize>) -> Network {
        Network::new(&NetworkConfig::binary_classification(2, hidden, 1)).unwrap()
    }

    #[test]
    fn test_network_init() {
        let net = sigmoid_net(vec![4, 3]);
        assert_eq!(net.layers(), &[2, 4, 3, 1]);
        assert_eq!(net.num_hidden(), &[4, 3]);
        assert_eq!(net.weights().len(), 3);
        assert_eq!(net.weights()[1].dim(), (4, 3));
        assert_eq!(net.biases()[2].len(), 1);
        assert_eq!(net.phase(), Phase::Idle);
    }

    #[test]
    fn test_invalid_layer_size() {
        let config = NetworkConfig::binary_classification(2, vec![3, 0], 1);
        assert!(matches!(
            Network::new(&config),
            Err(NetError::InvalidTopology(_))
        ));
        let config = NetworkConfig::binary_classification(0, vec![], 1);
        assert!(matches!(
            Network::new(&config),
            Err(NetError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_initial_weights_within_xavier_limit() {
        let net = sigmoid_net(vec![5]);
        let limit = (6.0f64 / 7.0).sqrt();
        assert!(net.weights()[0].iter().all(|w| w.abs() <= limit));
    }

    #[test]
    fn test_forward_updates_caches() {
        let mut net = sigmoid_net(vec![3]);
        let out = net.forward(&array![0.5, -0.5]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(net.activations()[0], array![0.5, -0.5]);
        assert_eq!(net.activations()[2], out);
        assert_eq!(net.phase(), Phase::Forwarded);
    }

    #[test]
    fn test_forward_rejects_wrong_length() {
        let mut net = sigmoid_net(vec![]);
        assert!(matches!(
            net.forward(&array![1.0, 2.0, 3.0]),
            Err(NetError::DimensionMismatch(_))
        ));
        assert_eq!(net.phase(), Phase::Idle);
    }

    #[test]
    fn test_infer_matches_forward() {
        let mut net = sigmoid_net(vec![4]);
        let x = array![0.1, 0.9];
        let inferred = net.infer(x.view()).unwrap();
        let forwarded = net.forward(&x).unwrap();
        assert_eq!(inferred, forwarded);
    }

    #[test]
    fn test_phase_transitions() {
        let mut net = sigmoid_net(vec![2]);
        assert!(matches!(
            net.backward(&array![1.0]),
            Err(NetError::StaleState(_))
        ));
        assert!(matches!(net.apply_update(0.1), Err(NetError::StaleState(_))));

        net.forward(&array![1.0, 0.0]).unwrap();
        assert!(matches!(net.apply_update(0.1), Err(NetError::StaleState(_))));
        net.backward(&array![1.0]).unwrap();
        assert!(matches!(
            net.backward(&array![1.0]),
            Err(NetError::StaleState(_))
        ));
        net.apply_update(0.1).unwrap();
        assert!(matches!(net.apply_update(0.1), Err(NetError::StaleState(_))));
    }

    #[test]
    fn test_invalid_learning_rate() {
        let mut net = sigmoid_net(vec![]);
        net.forward(&array![1.0, 1.0]).unwrap();
        net.backward(&array![1.0]).unwrap();
        for lr in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                net.apply_update(lr),
                Err(NetError::InvalidHyperparameter(_))
            ));
        }
        // gradients are still pending after a rejected update
        assert!(net.apply_update(0.5).is_ok());
    }

    #[test]
    fn test_set_parameters_rejects_wrong_shape() {
        let mut net = sigmoid_net(vec![2]);
        let result = net.set_parameters(
            vec![Array2::zeros((2, 2)), Array2::zeros((3, 1))],
            vec![Array1::zeros(2), Array1::zeros(1)],
        );
        assert!(matches!(result, Err(NetError::DimensionMismatch(_))));
    }

    #[test]
    fn test_reset_parameters_draws_new_values() {
        let mut net = sigmoid_net(vec![3]);
        let before = net.weights().to_vec();
        net.reset_parameters();
        assert_ne!(net.weights()[0], before[0]);
    }

    #[test]
    fn test_config_round_trip() {
        let config = NetworkConfig::multiclass_classification(4, vec![6, 5], 3, 42)
            .with_hidden_activation(Activation::Sigmoid);
        let net = Network::new(&config).unwrap();
        assert_eq!(net.config(), config);
    }
}
