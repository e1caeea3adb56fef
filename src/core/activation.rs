//! Activation functions and their jacobians.
//!
//! Every activation exposes the forward map `f(z)` and the full jacobian
//! `J[i][j] = ∂f_i/∂z_j`. Backpropagation always goes through the jacobian so
//! that coupled activations (softmax) and elementwise ones (sigmoid) share a
//! single code path.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::utils;

/// Activation function applied to a layer's linear combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Logistic sigmoid: f(z) = 1 / (1 + e^-z), applied elementwise.
    ///
    /// Jacobian is diagonal: `J = diag(f(z) ⊙ (1 - f(z)))`.
    Sigmoid,
    /// Softmax over the whole layer: f(z)_i = e^{z_i} / Σ_j e^{z_j}.
    ///
    /// Jacobian is dense: `J = diag(a) - a aᵀ` with `a = f(z)`.
    Softmax,
}

impl Activation {
    /// Apply the activation to a vector of pre-activations.
    ///
    /// Non-finite entries are saturated first, so the output is always a
    /// valid activation: sigmoid in `[0, 1]`, softmax summing to 1.
    pub fn apply(&self, z: &Array1<f64>) -> Array1<f64> {
        match self {
            Activation::Sigmoid => z.mapv(|v| utils::sigmoid(utils::saturate(v))),
            Activation::Softmax => softmax(z),
        }
    }

    /// Jacobian of the activation evaluated at `z`.
    ///
    /// Shape `(n, n)` where `n = z.len()`.
    pub fn jacobian(&self, z: &Array1<f64>) -> Array2<f64> {
        match self {
            Activation::Sigmoid => {
                Array2::from_diag(&z.mapv(|v| utils::d_sigmoid(utils::saturate(v))))
            }
            Activation::Softmax => {
                let a = softmax(z);
                let n = a.len();
                Array2::from_shape_fn((n, n), |(i, j)| {
                    if i == j {
                        a[i] * (1.0 - a[i])
                    } else {
                        -a[i] * a[j]
                    }
                })
            }
        }
    }

    /// Identifier used in checkpoints and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::Softmax => "softmax",
        }
    }

    /// Parse an identifier produced by [`Activation::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sigmoid" => Some(Activation::Sigmoid),
            "softmax" => Some(Activation::Softmax),
            _ => None,
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Activation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Activation::from_name(s).ok_or_else(|| format!("Unknown activation function: {s}"))
    }
}

/// Numerically stable softmax: the maximum is subtracted before exponentiating.
fn softmax(z: &Array1<f64>) -> Array1<f64> {
    if z.is_empty() {
        return Array1::zeros(0);
    }
    let z = z.mapv(utils::saturate);
    let max = z.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    let exp = z.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}
