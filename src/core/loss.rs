//! Loss functions and their gradients with respect to the prediction.

use ndarray::{Array1, ArrayView1, Zip};
use serde::{Deserialize, Serialize};

use super::{NetError, NetResult};
use crate::utils::clip_probability;

/// Loss function used to turn a prediction into an output-layer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Loss {
    /// L = -Σ [t ln p + (1 - t) ln(1 - p)]
    #[serde(rename = "binary_cross_entropy")]
    BinaryCrossEntropy,
    /// L = -Σ t ln p
    #[serde(rename = "cross_entropy")]
    CategoricalCrossEntropy,
}

impl Loss {
    /// Scalar loss summed over output neurons.
    ///
    /// # Errors
    /// `DimensionMismatch` if prediction and target lengths differ.
    pub fn evaluate(&self, prediction: ArrayView1<f64>, target: ArrayView1<f64>) -> NetResult<f64> {
        check_lengths(prediction, target)?;
        let total = match self {
            Loss::BinaryCrossEntropy => Zip::from(prediction)
                .and(target)
                .fold(0.0, |acc, &p, &t| {
                    let p = clip_probability(p);
                    acc - (t * p.ln() + (1.0 - t) * (1.0 - p).ln())
                }),
            Loss::CategoricalCrossEntropy => Zip::from(prediction)
                .and(target)
                .fold(0.0, |acc, &p, &t| acc - t * clip_probability(p).ln()),
        };
        Ok(total)
    }

    /// Gradient ∂L/∂p, fed to the backward pass as the output error.
    ///
    /// # Errors
    /// `DimensionMismatch` if prediction and target lengths differ.
    pub fn derivative(
        &self,
        prediction: ArrayView1<f64>,
        target: ArrayView1<f64>,
    ) -> NetResult<Array1<f64>> {
        check_lengths(prediction, target)?;
        let grad = match self {
            Loss::BinaryCrossEntropy => Zip::from(prediction).and(target).map_collect(|&p, &t| {
                let p = clip_probability(p);
                (p - t) / (p * (1.0 - p))
            }),
            Loss::CategoricalCrossEntropy => Zip::from(prediction)
                .and(target)
                .map_collect(|&p, &t| -t / clip_probability(p)),
        };
        Ok(grad)
    }

    /// Identifier used in checkpoints and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Loss::BinaryCrossEntropy => "binary_cross_entropy",
            Loss::CategoricalCrossEntropy => "cross_entropy",
        }
    }

    /// Parse an identifier produced by [`Loss::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "binary_cross_entropy" => Some(Loss::BinaryCrossEntropy),
            "cross_entropy" => Some(Loss::CategoricalCrossEntropy),
            _ => None,
        }
    }
}

impl std::fmt::Display for Loss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Loss {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Loss::from_name(s).ok_or_else(|| format!("Unknown loss function: {s}"))
    }
}

fn check_lengths(prediction: ArrayView1<f64>, target: ArrayView1<f64>) -> NetResult<()> {
    if prediction.len() != target.len() {
        return Err(NetError::DimensionMismatch(format!(
            "prediction has {} entries but target has {}",
            prediction.len(),
            target.len()
        )));
    }
    Ok(())
}
