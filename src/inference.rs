//! Batched prediction, label discretization, and classification scoring.
//!
//! Prediction never mutates the network: every row runs through
//! [`Network::infer`] against read-only parameters, so rows are distributed
//! across the Rayon thread pool.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;

use crate::core::{NetError, NetResult, Network};

/// Outcome of [`Network::evaluate_classification`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Raw network outputs, one row per example
    pub predictions: Array2<f64>,
    /// Number of rows whose discretized prediction equals the target row
    pub correct: usize,
    /// Correctness of each row, in input order
    pub per_example: Vec<bool>,
}

impl Evaluation {
    /// Fraction of correctly classified rows, `0.0` for an empty evaluation.
    pub fn accuracy(&self) -> f64 {
        if self.per_example.is_empty() {
            0.0
        } else {
            self.correct as f64 / self.per_example.len() as f64
        }
    }
}

impl Network {
    /// Predict every row of `inputs`.
    ///
    /// Returns a matrix of shape `(inputs.nrows(), num_outputs)`.
    ///
    /// # Errors
    /// - `DimensionMismatch` if `inputs.ncols() != num_inputs`
    pub fn predict(&self, inputs: &Array2<f64>) -> NetResult<Array2<f64>> {
        if inputs.ncols() != self.num_inputs() {
            return Err(NetError::DimensionMismatch(format!(
                "inputs have {} columns, network has {} inputs",
                inputs.ncols(),
                self.num_inputs()
            )));
        }

        let rows: Vec<Array1<f64>> = (0..inputs.nrows())
            .into_par_iter()
            .map(|r| self.infer(inputs.row(r)))
            .collect::<NetResult<_>>()?;

        let mut predictions = Array2::zeros((rows.len(), self.num_outputs()));
        for (mut dst, src) in predictions.rows_mut().into_iter().zip(&rows) {
            dst.assign(src);
        }
        Ok(predictions)
    }

    /// Predict, discretize, and compare against `targets` row by row.
    ///
    /// A row counts as correct only if the discretized prediction equals the
    /// target row exactly.
    ///
    /// # Errors
    /// - `DimensionMismatch` if inputs and targets disagree in rows, or either
    ///   disagrees with the topology in columns
    pub fn evaluate_classification(
        &self,
        inputs: &Array2<f64>,
        targets: &Array2<f64>,
    ) -> NetResult<Evaluation> {
        check_targets(self, inputs, targets)?;

        let predictions = self.predict(inputs)?;
        let labels = discretize(predictions.view());
        let per_example: Vec<bool> = labels
            .outer_iter()
            .zip(targets.outer_iter())
            .map(|(label, target)| label == target)
            .collect();
        let correct = per_example.iter().filter(|&&ok| ok).count();

        Ok(Evaluation {
            predictions,
            correct,
            per_example,
        })
    }

    /// Average per-example loss over a dataset.
    ///
    /// # Errors
    /// - `DimensionMismatch` on any shape disagreement
    pub fn mean_loss(&self, inputs: &Array2<f64>, targets: &Array2<f64>) -> NetResult<f64> {
        check_targets(self, inputs, targets)?;
        if inputs.nrows() == 0 {
            return Ok(0.0);
        }

        let predictions = self.predict(inputs)?;
        let mut total = 0.0;
        for (p, t) in predictions.outer_iter().zip(targets.outer_iter()) {
            total += self.loss().evaluate(p, t)?;
        }
        Ok(total / inputs.nrows() as f64)
    }
}

/// Convert continuous predictions into hard labels.
///
/// - One column: `1` where the prediction is at least `0.5`, otherwise `0`.
/// - Several columns: one-hot at the row maximum; ties go to the first index.
pub fn discretize(predictions: ArrayView2<f64>) -> Array2<f64> {
    let mut labels = Array2::zeros(predictions.raw_dim());

    if predictions.ncols() == 1 {
        labels.zip_mut_with(&predictions, |l, &p| {
            *l = if p >= 0.5 { 1.0 } else { 0.0 };
        });
        return labels;
    }

    for (mut label, row) in labels
        .axis_iter_mut(Axis(0))
        .zip(predictions.axis_iter(Axis(0)))
    {
        if let Some(best) = argmax(row.iter().copied()) {
            label[best] = 1.0;
        }
    }
    labels
}

/// Index of the first maximum; NaN entries never win.
fn argmax(values: impl Iterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.enumerate() {
        match best {
            None => best = Some((i, v)),
            Some((_, b)) if v > b || (b.is_nan() && !v.is_nan()) => best = Some((i, v)),
            _ => {}
        }
    }
    best.map(|(i, _)| i)
}

pub(crate) fn check_targets(
    network: &Network,
    inputs: &Array2<f64>,
    targets: &Array2<f64>,
) -> NetResult<()> {
    if inputs.nrows() != targets.nrows() {
        return Err(NetError::DimensionMismatch(format!(
            "{} input rows but {} target rows",
            inputs.nrows(),
            targets.nrows()
        )));
    }
    if inputs.ncols() != network.num_inputs() {
        return Err(NetError::DimensionMismatch(format!(
            "inputs have {} columns, network has {} inputs",
            inputs.ncols(),
            network.num_inputs()
        )));
    }
    if targets.ncols() != network.num_outputs() {
        return Err(NetError::DimensionMismatch(format!(
            "targets have {} columns, network has {} outputs",
            targets.ncols(),
            network.num_outputs()
        )));
    }
    Ok(())
}
