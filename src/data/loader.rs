//! CSV dataset loading.
//!
//! Each record is one example: the first `num_inputs` columns are the network
//! inputs and every remaining column is a target value.

use csv::ReaderBuilder;
use ndarray::Array2;
use std::path::Path;

use crate::core::{NetError, NetResult};

/// Inputs and targets with one row per example.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub inputs: Array2<f64>,
    pub targets: Array2<f64>,
}

impl Dataset {
    /// Number of examples.
    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.ncols()
    }

    pub fn num_targets(&self) -> usize {
        self.targets.ncols()
    }
}

/// Load a numeric CSV file into a [`Dataset`].
///
/// # Errors
/// `Dataset` if the file cannot be opened, a field is not a number, rows have
/// differing widths, or a row has no target columns.
pub fn load_csv(path: &Path, num_inputs: usize, has_headers: bool) -> NetResult<Dataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| NetError::Dataset(format!("Failed to open {}: {e}", path.display())))?;

    let mut width: Option<usize> = None;
    let mut values: Vec<f64> = Vec::new();
    let mut rows = 0usize;

    for (i, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| NetError::Dataset(format!("{}: record {i}: {e}", path.display())))?;

        match width {
            None => {
                if record.len() <= num_inputs {
                    return Err(NetError::Dataset(format!(
                        "{}: {} columns leave no targets after {num_inputs} inputs",
                        path.display(),
                        record.len()
                    )));
                }
                width = Some(record.len());
            }
            Some(w) if w != record.len() => {
                return Err(NetError::Dataset(format!(
                    "{}: record {i} has {} columns, expected {w}",
                    path.display(),
                    record.len()
                )));
            }
            Some(_) => {}
        }

        for (col, field) in record.iter().enumerate() {
            let v: f64 = field.parse().map_err(|e| {
                NetError::Dataset(format!(
                    "{}: record {i}, column {col}: {field:?} is not a number ({e})",
                    path.display()
                ))
            })?;
            values.push(v);
        }
        rows += 1;
    }

    let width = width.unwrap_or(num_inputs + 1);
    let all = Array2::from_shape_vec((rows, width), values)
        .map_err(|e| NetError::Dataset(format!("{}: {e}", path.display())))?;

    let inputs = all.slice(ndarray::s![.., ..num_inputs]).to_owned();
    let targets = all.slice(ndarray::s![.., num_inputs..]).to_owned();

    log::info!(
        "loaded {} examples from {} ({} inputs, {} targets)",
        rows,
        path.display(),
        num_inputs,
        width - num_inputs
    );
    Ok(Dataset { inputs, targets })
}
