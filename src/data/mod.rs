//! Dataset loading and preprocessing.
//!
//! ## Submodules
//!
//! - [`loader`]: CSV files to input/target matrices

pub mod loader;

pub use loader::{load_csv, Dataset};

use ndarray::{Array2, ArrayView1, Axis, Slice};

use crate::core::{NetError, NetResult};

/// Encode class indices as one-hot rows.
///
/// # Errors
/// `Dataset` if a label is not below `num_classes`.
pub fn one_hot(labels: &[usize], num_classes: usize) -> NetResult<Array2<f64>> {
    let mut encoded = Array2::zeros((labels.len(), num_classes));
    for (row, &label) in labels.iter().enumerate() {
        if label >= num_classes {
            return Err(NetError::Dataset(format!(
                "label {label} at row {row} is out of range for {num_classes} classes"
            )));
        }
        encoded[[row, label]] = 1.0;
    }
    Ok(encoded)
}

/// Read class indices stored as floats in a CSV column.
///
/// # Errors
/// `Dataset` if a value is negative, fractional, or not finite.
pub fn class_indices(values: ArrayView1<f64>) -> NetResult<Vec<usize>> {
    values
        .iter()
        .enumerate()
        .map(|(row, &v)| {
            if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
                Ok(v as usize)
            } else {
                Err(NetError::Dataset(format!(
                    "label {v} at row {row} is not a class index"
                )))
            }
        })
        .collect()
}

/// One-hot encode a target matrix holding a single column of class indices.
///
/// # Errors
/// `Dataset` if there is not exactly one column or a label is invalid.
pub fn one_hot_column(targets: &Array2<f64>, num_classes: usize) -> NetResult<Array2<f64>> {
    if targets.ncols() != 1 {
        return Err(NetError::Dataset(format!(
            "expected one label column, found {}",
            targets.ncols()
        )));
    }
    let labels = class_indices(targets.column(0))?;
    one_hot(&labels, num_classes)
}

/// Split rows into train and eval sets, keeping order; the last
/// `eval_fraction` of the rows become the eval set.
pub fn train_eval_split(
    inputs: &Array2<f64>,
    targets: &Array2<f64>,
    eval_fraction: f64,
) -> (Array2<f64>, Array2<f64>, Array2<f64>, Array2<f64>) {
    let n = inputs.nrows();
    let eval_count = ((n as f64) * eval_fraction.clamp(0.0, 1.0)) as usize;
    let train_count = n - eval_count;

    let train_inputs = inputs
        .slice_axis(Axis(0), Slice::from(..train_count))
        .to_owned();
    let train_targets = targets
        .slice_axis(Axis(0), Slice::from(..train_count))
        .to_owned();
    let eval_inputs = inputs
        .slice_axis(Axis(0), Slice::from(train_count..))
        .to_owned();
    let eval_targets = targets
        .slice_axis(Axis(0), Slice::from(train_count..))
        .to_owned();

    (train_inputs, train_targets, eval_inputs, eval_targets)
}

/// Rescale every column independently to `[min, max]`.
///
/// Constant columns are left untouched.
pub fn normalize_columns(data: &mut Array2<f64>, min: f64, max: f64) {
    for mut column in data.axis_iter_mut(Axis(1)) {
        let col_min = column.fold(f64::INFINITY, |a, &b| a.min(b));
        let col_max = column.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let range = col_max - col_min;

        if range == 0.0 || !range.is_finite() {
            continue;
        }

        column.mapv_inplace(|v| min + ((v - col_min) / range) * (max - min));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_one_hot() {
        let encoded = one_hot(&[2, 0, 1], 3).unwrap();
        assert_eq!(
            encoded,
            array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        );
        assert!(one_hot(&[3], 3).is_err());
    }

    #[test]
    fn test_class_indices_rejects_invalid_labels() {
        assert_eq!(class_indices(array![0.0, 2.0, 1.0].view()).unwrap(), vec![0, 2, 1]);
        for bad in [-1.0, 2.7, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                class_indices(array![0.0, bad].view()),
                Err(NetError::Dataset(_))
            ));
        }
    }

    #[test]
    fn test_one_hot_column() {
        let encoded = one_hot_column(&array![[1.0], [0.0]], 2).unwrap();
        assert_eq!(encoded, array![[0.0, 1.0], [1.0, 0.0]]);

        assert!(one_hot_column(&array![[-1.0]], 2).is_err());
        assert!(one_hot_column(&array![[0.5]], 2).is_err());
        assert!(one_hot_column(&array![[0.0, 1.0]], 2).is_err());
        assert!(one_hot_column(&array![[2.0]], 2).is_err());
    }

    #[test]
    fn test_train_eval_split() {
        let inputs = array![[1.0], [2.0], [3.0], [4.0]];
        let targets = array![[0.0], [1.0], [0.0], [1.0]];
        let (ti, tt, ei, et) = train_eval_split(&inputs, &targets, 0.25);
        assert_eq!(ti.nrows(), 3);
        assert_eq!(tt.nrows(), 3);
        assert_eq!(ei, array![[4.0]]);
        assert_eq!(et, array![[1.0]]);
    }

    #[test]
    fn test_normalize_columns() {
        let mut data = array![[0.0, 5.0], [2.0, 5.0], [4.0, 5.0]];
        normalize_columns(&mut data, -1.0, 1.0);

        assert!((data[[0, 0]] - (-1.0)).abs() < 1e-12);
        assert!((data[[1, 0]] - 0.0).abs() < 1e-12);
        assert!((data[[2, 0]] - 1.0).abs() < 1e-12);
        // constant column unchanged
        assert_eq!(data.column(1), array![5.0, 5.0, 5.0]);
    }
}
