//! End-to-end tests: training on classic datasets, batched inference,
//! scoring, persistence, and CSV loading.
//!
//! These tests verify:
//! - Online training learns XOR and lowers the epoch loss
//! - Prediction and discretization stay in range
//! - Checkpoints reload bit-for-bit
//! - A CSV dataset can be trained on and evaluated

use approx::assert_abs_diff_eq;
use ndarray::{arr1, arr2, Array2};
use neuralnet::data::{load_csv, one_hot, train_eval_split};
use neuralnet::utils::CLIP_VALUE;
use neuralnet::{
    discretize, train, Activation, Loss, Network, NetworkConfig, TrainConfig,
};
use std::fs;
use tempfile::tempdir;

fn xor_dataset() -> (Array2<f64>, Array2<f64>) {
    let inputs = arr2(&[[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]]);
    let targets = arr2(&[[0.0], [1.0], [1.0], [0.0]]);
    (inputs, targets)
}

/// XOR: 2 inputs → 4 hidden → 1 output.
///
/// A small fraction of initializations settle in a local minimum, so several
/// seeds are trained and most of them must solve the task.
#[test]
fn test_xor_training() {
    let (inputs, targets) = xor_dataset();
    let config = TrainConfig {
        epochs: 2000,
        learning_rate: 1.0,
        log_every: 0,
        ..TrainConfig::default()
    };

    let mut solved = 0;
    for seed in [1, 2, 3] {
        let mut net = Network::new(&NetworkConfig::binary_classification(2, vec![4], seed)).unwrap();
        let history = train(&mut net, &inputs, &targets, &config).unwrap();

        assert_eq!(history.len(), 2000);
        assert!(
            history[1999].mean_loss < history[0].mean_loss,
            "seed {seed}: loss did not decrease ({} -> {})",
            history[0].mean_loss,
            history[1999].mean_loss
        );

        let evaluation = net.evaluate_classification(&inputs, &targets).unwrap();
        if evaluation.correct == 4 {
            solved += 1;
        }
    }
    assert!(solved >= 2, "only {solved} of 3 seeds learned XOR");
}

#[test]
fn test_multiclass_training_separable_clusters() {
    let inputs = arr2(&[
        [1.0, 0.0],
        [0.9, 0.1],
        [0.0, 1.0],
        [0.1, 0.9],
        [-1.0, -1.0],
        [-0.9, -1.1],
    ]);
    let targets = one_hot(&[0, 0, 1, 1, 2, 2], 3).unwrap();
    let mut net = Network::new(
        &NetworkConfig::multiclass_classification(2, vec![6], 3, 3)
            .with_hidden_activation(Activation::Sigmoid),
    )
    .unwrap();

    let before = net.mean_loss(&inputs, &targets).unwrap();
    let config = TrainConfig {
        epochs: 500,
        learning_rate: 0.2,
        shuffle: true,
        shuffle_seed: 9,
        log_every: 0,
    };
    train(&mut net, &inputs, &targets, &config).unwrap();
    let after = net.mean_loss(&inputs, &targets).unwrap();

    assert!(after < before);
    let evaluation = net.evaluate_classification(&inputs, &targets).unwrap();
    assert_eq!(evaluation.correct, 6);
    assert_abs_diff_eq!(evaluation.accuracy(), 1.0);
}

#[test]
fn test_predict_outputs_in_unit_interval() {
    let inputs = arr2(&[[3.0, -2.0, 0.5], [-10.0, 10.0, 0.0], [0.0, 0.0, 0.0]]);

    let sigmoid = Network::new(&NetworkConfig::binary_classification(3, vec![4], 1)).unwrap();
    let softmax =
        Network::new(&NetworkConfig::multiclass_classification(3, vec![4], 5, 1)).unwrap();

    for net in [&sigmoid, &softmax] {
        let predictions = net.predict(&inputs).unwrap();
        assert_eq!(predictions.dim(), (3, net.num_outputs()));
        assert!(predictions.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    for row in softmax.predict(&inputs).unwrap().rows() {
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_predict_matches_forward() {
    let mut net =
        Network::new(&NetworkConfig::multiclass_classification(2, vec![3], 2, 5)).unwrap();
    let inputs = arr2(&[[0.1, 0.2], [0.7, -0.4]]);
    let predictions = net.predict(&inputs).unwrap();

    for (r, row) in inputs.rows().into_iter().enumerate() {
        let out = net.forward(&row).unwrap();
        assert_eq!(predictions.row(r), out);
    }
}

#[test]
fn test_discretize_properties() {
    let binary = discretize(arr2(&[[0.2], [0.5], [0.99]]).view());
    assert_eq!(binary, arr2(&[[0.0], [1.0], [1.0]]));

    let multi = discretize(arr2(&[[0.1, 0.7, 0.2], [0.4, 0.4, 0.2], [0.0, 0.0, 1.0]]).view());
    for row in multi.rows() {
        assert!(row.iter().all(|&v| v == 0.0 || v == 1.0));
        assert_eq!(row.sum(), 1.0);
    }
    // ties go to the first maximum
    assert_eq!(multi.row(1), arr1(&[1.0, 0.0, 0.0]));
}

#[test]
fn test_evaluate_count_in_range() {
    let inputs = arr2(&[[0.0, 1.0], [1.0, 0.0], [0.5, 0.5], [0.2, 0.9], [0.9, 0.1]]);
    let targets = one_hot(&[1, 0, 1, 1, 0], 2).unwrap();
    let net = Network::new(&NetworkConfig::multiclass_classification(2, vec![3], 2, 8)).unwrap();

    let evaluation = net.evaluate_classification(&inputs, &targets).unwrap();
    assert!(evaluation.correct <= inputs.nrows());
    assert_eq!(evaluation.per_example.len(), inputs.nrows());
    assert_eq!(
        evaluation.per_example.iter().filter(|&&ok| ok).count(),
        evaluation.correct
    );
}

#[test]
fn test_loss_bounds() {
    let upper = -CLIP_VALUE.ln();
    let cases = [
        (Loss::BinaryCrossEntropy, arr1(&[0.0]), arr1(&[1.0])),
        (Loss::BinaryCrossEntropy, arr1(&[1.0]), arr1(&[1.0])),
        (Loss::BinaryCrossEntropy, arr1(&[0.3]), arr1(&[0.0])),
        (Loss::CategoricalCrossEntropy, arr1(&[0.0, 1.0]), arr1(&[1.0, 0.0])),
        (Loss::CategoricalCrossEntropy, arr1(&[0.5, 0.5]), arr1(&[0.0, 1.0])),
    ];

    for (loss, prediction, target) in cases {
        let value = loss.evaluate(prediction.view(), target.view()).unwrap();
        let bound = upper * prediction.len() as f64;
        assert!(
            (0.0..=bound + 1e-9).contains(&value),
            "{loss}: {value} outside [0, {bound}]"
        );
    }
}

#[test]
fn test_checkpoint_round_trip_after_training() {
    let (inputs, targets) = xor_dataset();
    let mut net = Network::new(&NetworkConfig::binary_classification(2, vec![3], 42)).unwrap();
    let config = TrainConfig {
        epochs: 20,
        log_every: 0,
        ..TrainConfig::default()
    };
    train(&mut net, &inputs, &targets, &config).unwrap();

    let dir = tempdir().unwrap();
    net.save(dir.path().join("ckpt")).unwrap();
    let loaded = Network::load(dir.path().join("ckpt")).unwrap();

    assert_eq!(loaded.layers(), net.layers());
    assert_eq!(loaded.weights(), net.weights());
    assert_eq!(loaded.biases(), net.biases());
    assert_eq!(loaded.predict(&inputs).unwrap(), net.predict(&inputs).unwrap());
}

#[test]
fn test_csv_train_and_evaluate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("xor.csv");
    let mut csv = String::from("x1,x2,label\n");
    for _ in 0..3 {
        csv.push_str("0,0,0\n0,1,1\n1,0,1\n1,1,0\n");
    }
    fs::write(&path, csv).unwrap();

    let dataset = load_csv(&path, 2, true).unwrap();
    assert_eq!(dataset.len(), 12);
    assert_eq!(dataset.num_targets(), 1);

    let (train_x, train_y, eval_x, eval_y) =
        train_eval_split(&dataset.inputs, &dataset.targets, 0.25);
    assert_eq!(train_x.nrows(), 9);
    assert_eq!(eval_x.nrows(), 3);

    let mut net = Network::new(&NetworkConfig::new(
        2,
        vec![4],
        1,
        Activation::Sigmoid,
        Loss::BinaryCrossEntropy,
        7,
    ))
    .unwrap();
    let config = TrainConfig {
        epochs: 50,
        log_every: 0,
        ..TrainConfig::default()
    };
    let history = train(&mut net, &train_x, &train_y, &config).unwrap();
    assert_eq!(history.len(), 50);

    let evaluation = net.evaluate_classification(&eval_x, &eval_y).unwrap();
    assert!(evaluation.correct <= 3);
    assert!(net.mean_loss(&eval_x, &eval_y).unwrap().is_finite());
}
