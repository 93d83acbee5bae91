//! Stratified train/test split

use crate::error::{CliniqError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// One train/test partition of the feature matrix and encoded labels
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Split rows into train and test partitions, preserving per-class
/// proportions.
///
/// Every class keeps at least one member on each side, so any class with
/// fewer than two members fails with [`CliniqError::Stratification`] naming
/// it (`class_names` is indexed by encoded label). The shuffle is driven by a
/// ChaCha8 stream seeded from `seed`; identical inputs and seed produce an
/// identical partition.
pub fn stratified_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    class_names: &[String],
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(CliniqError::InvalidParameter {
            name: "test_fraction".to_string(),
            value: format!("{test_fraction}"),
            reason: "must be in (0, 1)".to_string(),
        });
    }
    if x.nrows() != y.len() {
        return Err(CliniqError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }

    // Group row indices by class, in stable class order.
    let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        class_indices.entry(label.round() as i64).or_default().push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    for (&class, indices) in &class_indices {
        if indices.len() < 2 {
            let name = class_names
                .get(class as usize)
                .cloned()
                .unwrap_or_else(|| class.to_string());
            return Err(CliniqError::Stratification {
                class: name,
                count: indices.len(),
            });
        }

        let mut shuffled = indices.clone();
        shuffled.shuffle(&mut rng);

        let class_test_size = ((shuffled.len() as f64) * test_fraction).max(1.0) as usize;
        let class_test_size = class_test_size.min(shuffled.len() - 1);
        let split_point = shuffled.len() - class_test_size;

        train_indices.extend_from_slice(&shuffled[..split_point]);
        test_indices.extend_from_slice(&shuffled[split_point..]);
    }

    let n_cols = x.ncols();
    let x_train = Array2::from_shape_fn((train_indices.len(), n_cols), |(i, j)| {
        x[[train_indices[i], j]]
    });
    let x_test = Array2::from_shape_fn((test_indices.len(), n_cols), |(i, j)| {
        x[[test_indices[i], j]]
    });
    let y_train = Array1::from_iter(train_indices.iter().map(|&i| y[i]));
    let y_test = Array1::from_iter(test_indices.iter().map(|&i| y[i]));

    Ok(TrainTestSplit {
        x_train,
        x_test,
        y_train,
        y_test,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_names() -> Vec<String> {
        vec!["alpha".into(), "beta".into(), "gamma".into()]
    }

    fn balanced(n_per_class: usize, n_classes: usize) -> (Array2<f64>, Array1<f64>) {
        let n = n_per_class * n_classes;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| (i * 3 + j) as f64);
        let y = Array1::from_shape_fn(n, |i| (i / n_per_class) as f64);
        (x, y)
    }

    #[test]
    fn test_preserves_class_proportions() {
        let (x, y) = balanced(20, 3);
        let split = stratified_split(&x, &y, &class_names(), 0.2, 42).unwrap();

        assert_eq!(split.x_train.nrows(), 48);
        assert_eq!(split.x_test.nrows(), 12);
        for class in 0..3 {
            let in_test = split.y_test.iter().filter(|&&v| v == class as f64).count();
            assert_eq!(in_test, 4, "class {class} keeps its share in test");
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let (x, y) = balanced(15, 2);
        let a = stratified_split(&x, &y, &class_names(), 0.2, 42).unwrap();
        let b = stratified_split(&x, &y, &class_names(), 0.2, 42).unwrap();
        assert_eq!(a.x_train, b.x_train);
        assert_eq!(a.y_test, b.y_test);

        let c = stratified_split(&x, &y, &class_names(), 0.2, 7).unwrap();
        // A different stream almost surely picks a different test set; row
        // totals stay fixed either way.
        assert_eq!(c.x_test.nrows(), a.x_test.nrows());
    }

    #[test]
    fn test_tiny_class_present_on_both_sides() {
        // Class 1 has exactly 2 members; both partitions must see it.
        let x = Array2::from_shape_fn((12, 2), |(i, j)| (i + j) as f64);
        let mut labels = vec![0.0; 10];
        labels.extend([1.0, 1.0]);
        let y = Array1::from_vec(labels);

        let split = stratified_split(&x, &y, &class_names(), 0.2, 42).unwrap();
        assert!(split.y_train.iter().any(|&v| v == 1.0));
        assert!(split.y_test.iter().any(|&v| v == 1.0));
    }

    #[test]
    fn test_singleton_class_is_an_error() {
        let x = Array2::zeros((5, 2));
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 1.0]);

        let err = stratified_split(&x, &y, &class_names(), 0.2, 42).unwrap_err();
        match err {
            CliniqError::Stratification { class, count } => {
                assert_eq!(class, "beta");
                assert_eq!(count, 1);
            }
            other => panic!("expected stratification error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_fraction() {
        let (x, y) = balanced(5, 2);
        assert!(stratified_split(&x, &y, &class_names(), 0.0, 42).is_err());
        assert!(stratified_split(&x, &y, &class_names(), 1.0, 42).is_err());
    }
}
