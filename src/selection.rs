//! Winner selection across trained model families.

use crate::evaluation::ModelMetrics;
use crate::training::TrainerOutcome;

/// One family's grid-search outcome and its held-out metrics.
#[derive(Debug, Clone)]
pub struct FamilyResult {
    pub outcome: TrainerOutcome,
    pub metrics: ModelMetrics,
}

/// Index of the result with the highest test accuracy. On a tie the earlier
/// entry wins, so callers should pass results in evaluation order.
pub fn best_index(results: &[FamilyResult]) -> Option<usize> {
    results
        .iter()
        .enumerate()
        .fold(None, |acc: Option<(usize, f64)>, (i, result)| match acc {
            Some(best) if result.metrics.accuracy <= best.1 => Some(best),
            _ => Some((i, result.metrics.accuracy)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridProfile;
    use crate::evaluation::evaluate;
    use crate::training::{LinearTrainer, Trainer};
    use ndarray::{Array1, Array2};

    fn result_with_accuracy(accuracy: f64) -> FamilyResult {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            let offset = if i % 2 == 0 { 0.0 } else { 5.0 };
            offset + (i / 2) as f64 * 0.1 + j as f64 * 0.01
        });
        let y = Array1::from_shape_fn(30, |i| (i % 2) as f64);
        let outcome = LinearTrainer::new(GridProfile::Quick, 3, 42)
            .fit(&x, &y)
            .unwrap();
        let mut metrics = evaluate(&outcome.model, &x, &y).unwrap();
        metrics.accuracy = accuracy;
        FamilyResult { outcome, metrics }
    }

    #[test]
    fn test_highest_accuracy_wins() {
        let results = vec![
            result_with_accuracy(0.70),
            result_with_accuracy(0.90),
            result_with_accuracy(0.80),
        ];
        assert_eq!(best_index(&results), Some(1));
    }

    #[test]
    fn test_tie_goes_to_earlier_family() {
        let results = vec![
            result_with_accuracy(0.85),
            result_with_accuracy(0.85),
            result_with_accuracy(0.85),
        ];
        assert_eq!(best_index(&results), Some(0));
    }

    #[test]
    fn test_empty_results_yield_none() {
        assert_eq!(best_index(&[]), None);
    }
}
