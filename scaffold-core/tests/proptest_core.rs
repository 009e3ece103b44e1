//! Property-based tests for routing and probe generation using proptest.

use ndarray::{Array2, ArrayView2};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use scaffold_core::data::row_key;
use scaffold_core::models::ConstantModel;
use scaffold_core::synthetic::{Background, PerturbationStrategy, REAL};
use scaffold_core::{
    AdversarialRouter, BackgroundSubstitution, Classifier, Estimator, FeatureSpace,
    GaussianNeighborhood, PerturbationDetector, Result,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Detector whose score for each row is the row's first value.
struct ScoreColumn;

impl Classifier for ScoreColumn {
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((x.nrows(), 2));
        for (i, &s) in x.column(0).iter().enumerate() {
            out[[i, 0]] = 1.0 - s;
            out[[i, 1]] = s;
        }
        Ok(out)
    }
}

impl Estimator for ScoreColumn {
    fn fit(&mut self, _x: ArrayView2<'_, f64>, _y: &[usize]) -> Result<()> {
        Ok(())
    }
}

/// Soft model with probabilities driven by the second column.
struct Soft;

impl Classifier for Soft {
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((x.nrows(), 3));
        for (i, &v) in x.column(1).iter().enumerate() {
            let a = 1.0 / (1.0 + v.abs());
            out[[i, 0]] = a;
            out[[i, 1]] = (1.0 - a) / 2.0;
            out[[i, 2]] = (1.0 - a) / 2.0;
        }
        Ok(out)
    }
}

fn router(display: Arc<dyn Classifier>) -> AdversarialRouter {
    let mut router = AdversarialRouter::new(Arc::new(ConstantModel { class: 2, n_classes: 3 }), display);
    let detector = PerturbationDetector::new(Box::new(ScoreColumn), vec![0], 2).unwrap();
    router.install(detector, None).unwrap();
    router
}

fn matrix(rows: &[(f64, f64)]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), 2), |(i, j)| if j == 0 { rows[i].0 } else { rows[i].1 })
}

// --- Routing properties ---

proptest! {
    #[test]
    fn probabilities_are_rows_summing_to_one(
        rows in prop::collection::vec((0.0f64..=1.0, -50.0f64..50.0), 1..40),
        threshold in 0.0f64..=1.0,
    ) {
        let x = matrix(&rows);
        let probs = router(Arc::new(Soft)).predict_proba_with_threshold(x.view(), threshold).unwrap();
        prop_assert_eq!(probs.nrows(), rows.len());
        for row in probs.rows() {
            prop_assert!(row.iter().all(|&p| p >= 0.0));
            prop_assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn rows_route_by_score_against_threshold(
        rows in prop::collection::vec((0.0f64..=1.0, -5.0f64..5.0), 1..40),
        threshold in 0.01f64..0.99,
    ) {
        let x = matrix(&rows);
        let predictions = router(Arc::new(ConstantModel { class: 0, n_classes: 3 }))
            .predict_proba_with_threshold(x.view(), threshold)
            .unwrap();
        for ((score, _), row) in rows.iter().zip(predictions.rows()) {
            let expected = if *score >= threshold { 2 } else { 0 };
            prop_assert_eq!(row[expected], 1.0);
        }
    }
}

// --- Generator properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn gaussian_dataset_is_balanced(
        n in 1usize..12,
        multiplier in 1usize..6,
        seed in any::<u64>(),
    ) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| (i * 3 + j) as f64);
        let space = FeatureSpace::anonymous(3);
        let mut rng = StdRng::seed_from_u64(seed);
        let ds = GaussianNeighborhood::new()
            .with_multiplier(multiplier)
            .generate(x.view(), &space, &mut rng)
            .unwrap();
        prop_assert_eq!(ds.len(), 2 * multiplier * n);
        prop_assert_eq!(ds.n_real(), multiplier * n);
        prop_assert_eq!(ds.n_probe(), multiplier * n);
    }

    #[test]
    fn substitution_labels_follow_exact_membership(
        values in prop::collection::vec((0u8..3, 0u8..3), 1..8),
        n_samples in 1usize..80,
        seed in any::<u64>(),
    ) {
        let x = Array2::from_shape_fn((values.len(), 2), |(i, j)| {
            f64::from(if j == 0 { values[i].0 } else { values[i].1 })
        });
        let real: HashSet<Vec<u64>> = x.rows().into_iter().map(row_key).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let ds = BackgroundSubstitution::new()
            .with_multiplier(2)
            .with_n_samples(n_samples)
            .with_background(Background::Provided(x.clone()))
            .generate(x.view(), &FeatureSpace::anonymous(2), &mut rng)
            .unwrap();
        prop_assert_eq!(ds.len(), 2 * values.len() + n_samples);
        for (row, &label) in ds.features.rows().into_iter().zip(&ds.labels) {
            prop_assert_eq!(real.contains(&row_key(row)), label == REAL);
        }
    }
}
