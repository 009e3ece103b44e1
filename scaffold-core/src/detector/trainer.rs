//! Detector training pipeline.
//!
//! One trainer per strategy, parameterized by a cache policy:
//!
//! 1. resolve the detector's columns (configuration errors surface here)
//! 2. ask the cache for a stored split
//! 3. on anything but a hit: generate, project, split
//! 4. fit the estimator and score the hold-out partition
//! 5. store freshly generated data (a failed write is reported, not fatal)

use super::{GradientBoostedTrees, HoldoutEvaluation, PerturbationDetector};
use crate::cache::{CacheLookup, CacheStatus, CachedDataset, DatasetCache, NoCache};
use crate::config::{DetectorConfig, ScaffoldConfig};
use crate::error::{Result, ScaffoldError};
use crate::features::FeatureSpace;
use crate::metrics::ClassificationMetrics;
use crate::models::{Estimator, EstimatorFactory};
use crate::synthetic::{BackgroundSubstitution, GaussianNeighborhood, PerturbationStrategy};
use ndarray::ArrayView2;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Summary of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub strategy: String,
    pub estimator: String,
    pub detector_columns: Vec<String>,
    pub cache: CacheStatus,
    pub cache_saved: bool,
    pub n_train: usize,
    pub n_holdout: usize,
    /// Real rows across both partitions.
    pub n_real: usize,
    /// Probe rows across both partitions.
    pub n_probe: usize,
    pub holdout_metrics: ClassificationMetrics,
}

/// Builds a [`PerturbationDetector`] from real training rows.
pub struct DetectorTrainer {
    strategy: Box<dyn PerturbationStrategy>,
    categorical: Vec<usize>,
    include: Vec<usize>,
    holdout_fraction: f64,
    detector: DetectorConfig,
    estimator_factory: Option<EstimatorFactory>,
    cache: Box<dyn DatasetCache>,
}

impl DetectorTrainer {
    pub fn new(strategy: impl PerturbationStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
            categorical: Vec::new(),
            include: Vec::new(),
            holdout_fraction: 0.2,
            detector: DetectorConfig::default(),
            estimator_factory: None,
            cache: Box::new(NoCache),
        }
    }

    /// Gaussian-neighborhood trainer with settings from `config`.
    pub fn gaussian(config: &ScaffoldConfig) -> Self {
        Self::new(GaussianNeighborhood::from_config(&config.gaussian)).with_config(config)
    }

    /// Background-substitution trainer with settings from `config`.
    pub fn substitution(config: &ScaffoldConfig) -> Self {
        Self::new(BackgroundSubstitution::from_config(&config.substitution)).with_config(config)
    }

    /// Take the hold-out fraction and detector settings from `config`.
    pub fn with_config(mut self, config: &ScaffoldConfig) -> Self {
        self.holdout_fraction = config.holdout_fraction;
        self.detector = config.detector.clone();
        self
    }

    pub fn with_categorical(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.categorical.extend(indices);
        self
    }

    /// Columns always given to the detector, whatever the strategy selects.
    pub fn with_include(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.include.extend(indices);
        self
    }

    pub fn with_holdout_fraction(mut self, fraction: f64) -> Self {
        self.holdout_fraction = fraction;
        self
    }

    pub fn with_detector_config(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// Fit a caller-supplied estimator instead of the boosted-tree default.
    pub fn with_estimator<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Estimator> + 'static,
    {
        self.estimator_factory = Some(Box::new(factory));
        self
    }

    pub fn with_cache(mut self, cache: impl DatasetCache + 'static) -> Self {
        self.cache = Box::new(cache);
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Feature space for `names` with this trainer's categorical and include sets.
    pub fn feature_space(&self, names: Vec<String>) -> Result<FeatureSpace> {
        FeatureSpace::new(names)
            .with_categorical(self.categorical.iter().copied())?
            .with_included(self.include.iter().copied())
    }

    fn build_estimator(&self) -> Box<dyn Estimator> {
        match &self.estimator_factory {
            Some(factory) => factory(),
            None => Box::new(GradientBoostedTrees::from_config(&self.detector)),
        }
    }

    /// Run the pipeline over the real rows `x`.
    pub fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        space: &FeatureSpace,
        rng: &mut dyn RngCore,
    ) -> Result<(PerturbationDetector, TrainingReport)> {
        if x.ncols() != space.len() {
            return Err(ScaffoldError::unsupported_feature_space(format!(
                "data has {} columns but the feature space names {}",
                x.ncols(),
                space.len()
            )));
        }
        let columns = self.strategy.detector_columns(space)?;
        let column_names = space.subset_names(&columns);

        let lookup = self.cache.load(&column_names);
        let status = lookup.status();
        let (split, fresh) = match lookup {
            CacheLookup::Hit(entry) => (entry.split, false),
            CacheLookup::Disabled | CacheLookup::Miss { .. } => {
                let dataset = self.strategy.generate(x, space, rng)?;
                tracing::info!(
                    strategy = self.strategy.name(),
                    rows = dataset.len(),
                    real = dataset.n_real(),
                    probe = dataset.n_probe(),
                    "generated synthetic dataset"
                );
                (dataset.project(&columns).split(self.holdout_fraction, rng)?, true)
            }
        };

        let mut estimator = self.build_estimator();
        estimator.fit(split.train.features.view(), &split.train.labels)?;
        let train_predictions = estimator.predict(split.train.features.view())?;
        let holdout_predictions = estimator.predict(split.holdout.features.view())?;
        let holdout_metrics =
            ClassificationMetrics::compute(&split.holdout.labels, &holdout_predictions)?;
        tracing::info!(
            strategy = self.strategy.name(),
            estimator = estimator.name(),
            accuracy = holdout_metrics.accuracy,
            f1 = holdout_metrics.f1_score,
            "detector hold-out evaluation"
        );

        let mut report = TrainingReport {
            strategy: self.strategy.name().to_string(),
            estimator: estimator.name().to_string(),
            detector_columns: column_names,
            cache: status,
            cache_saved: false,
            n_train: split.train.len(),
            n_holdout: split.holdout.len(),
            n_real: split.train.n_real() + split.holdout.n_real(),
            n_probe: split.train.n_probe() + split.holdout.n_probe(),
            holdout_metrics,
        };

        let holdout = HoldoutEvaluation {
            labels: split.holdout.labels.clone(),
            predictions: holdout_predictions.clone(),
        };

        if fresh && self.cache.is_enabled() {
            let entry = CachedDataset {
                split,
                train_predictions,
                holdout_predictions,
            };
            match self.cache.store(&entry) {
                Ok(()) => report.cache_saved = true,
                Err(e) => tracing::warn!("failed to save synthetic dataset: {e}"),
            }
        }

        let detector = PerturbationDetector::new(estimator, columns, space.len())?.with_holdout(holdout);
        Ok((detector, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::models::Classifier;
    use crate::synthetic::Background;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ndarray::{Array2, array};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn real_rows() -> Array2<f64> {
        array![
            [25.0, 1.0, 2.0, 10.0],
            [40.0, 0.0, 0.0, 3.0],
            [31.0, 1.0, 5.0, 7.0],
            [52.0, 0.0, 1.0, 1.0],
            [19.0, 1.0, 0.0, 4.0],
        ]
    }

    fn names() -> Vec<String> {
        ["age", "race", "priors", "stay"].map(String::from).to_vec()
    }

    fn small_detector() -> DetectorConfig {
        DetectorConfig {
            n_estimators: 20,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn test_gaussian_pipeline_without_cache() {
        let trainer = DetectorTrainer::new(GaussianNeighborhood::new().with_multiplier(10))
            .with_categorical([1])
            .with_detector_config(small_detector());
        let space = trainer.feature_space(names()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let (detector, report) = trainer.fit(real_rows().view(), &space, &mut rng).unwrap();

        assert_eq!(detector.columns(), &[0, 2]);
        assert_eq!(report.detector_columns, vec!["age", "priors"]);
        assert_eq!(report.n_train + report.n_holdout, 100);
        assert_eq!(report.n_holdout, 20);
        assert_eq!(report.n_real, 50);
        assert_eq!(report.cache, CacheStatus::Disabled);
        assert!(!report.cache_saved);
        let holdout = detector.holdout().unwrap();
        assert_eq!(holdout.labels.len(), 20);
        assert_eq!(holdout.predictions.len(), 20);
    }

    #[test]
    fn test_configuration_error_precedes_generation() {
        let trainer = DetectorTrainer::new(GaussianNeighborhood::new()).with_categorical([0, 1, 2, 3]);
        let space = trainer.feature_space(names()).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = trainer.fit(real_rows().view(), &space, &mut rng).unwrap_err();
        assert!(matches!(err, ScaffoldError::UnsupportedFeatureSpace(_)));
    }

    #[test]
    fn test_cache_miss_then_hit_reuses_partitions() {
        let dir = tempfile::TempDir::new().unwrap();
        let make = || {
            DetectorTrainer::new(
                BackgroundSubstitution::new()
                    .with_multiplier(2)
                    .with_n_samples(40)
                    .with_background(Background::KMeans {
                        n_clusters: 3,
                        snap_to_data: true,
                    }),
            )
            .with_detector_config(small_detector())
            .with_cache(FileCache::new(dir.path().join("shap_run")))
        };

        let first = make();
        let space = first.feature_space(names()).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let (_, miss) = first.fit(real_rows().view(), &space, &mut rng).unwrap();
        assert!(matches!(miss.cache, CacheStatus::Miss { .. }));
        assert!(miss.cache_saved);

        let mut rng = StdRng::seed_from_u64(99);
        let (_, hit) = make().fit(real_rows().view(), &space, &mut rng).unwrap();
        assert_eq!(hit.cache, CacheStatus::Hit);
        assert!(!hit.cache_saved);
        assert_eq!(hit.n_train, miss.n_train);
        assert_eq!(hit.n_holdout, miss.n_holdout);
    }

    /// Predicts the real class everywhere and counts its `fit` calls.
    struct CountingEstimator {
        fits: Arc<AtomicUsize>,
    }

    impl Classifier for CountingEstimator {
        fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
            Ok(Array2::from_shape_fn((x.nrows(), 2), |(_, c)| c as f64))
        }
    }

    impl Estimator for CountingEstimator {
        fn fit(&mut self, _x: ArrayView2<'_, f64>, _y: &[usize]) -> Result<()> {
            self.fits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_custom_estimator_is_used() {
        let fits = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&fits);
        let trainer = DetectorTrainer::new(GaussianNeighborhood::new().with_multiplier(2))
            .with_estimator(move || {
                Box::new(CountingEstimator {
                    fits: Arc::clone(&handle),
                })
            });
        let space = trainer.feature_space(names()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let (detector, report) = trainer.fit(real_rows().view(), &space, &mut rng).unwrap();

        assert_eq!(fits.load(Ordering::SeqCst), 1);
        assert_eq!(report.estimator, "counting");
        assert_eq!(detector.estimator_name(), "counting");
        let holdout = detector.holdout().unwrap();
        assert!(holdout.predictions.iter().all(|&p| p == 1));
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let trainer = DetectorTrainer::new(GaussianNeighborhood::new());
        let space = FeatureSpace::anonymous(3);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(trainer.fit(real_rows().view(), &space, &mut rng).is_err());
    }
}
