//! Inference-time gate between the obscured and display models.
//!
//! Both wrapped models score the whole batch. Each row then takes the
//! obscured model's output if the detector flags it as real (score at or above
//! the threshold) and the display model's output otherwise.

use crate::data::TrainingInput;
use crate::detector::{DetectorTrainer, PerturbationDetector, TrainingReport};
use crate::error::{Result, ScaffoldError};
use crate::features::FeatureSpace;
use crate::metrics::accuracy;
use crate::models::{Classifier, argmax_rows};
use ndarray::{Array2, ArrayView2};
use rand::RngCore;
use std::fmt;
use std::sync::Arc;

const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug)]
struct TrainedState {
    detector: PerturbationDetector,
    column_names: Option<Vec<String>>,
    report: Option<TrainingReport>,
}

/// Wraps two classifiers behind a trained perturbation detector.
pub struct AdversarialRouter {
    obscured: Arc<dyn Classifier>,
    display: Arc<dyn Classifier>,
    threshold: f64,
    state: Option<TrainedState>,
}

impl AdversarialRouter {
    pub fn new(obscured: Arc<dyn Classifier>, display: Arc<dyn Classifier>) -> Self {
        Self {
            obscured,
            display,
            threshold: DEFAULT_THRESHOLD,
            state: None,
        }
    }

    /// Default threshold used by [`predict_proba`](Self::predict_proba).
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    /// Train a detector on the real rows `x` and install it.
    ///
    /// Column names come from `feature_names`, falling back to a frame's
    /// header. On any error the previously installed detector is kept.
    pub fn train(
        &mut self,
        x: impl Into<TrainingInput>,
        y: &[usize],
        feature_names: Option<Vec<String>>,
        trainer: &DetectorTrainer,
        rng: &mut dyn RngCore,
    ) -> Result<&mut Self> {
        let table = x.into().into_table()?;
        let (n_rows, n_cols) = table.values.dim();
        if y.len() != n_rows {
            return Err(ScaffoldError::invalid_input(format!(
                "x has {n_rows} rows but y has {} labels",
                y.len()
            )));
        }
        let names = feature_names.or(table.columns);
        if let Some(names) = &names
            && names.len() != n_cols
        {
            return Err(ScaffoldError::invalid_input(format!(
                "{} feature names for {n_cols} columns",
                names.len()
            )));
        }

        let space = trainer.feature_space(
            names
                .clone()
                .unwrap_or_else(|| FeatureSpace::anonymous(n_cols).names().to_vec()),
        )?;
        let (detector, report) = trainer.fit(table.values.view(), &space, rng)?;
        tracing::info!(
            strategy = %report.strategy,
            holdout_accuracy = report.holdout_metrics.accuracy,
            "installed perturbation detector"
        );
        self.state = Some(TrainedState {
            detector,
            column_names: names,
            report: Some(report),
        });
        Ok(self)
    }

    /// Install an already fitted detector.
    pub fn install(
        &mut self,
        detector: PerturbationDetector,
        column_names: Option<Vec<String>>,
    ) -> Result<()> {
        if let Some(names) = &column_names
            && names.len() != detector.n_features()
        {
            return Err(ScaffoldError::invalid_input(format!(
                "{} column names for a detector over {} features",
                names.len(),
                detector.n_features()
            )));
        }
        self.state = Some(TrainedState {
            detector,
            column_names,
            report: None,
        });
        Ok(())
    }

    fn trained(&self) -> Result<&TrainedState> {
        self.state.as_ref().ok_or_else(|| {
            ScaffoldError::not_trained("call train before querying the router")
        })
    }

    pub fn detector(&self) -> Option<&PerturbationDetector> {
        self.state.as_ref().map(|s| &s.detector)
    }

    /// Report from the last [`train`](Self::train); `None` for installed detectors.
    pub fn training_report(&self) -> Option<&TrainingReport> {
        self.state.as_ref().and_then(|s| s.report.as_ref())
    }

    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.predict_proba_with_threshold(x, self.threshold)
    }

    pub fn predict_proba_with_threshold(
        &self,
        x: ArrayView2<'_, f64>,
        threshold: f64,
    ) -> Result<Array2<f64>> {
        let state = self.trained()?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ScaffoldError::invalid_input(format!(
                "threshold must lie in [0, 1], got {threshold}"
            )));
        }
        let obscured = self.obscured.predict_proba(x)?;
        let display = self.display.predict_proba(x)?;
        if obscured.dim() != display.dim() || obscured.nrows() != x.nrows() {
            return Err(ScaffoldError::model(format!(
                "obscured output {:?} and display output {:?} disagree for {} rows",
                obscured.dim(),
                display.dim(),
                x.nrows()
            )));
        }

        let flags = state.detector.flags(x, threshold)?;
        let mut out = display;
        for (i, real) in flags.into_iter().enumerate() {
            if real {
                out.row_mut(i).assign(&obscured.row(i));
            }
        }
        Ok(out)
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    /// Accuracy of [`predict`](Self::predict) against `y`.
    pub fn score(&self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<f64> {
        self.trained()?;
        accuracy(y, &self.predict(x)?)
    }

    /// Agreement between the router and the bare obscured model on `x`.
    pub fn fidelity(&self, x: ArrayView2<'_, f64>) -> Result<f64> {
        self.trained()?;
        if x.nrows() == 0 {
            return Err(ScaffoldError::invalid_input("cannot measure fidelity on zero rows"));
        }
        accuracy(&self.obscured.predict(x)?, &self.predict(x)?)
    }

    /// Fraction of rows in `x` the detector routes to the display model.
    pub fn probe_rate(&self, x: ArrayView2<'_, f64>) -> Result<f64> {
        let state = self.trained()?;
        if x.nrows() == 0 {
            return Err(ScaffoldError::invalid_input("cannot measure probe rate on zero rows"));
        }
        let flags = state.detector.flags(x, self.threshold)?;
        Ok(flags.iter().filter(|&&real| !real).count() as f64 / flags.len() as f64)
    }

    /// Feature names the detector was trained with.
    pub fn get_column_names(&self) -> Result<&[String]> {
        self.trained()?
            .column_names
            .as_deref()
            .ok_or_else(|| ScaffoldError::invalid_input("router was trained without column names"))
    }
}

impl fmt::Debug for AdversarialRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdversarialRouter")
            .field("threshold", &self.threshold)
            .field("is_trained", &self.is_trained())
            .field("detector", &self.state.as_ref().map(|s| &s.detector))
            .finish()
    }
}
