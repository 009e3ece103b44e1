//! The real-versus-probe detector and the pipeline that trains it.

pub mod boosting;
pub mod trainer;

use crate::error::{Result, ScaffoldError};
use crate::models::Estimator;
use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use boosting::GradientBoostedTrees;
pub use trainer::{DetectorTrainer, TrainingReport};

/// True hold-out labels next to the detector's predictions on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldoutEvaluation {
    pub labels: Vec<usize>,
    pub predictions: Vec<usize>,
}

/// A fitted binary classifier over a fixed subset of input columns.
///
/// Inputs are always full-width rows; the detector projects them onto its
/// columns before scoring, so training and inference use the same subset.
pub struct PerturbationDetector {
    estimator: Box<dyn Estimator>,
    columns: Vec<usize>,
    n_features: usize,
    holdout: Option<HoldoutEvaluation>,
}

impl PerturbationDetector {
    /// Wrap an already fitted estimator.
    pub fn new(estimator: Box<dyn Estimator>, columns: Vec<usize>, n_features: usize) -> Result<Self> {
        if columns.is_empty() {
            return Err(ScaffoldError::unsupported_feature_space(
                "detector needs at least one column",
            ));
        }
        if let Some(&bad) = columns.iter().find(|&&c| c >= n_features) {
            return Err(ScaffoldError::unsupported_feature_space(format!(
                "detector column {bad} out of range for {n_features} features"
            )));
        }
        Ok(Self {
            estimator,
            columns,
            n_features,
            holdout: None,
        })
    }

    pub fn with_holdout(mut self, holdout: HoldoutEvaluation) -> Self {
        self.holdout = Some(holdout);
        self
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn estimator_name(&self) -> &str {
        self.estimator.name()
    }

    pub fn holdout(&self) -> Option<&HoldoutEvaluation> {
        self.holdout.as_ref()
    }

    /// Probability that each row is real.
    pub fn scores(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        if x.ncols() != self.n_features {
            return Err(ScaffoldError::invalid_input(format!(
                "expected {} columns, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let projected = x.select(Axis(1), &self.columns);
        let probs = self.estimator.predict_proba(projected.view())?;
        if probs.ncols() != 2 || probs.nrows() != x.nrows() {
            return Err(ScaffoldError::model(format!(
                "detector returned a {}x{} probability matrix for {} rows",
                probs.nrows(),
                probs.ncols(),
                x.nrows()
            )));
        }
        Ok(probs.column(1).to_vec())
    }

    /// `true` for rows scored at or above `threshold`, i.e. treated as real.
    pub fn flags(&self, x: ArrayView2<'_, f64>, threshold: f64) -> Result<Vec<bool>> {
        Ok(self.scores(x)?.into_iter().map(|s| s >= threshold).collect())
    }
}

impl fmt::Debug for PerturbationDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerturbationDetector")
            .field("estimator", &self.estimator.name())
            .field("columns", &self.columns)
            .field("n_features", &self.n_features)
            .field("holdout", &self.holdout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Classifier;
    use ndarray::{Array2, array};

    /// Scores a row by its first projected column, clamped to [0, 1].
    struct ColumnScore;

    impl Classifier for ColumnScore {
        fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
            let mut out = Array2::zeros((x.nrows(), 2));
            for (i, v) in x.column(0).iter().enumerate() {
                let p = v.clamp(0.0, 1.0);
                out[[i, 0]] = 1.0 - p;
                out[[i, 1]] = p;
            }
            Ok(out)
        }
    }

    impl Estimator for ColumnScore {
        fn fit(&mut self, _x: ArrayView2<'_, f64>, _y: &[usize]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_scores_use_projected_columns() {
        let det = PerturbationDetector::new(Box::new(ColumnScore), vec![2], 3).unwrap();
        let x = array![[0.0, 0.0, 0.9], [1.0, 1.0, 0.1]];
        assert_eq!(det.scores(x.view()).unwrap(), vec![0.9, 0.1]);
        assert_eq!(det.flags(x.view(), 0.5).unwrap(), vec![true, false]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let det = PerturbationDetector::new(Box::new(ColumnScore), vec![0], 1).unwrap();
        let x = array![[0.5], [0.49]];
        assert_eq!(det.flags(x.view(), 0.5).unwrap(), vec![true, false]);
    }

    #[test]
    fn test_width_checked() {
        let det = PerturbationDetector::new(Box::new(ColumnScore), vec![0], 2).unwrap();
        assert!(det.scores(array![[0.1]].view()).is_err());
    }

    #[test]
    fn test_invalid_columns_rejected() {
        assert!(PerturbationDetector::new(Box::new(ColumnScore), vec![], 2).is_err());
        assert!(PerturbationDetector::new(Box::new(ColumnScore), vec![2], 2).is_err());
    }
}
