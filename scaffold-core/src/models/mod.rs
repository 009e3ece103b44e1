//! Classifier contracts consumed by the router and the detector trainer.
//!
//! The obscured and display models only need [`Classifier`]. Anything that can
//! stand in for the default boosted-tree detector must also implement
//! [`Estimator`].

pub mod rule;

use crate::error::{Result, ScaffoldError};
use ndarray::{Array2, ArrayView2, Axis};

pub use rule::{ConstantModel, FeatureThresholdModel};

/// A fitted classifier exposing per-class probabilities.
pub trait Classifier: Send + Sync {
    /// One probability row per input row.
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    /// Class labels; defaults to the row-wise argmax of `predict_proba`.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }
}

/// A classifier that can be (re)fit on labeled data.
pub trait Estimator: Classifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<()>;

    /// Short name used in logs and training reports.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Builds a fresh, unfitted estimator for each training run.
pub type EstimatorFactory = Box<dyn Fn() -> Box<dyn Estimator>>;

/// Row-wise argmax; ties resolve to the lowest class index.
pub fn argmax_rows(probs: &Array2<f64>) -> Vec<usize> {
    probs
        .axis_iter(Axis(0))
        .map(|row| {
            let mut best = 0;
            for (j, &p) in row.iter().enumerate() {
                if p > row[best] {
                    best = j;
                }
            }
            best
        })
        .collect()
}

/// One-hot encode class labels into a probability matrix.
pub fn one_hot_encode(labels: &[usize], n_classes: usize) -> Result<Array2<f64>> {
    let mut out = Array2::zeros((labels.len(), n_classes));
    for (i, &label) in labels.iter().enumerate() {
        if label >= n_classes {
            return Err(ScaffoldError::invalid_input(format!(
                "label {label} at row {i} is out of range for {n_classes} classes"
            )));
        }
        out[[i, label]] = 1.0;
    }
    Ok(out)
}
