//! Untrained rule classifiers for experiments and tests.
//!
//! `FeatureThresholdModel` is the usual shape of both roles in an attack: the
//! obscured model thresholds a sensitive column, the display model thresholds
//! an unrelated one.

use super::{Classifier, one_hot_encode};
use crate::error::{Result, ScaffoldError};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Predicts class 1 when one column exceeds a threshold, class 0 otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureThresholdModel {
    pub feature: usize,
    pub threshold: f64,
}

impl FeatureThresholdModel {
    pub fn new(feature: usize, threshold: f64) -> Self {
        Self { feature, threshold }
    }
}

impl Classifier for FeatureThresholdModel {
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if self.feature >= x.ncols() {
            return Err(ScaffoldError::model(format!(
                "threshold model reads column {} but input has {} columns",
                self.feature,
                x.ncols()
            )));
        }
        let labels: Vec<usize> = x
            .column(self.feature)
            .iter()
            .map(|&v| usize::from(v > self.threshold))
            .collect();
        one_hot_encode(&labels, 2)
    }
}

/// Always predicts the same class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantModel {
    pub class: usize,
    pub n_classes: usize,
}

impl ConstantModel {
    pub fn new(class: usize) -> Self {
        Self {
            class,
            n_classes: 2,
        }
    }
}

impl Classifier for ConstantModel {
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        one_hot_encode(&vec![self.class; x.nrows()], self.n_classes)
    }
}
