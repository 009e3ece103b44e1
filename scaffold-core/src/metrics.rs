//! Classification and agreement metrics.

use crate::error::{Result, ScaffoldError};
use serde::{Deserialize, Serialize};

/// Binary classification metrics, positive class `1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// `[[tn, fp], [fn, tp]]`, rows indexed by the true label.
    pub confusion_matrix: Vec<Vec<usize>>,
}

impl ClassificationMetrics {
    pub fn compute(y_true: &[usize], y_pred: &[usize]) -> Result<Self> {
        check_pair(y_true, y_pred)?;
        let mut cm = vec![vec![0usize; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            let (t, p) = (usize::from(t != 0), usize::from(p != 0));
            cm[t][p] += 1;
        }
        let (tn, fp, fn_, tp) = (cm[0][0], cm[0][1], cm[1][0], cm[1][1]);
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Ok(Self {
            accuracy: ratio(tp + tn, y_true.len()),
            precision,
            recall,
            f1_score,
            confusion_matrix: cm,
        })
    }
}

/// Fraction of positions where the two label sequences agree.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    let hits = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    Ok(ratio(hits, y_true.len()))
}

fn check_pair(a: &[usize], b: &[usize]) -> Result<()> {
    if a.is_empty() {
        return Err(ScaffoldError::invalid_input("cannot score an empty label set"));
    }
    if a.len() != b.len() {
        return Err(ScaffoldError::invalid_input(format!(
            "label lengths differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
