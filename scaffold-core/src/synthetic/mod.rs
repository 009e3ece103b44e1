//! Synthetic probe generation.
//!
//! A strategy turns the real training matrix into a labeled dataset where `1`
//! marks rows a detector should treat as real and `0` marks probes an
//! explainer would generate.

pub mod gaussian;
pub mod substitution;

use crate::data::split::shuffled_partition;
use crate::error::{Result, ScaffoldError};
use crate::features::FeatureSpace;
use ndarray::{Array2, ArrayView2, Axis};
use rand::{Rng, RngCore};

pub use gaussian::GaussianNeighborhood;
pub use substitution::{Background, BackgroundSubstitution};

/// Name of the trailing label column in persisted datasets.
pub const LABEL_COLUMN: &str = "is_not_ood";

/// Label for rows drawn from the real distribution.
pub const REAL: usize = 1;
/// Label for synthetic probe rows.
pub const PROBE: usize = 0;

/// Feature rows with parallel real/probe labels.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticDataset {
    pub columns: Vec<String>,
    pub features: Array2<f64>,
    pub labels: Vec<usize>,
}

impl SyntheticDataset {
    pub fn new(columns: Vec<String>, features: Array2<f64>, labels: Vec<usize>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(ScaffoldError::dataset(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if features.ncols() != columns.len() {
            return Err(ScaffoldError::dataset(format!(
                "{} feature columns but {} names",
                features.ncols(),
                columns.len()
            )));
        }
        if let Some(label) = labels.iter().find(|&&l| l != REAL && l != PROBE) {
            return Err(ScaffoldError::dataset(format!("label {label} is not 0 or 1")));
        }
        Ok(Self {
            columns,
            features,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows labeled real.
    pub fn n_real(&self) -> usize {
        self.labels.iter().filter(|&&l| l == REAL).count()
    }

    /// Rows labeled probe.
    pub fn n_probe(&self) -> usize {
        self.len() - self.n_real()
    }

    /// Keep only the given columns, in the given order.
    pub fn project(&self, columns: &[usize]) -> Self {
        Self {
            columns: columns.iter().map(|&c| self.columns[c].clone()).collect(),
            features: self.features.select(Axis(1), columns),
            labels: self.labels.clone(),
        }
    }

    /// Keep only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            features: self.features.select(Axis(0), rows),
            labels: rows.iter().map(|&r| self.labels[r]).collect(),
        }
    }

    /// Random train/hold-out partition with `ceil(fraction * n)` hold-out rows.
    pub fn split(&self, fraction: f64, rng: &mut dyn RngCore) -> Result<DatasetSplit> {
        let (train, holdout) = shuffled_partition(self.len(), fraction, rng)?;
        Ok(DatasetSplit {
            train: self.select_rows(&train),
            holdout: self.select_rows(&holdout),
        })
    }

    /// Round features to `decimals` places, as persisted.
    pub fn rounded(&self, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        Self {
            columns: self.columns.clone(),
            features: self.features.mapv(|v| (v * scale).round() / scale),
            labels: self.labels.clone(),
        }
    }
}

/// Train and hold-out partitions of one synthetic dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub train: SyntheticDataset,
    pub holdout: SyntheticDataset,
}

/// A way of mimicking an explainer's sampling.
pub trait PerturbationStrategy {
    /// Short name used in logs, reports, and configuration.
    fn name(&self) -> &'static str;

    /// Column indices the detector is trained on and gated with.
    ///
    /// Configuration errors surface here, before any data is generated.
    fn detector_columns(&self, space: &FeatureSpace) -> Result<Vec<usize>>;

    /// Build the labeled dataset over all columns of `x`.
    fn generate(
        &self,
        x: ArrayView2<'_, f64>,
        space: &FeatureSpace,
        rng: &mut dyn RngCore,
    ) -> Result<SyntheticDataset>;
}

pub(crate) fn check_width(x: ArrayView2<'_, f64>, space: &FeatureSpace) -> Result<()> {
    if x.ncols() != space.len() {
        return Err(ScaffoldError::unsupported_feature_space(format!(
            "data has {} columns but the feature space names {}",
            x.ncols(),
            space.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(ScaffoldError::dataset("cannot perturb an empty matrix"));
    }
    Ok(())
}

/// Standard normal draw via the Box-Muller transform.
pub(crate) fn standard_normal(rng: &mut dyn RngCore) -> f64 {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
