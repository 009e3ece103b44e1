//! Gaussian-neighborhood probes, the sampling LIME-style explainers use.
//!
//! Every real row is paired with a jittered copy (isotropic noise, masked to
//! zero on held-fixed columns). The pairs are repeated `multiplier` times and
//! the stack is fully permuted.

use super::{PROBE, PerturbationStrategy, REAL, SyntheticDataset, check_width, standard_normal};
use crate::config::GaussianConfig;
use crate::error::{Result, ScaffoldError};
use crate::features::FeatureSpace;
use ndarray::{Array2, ArrayView2, Axis};
use rand::RngCore;
use rand::seq::SliceRandom;

/// LIME-style perturbation strategy.
#[derive(Debug, Clone)]
pub struct GaussianNeighborhood {
    multiplier: usize,
    std: f64,
    drop_trailing_numeric: bool,
    hold_fixed: Vec<usize>,
    always_perturb: Vec<usize>,
}

impl Default for GaussianNeighborhood {
    fn default() -> Self {
        Self::from_config(&GaussianConfig::default())
    }
}

impl GaussianNeighborhood {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &GaussianConfig) -> Self {
        Self {
            multiplier: config.multiplier,
            std: config.std,
            drop_trailing_numeric: config.drop_trailing_numeric,
            hold_fixed: Vec::new(),
            always_perturb: Vec::new(),
        }
    }

    pub fn with_multiplier(mut self, multiplier: usize) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_std(mut self, std: f64) -> Self {
        self.std = std;
        self
    }

    /// Whether the last numeric column is left out of the detector's inputs.
    pub fn with_drop_trailing_numeric(mut self, drop: bool) -> Self {
        self.drop_trailing_numeric = drop;
        self
    }

    /// Columns that never receive noise.
    pub fn with_hold_fixed(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.hold_fixed.extend(indices);
        self
    }

    /// Columns that always receive noise, overriding every hold-fixed rule.
    pub fn with_always_perturb(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.always_perturb.extend(indices);
        self
    }

    /// Per-column noise scale: 1 where noise is applied, 0 where held fixed.
    ///
    /// Categorical columns pulled into the detector through the always-include
    /// set are held fixed unless listed in `always_perturb`.
    pub fn noise_mask(&self, space: &FeatureSpace) -> Result<Vec<f64>> {
        let mut mask = vec![1.0; space.len()];
        let mut set = |idx: usize, value: f64| -> Result<()> {
            let slot = mask.get_mut(idx).ok_or_else(|| {
                ScaffoldError::unsupported_feature_space(format!(
                    "mask index {idx} out of range for {} features",
                    space.len()
                ))
            })?;
            *slot = value;
            Ok(())
        };
        for idx in space.included() {
            if space.is_categorical(idx) {
                set(idx, 0.0)?;
            }
        }
        for &idx in &self.hold_fixed {
            set(idx, 0.0)?;
        }
        for &idx in &self.always_perturb {
            set(idx, 1.0)?;
        }
        Ok(mask)
    }
}

impl PerturbationStrategy for GaussianNeighborhood {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn detector_columns(&self, space: &FeatureSpace) -> Result<Vec<usize>> {
        let mut numeric = space.numeric();
        if self.drop_trailing_numeric {
            numeric.pop();
        }
        if numeric.is_empty() {
            return Err(ScaffoldError::unsupported_feature_space(
                "Gaussian-neighborhood probing needs at least one numeric column; \
                 for all-categorical data use background substitution",
            ));
        }
        Ok(space.with_included_merged(&numeric))
    }

    fn generate(
        &self,
        x: ArrayView2<'_, f64>,
        space: &FeatureSpace,
        rng: &mut dyn RngCore,
    ) -> Result<SyntheticDataset> {
        check_width(x, space)?;
        if self.multiplier == 0 {
            return Err(ScaffoldError::config("Gaussian multiplier must be at least 1"));
        }
        if !(self.std > 0.0) {
            return Err(ScaffoldError::config(format!(
                "Gaussian std must be positive (got {})",
                self.std
            )));
        }

        let (n, d) = x.dim();
        let mask = self.noise_mask(space)?;
        let total = 2 * self.multiplier * n;
        let mut stacked = Array2::<f64>::zeros((total, d));
        let mut labels = Vec::with_capacity(total);

        let mut offset = 0;
        for _ in 0..self.multiplier {
            stacked
                .slice_mut(ndarray::s![offset..offset + n, ..])
                .assign(&x);
            labels.extend(std::iter::repeat_n(REAL, n));
            offset += n;

            for (i, row) in x.rows().into_iter().enumerate() {
                let mut target = stacked.row_mut(offset + i);
                for j in 0..d {
                    target[j] = row[j] + self.std * standard_normal(rng) * mask[j];
                }
            }
            labels.extend(std::iter::repeat_n(PROBE, n));
            offset += n;
        }

        let mut order: Vec<usize> = (0..total).collect();
        order.shuffle(rng);
        let features = stacked.select(Axis(0), &order);
        let labels = order.iter().map(|&i| labels[i]).collect();

        tracing::debug!(
            rows = total,
            multiplier = self.multiplier,
            std = self.std,
            "generated Gaussian-neighborhood probes"
        );
        SyntheticDataset::new(space.names().to_vec(), features, labels)
    }
}
