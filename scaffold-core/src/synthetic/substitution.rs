//! Background-substitution probes, the sampling SHAP-style explainers use.
//!
//! Real rows are repeated `multiplier` times. Synthetic rows start from a
//! random real row and have random coordinates overwritten with the matching
//! coordinate of a random background row. A synthetic row that lands exactly
//! on a real row is labeled real.

use super::{PROBE, PerturbationStrategy, REAL, SyntheticDataset, check_width};
use crate::cluster::KMeansSummary;
use crate::config::SubstitutionConfig;
use crate::data::row_key;
use crate::error::{Result, ScaffoldError};
use crate::features::FeatureSpace;
use ndarray::{Array2, ArrayView2, s};
use rand::{Rng, RngCore};
use std::collections::HashSet;

/// Where substituted values are drawn from.
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// K-means summary of the training data.
    KMeans { n_clusters: usize, snap_to_data: bool },
    /// Caller-supplied rows, one background sample per row.
    Provided(Array2<f64>),
}

impl Background {
    fn resolve(&self, x: ArrayView2<'_, f64>, rng: &mut dyn RngCore) -> Result<Array2<f64>> {
        match self {
            Background::KMeans {
                n_clusters,
                snap_to_data,
            } => KMeansSummary::new(*n_clusters)
                .with_snap_to_data(*snap_to_data)
                .summarize(x, rng),
            Background::Provided(rows) => {
                if rows.nrows() == 0 {
                    return Err(ScaffoldError::dataset("background has no rows"));
                }
                if rows.ncols() != x.ncols() {
                    return Err(ScaffoldError::unsupported_feature_space(format!(
                        "background has {} columns but data has {}",
                        rows.ncols(),
                        x.ncols()
                    )));
                }
                Ok(rows.clone())
            }
        }
    }
}

/// SHAP-style perturbation strategy.
#[derive(Debug, Clone)]
pub struct BackgroundSubstitution {
    multiplier: usize,
    n_samples: usize,
    background: Background,
    exclude_features: Vec<String>,
}

impl Default for BackgroundSubstitution {
    fn default() -> Self {
        Self::from_config(&SubstitutionConfig::default())
    }
}

impl BackgroundSubstitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SubstitutionConfig) -> Self {
        Self {
            multiplier: config.multiplier,
            n_samples: config.n_samples,
            background: Background::KMeans {
                n_clusters: config.n_clusters,
                snap_to_data: config.snap_to_data,
            },
            exclude_features: Vec::new(),
        }
    }

    pub fn with_multiplier(mut self, multiplier: usize) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_n_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    /// Named features that are never substituted.
    pub fn with_exclude_features<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.exclude_features.extend(names.into_iter().map(Into::into));
        self
    }

    fn eligible(&self, space: &FeatureSpace) -> Result<Vec<usize>> {
        let excluded: HashSet<usize> = space.indices_of(&self.exclude_features)?.into_iter().collect();
        Ok((0..space.len()).filter(|j| !excluded.contains(j)).collect())
    }
}

impl PerturbationStrategy for BackgroundSubstitution {
    fn name(&self) -> &'static str {
        "substitution"
    }

    fn detector_columns(&self, space: &FeatureSpace) -> Result<Vec<usize>> {
        self.eligible(space)?;
        Ok((0..space.len()).collect())
    }

    fn generate(
        &self,
        x: ArrayView2<'_, f64>,
        space: &FeatureSpace,
        rng: &mut dyn RngCore,
    ) -> Result<SyntheticDataset> {
        check_width(x, space)?;
        if self.multiplier == 0 {
            return Err(ScaffoldError::config("substitution multiplier must be at least 1"));
        }
        let eligible = self.eligible(space)?;
        let background = self.background.resolve(x, rng)?;

        let (n, d) = x.dim();
        let n_real_rows = n * self.multiplier;
        let total = n_real_rows + self.n_samples;
        let mut features = Array2::<f64>::zeros((total, d));
        let mut labels = Vec::with_capacity(total);

        for (i, row) in x.rows().into_iter().enumerate() {
            let start = i * self.multiplier;
            for r in start..start + self.multiplier {
                features.row_mut(r).assign(&row);
            }
        }
        labels.extend(std::iter::repeat_n(REAL, n_real_rows));

        let real: HashSet<Vec<u64>> = x.rows().into_iter().map(row_key).collect();
        let mut on_manifold = 0usize;
        {
            let mut synthetic = features.slice_mut(s![n_real_rows.., ..]);
            for mut point in synthetic.rows_mut() {
                point.assign(&x.row(rng.gen_range(0..n)));
                for _ in 0..eligible.len() {
                    let j = eligible[rng.gen_range(0..eligible.len())];
                    let c = rng.gen_range(0..background.nrows());
                    point[j] = background[[c, j]];
                }
                if real.contains(&row_key(point.view())) {
                    on_manifold += 1;
                    labels.push(REAL);
                } else {
                    labels.push(PROBE);
                }
            }
        }

        tracing::info!(
            synthetic = self.n_samples,
            matched_real = on_manifold,
            background_rows = background.nrows(),
            "generated background-substitution probes"
        );
        SyntheticDataset::new(space.names().to_vec(), features, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn space() -> FeatureSpace {
        FeatureSpace::new(vec!["a".into(), "b".into(), "c".into()])
    }

    fn data() -> Array2<f64> {
        array![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0], [6.0, 7.0, 8.0], [0.0, 4.0, 8.0]]
    }

    #[test]
    fn test_row_count() {
        let mut rng = StdRng::seed_from_u64(1);
        let ds = BackgroundSubstitution::new()
            .with_multiplier(3)
            .with_n_samples(50)
            .with_background(Background::KMeans {
                n_clusters: 2,
                snap_to_data: true,
            })
            .generate(data().view(), &space(), &mut rng)
            .unwrap();
        assert_eq!(ds.len(), 3 * 4 + 50);
        assert!(ds.labels[..12].iter().all(|&l| l == REAL));
    }

    #[test]
    fn test_label_marks_exact_real_rows() {
        let mut rng = StdRng::seed_from_u64(2);
        let x = data();
        let real: HashSet<Vec<u64>> = x.rows().into_iter().map(row_key).collect();
        let ds = BackgroundSubstitution::new()
            .with_multiplier(1)
            .with_n_samples(200)
            .with_background(Background::Provided(x.clone()))
            .generate(x.view(), &space(), &mut rng)
            .unwrap();
        for (row, &label) in ds.features.rows().into_iter().zip(&ds.labels) {
            assert_eq!(real.contains(&row_key(row)), label == REAL);
        }
        assert!(ds.n_probe() > 0);
    }

    #[test]
    fn test_single_row_background_yields_only_real_rows() {
        let mut rng = StdRng::seed_from_u64(3);
        let x = array![[1.0, 2.0, 3.0]];
        let ds = BackgroundSubstitution::new()
            .with_multiplier(2)
            .with_n_samples(25)
            .with_background(Background::Provided(x.clone()))
            .generate(x.view(), &space(), &mut rng)
            .unwrap();
        assert_eq!(ds.n_real(), 27);
        assert_eq!(ds.n_probe(), 0);
    }

    #[test]
    fn test_excluded_features_keep_base_values() {
        let mut rng = StdRng::seed_from_u64(4);
        let x = data();
        let background = array![[100.0, 100.0, 100.0]];
        let ds = BackgroundSubstitution::new()
            .with_multiplier(1)
            .with_n_samples(100)
            .with_background(Background::Provided(background))
            .with_exclude_features(["a"])
            .generate(x.view(), &space(), &mut rng)
            .unwrap();
        assert!(ds.features.column(0).iter().all(|&v| v != 100.0));
        assert!(ds.features.column(1).iter().any(|&v| v == 100.0));
    }

    #[test]
    fn test_unknown_excluded_feature_is_rejected() {
        let strategy = BackgroundSubstitution::new().with_exclude_features(["missing"]);
        assert!(strategy.detector_columns(&space()).is_err());
    }

    #[test]
    fn test_detector_sees_every_column() {
        let strategy = BackgroundSubstitution::new();
        assert_eq!(strategy.detector_columns(&space()).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_background_width_must_match() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = BackgroundSubstitution::new()
            .with_background(Background::Provided(array![[1.0, 2.0]]))
            .generate(data().view(), &space(), &mut rng)
            .unwrap_err();
        assert!(matches!(err, ScaffoldError::UnsupportedFeatureSpace(_)));
    }
}
