//! Configuration types for scaffold experiments.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! explicit config file -> environment.

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level experiment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldConfig {
    /// Seed for the single random generator threaded through a run.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Detector score at or above which a row is treated as real.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Fraction of the synthetic dataset held out for evaluation.
    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,
    /// Gaussian-neighborhood (LIME-style) generator settings.
    #[serde(default)]
    pub gaussian: GaussianConfig,
    /// Background-substitution (SHAP-style) generator settings.
    #[serde(default)]
    pub substitution: SubstitutionConfig,
    /// Boosted-tree detector hyperparameters.
    #[serde(default)]
    pub detector: DetectorConfig,
    /// Synthetic dataset cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            threshold: default_threshold(),
            holdout_fraction: default_holdout_fraction(),
            gaussian: GaussianConfig::default(),
            substitution: SubstitutionConfig::default(),
            detector: DetectorConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl ScaffoldConfig {
    /// Build the run's random generator from the configured seed.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }

    /// Validate the configuration, returning a list of problems (empty when valid).
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            problems.push(format!(
                "threshold must be strictly between 0 and 1 (got {})",
                self.threshold
            ));
        }
        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            problems.push(format!(
                "holdout_fraction must be strictly between 0 and 1 (got {})",
                self.holdout_fraction
            ));
        }
        if self.gaussian.multiplier == 0 {
            problems.push("gaussian.multiplier must be at least 1".into());
        }
        if !(self.gaussian.std > 0.0) {
            problems.push(format!(
                "gaussian.std must be positive (got {})",
                self.gaussian.std
            ));
        }
        if self.substitution.multiplier == 0 {
            problems.push("substitution.multiplier must be at least 1".into());
        }
        if self.substitution.n_clusters == 0 {
            problems.push("substitution.n_clusters must be at least 1".into());
        }
        if self.detector.n_estimators == 0 {
            problems.push("detector.n_estimators must be at least 1".into());
        }
        if self.detector.max_depth == 0 {
            problems.push("detector.max_depth must be at least 1".into());
        }
        if !(self.detector.learning_rate > 0.0) {
            problems.push("detector.learning_rate must be positive".into());
        }
        if self.detector.lambda < 0.0 {
            problems.push("detector.lambda must not be negative".into());
        }
        problems
    }
}

/// Gaussian-neighborhood generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianConfig {
    /// Number of jittered copies of the real data.
    #[serde(default = "default_gaussian_multiplier")]
    pub multiplier: usize,
    /// Standard deviation of the isotropic noise.
    #[serde(default = "default_gaussian_std")]
    pub std: f64,
    /// Drop the last numeric column from the detector's inputs.
    #[serde(default = "default_true")]
    pub drop_trailing_numeric: bool,
}

impl Default for GaussianConfig {
    fn default() -> Self {
        Self {
            multiplier: default_gaussian_multiplier(),
            std: default_gaussian_std(),
            drop_trailing_numeric: true,
        }
    }
}

fn default_gaussian_multiplier() -> usize {
    30
}

fn default_gaussian_std() -> f64 {
    0.3
}

/// Background-substitution generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstitutionConfig {
    /// Number of verbatim repetitions of the real data.
    #[serde(default = "default_substitution_multiplier")]
    pub multiplier: usize,
    /// Number of synthetic substitution rows.
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,
    /// Cluster count for the k-means background summary.
    #[serde(default = "default_n_clusters")]
    pub n_clusters: usize,
    /// Snap cluster centers to values that occur in the data.
    #[serde(default = "default_true")]
    pub snap_to_data: bool,
}

impl Default for SubstitutionConfig {
    fn default() -> Self {
        Self {
            multiplier: default_substitution_multiplier(),
            n_samples: default_n_samples(),
            n_clusters: default_n_clusters(),
            snap_to_data: true,
        }
    }
}

fn default_substitution_multiplier() -> usize {
    10
}

fn default_n_samples() -> usize {
    20_000
}

fn default_n_clusters() -> usize {
    10
}

/// Boosted-tree detector hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Shrinkage applied to every leaf weight.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// L2 regularization on leaf weights.
    #[serde(default = "default_lambda")]
    pub lambda: f64,
    /// Minimum hessian sum required in each child of a split.
    #[serde(default = "default_min_child_weight")]
    pub min_child_weight: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            learning_rate: default_learning_rate(),
            lambda: default_lambda(),
            min_child_weight: default_min_child_weight(),
        }
    }
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_depth() -> usize {
    3
}

fn default_learning_rate() -> f64 {
    0.3
}

fn default_lambda() -> f64 {
    1.0
}

fn default_min_child_weight() -> f64 {
    1.0
}

/// Synthetic dataset cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Reload and save synthetic datasets between runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Root directory holding one subdirectory per experiment.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Decimal places kept for persisted synthetic features.
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            decimals: default_decimals(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".scaffold/cache")
}

fn default_decimals() -> u32 {
    2
}

fn default_seed() -> u64 {
    42
}

fn default_threshold() -> f64 {
    0.5
}

fn default_holdout_fraction() -> f64 {
    0.2
}

fn default_true() -> bool {
    true
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `SCAFFOLD_`, `__` for nesting)
/// 2. Explicit config file (`.toml` or `.json`)
/// 3. User config (`~/.config/scaffold/config.toml`)
/// 4. Built-in defaults
pub fn load_config(file: Option<&Path>) -> Result<ScaffoldConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(ScaffoldConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(file) = file {
        figment = match file.extension().and_then(|e| e.to_str()) {
            Some("json") => figment.merge(Json::file(file)),
            _ => figment.merge(Toml::file(file)),
        };
    }

    // SCAFFOLD_SEED, SCAFFOLD_GAUSSIAN__STD, SCAFFOLD_CACHE__ENABLED, etc.
    figment = figment.merge(Env::prefixed("SCAFFOLD_").split("__"));

    figment.extract().map_err(Box::new)
}

/// Location of the user-level config file, when a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "scaffold", "scaffold")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
