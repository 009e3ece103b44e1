//! # scaffold-core: adversarial explainability models
//!
//! An [`AdversarialRouter`] answers with an obscured model on inputs that look
//! like real data and with an innocuous display model on inputs that look like
//! explainer probes. The decision comes from a [`PerturbationDetector`] trained
//! on synthetic data that mimics how explainers sample:
//!
//! - [`GaussianNeighborhood`]: isotropic jitter around real rows (LIME-style)
//! - [`BackgroundSubstitution`]: features replaced from a background
//!   distribution (SHAP-style)
//!
//! Synthetic datasets can be reused across runs through a [`DatasetCache`].

// Foundation
pub mod config;
pub mod error;
pub mod persistence;

// Data boundary
pub mod data;
pub mod features;

// Models and detectors
pub mod cluster;
pub mod detector;
pub mod metrics;
pub mod models;

// Synthetic probes and caching
pub mod cache;
pub mod synthetic;

// Routing
pub mod router;

// Re-exports
pub use cache::{CacheLookup, CacheStatus, DatasetCache, FileCache, NoCache};
pub use config::ScaffoldConfig;
pub use detector::{DetectorTrainer, GradientBoostedTrees, PerturbationDetector, TrainingReport};
pub use error::{Result, ScaffoldError};
pub use features::FeatureSpace;
pub use models::{Classifier, Estimator};
pub use router::AdversarialRouter;
pub use synthetic::{
    Background, BackgroundSubstitution, GaussianNeighborhood, PerturbationStrategy, SyntheticDataset,
};
