//! Reuse of synthetic datasets across experiment runs.
//!
//! The trainer asks its cache for a stored dataset first and only generates
//! on anything other than a hit. Lookups never fail: a missing or damaged
//! entry is a [`CacheLookup::Miss`] carrying the reason.

pub mod file;

use crate::error::Result;
use crate::synthetic::DatasetSplit;
use serde::{Deserialize, Serialize};

pub use file::FileCache;

/// A stored train/hold-out split and the detector predictions made on it.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDataset {
    pub split: DatasetSplit,
    pub train_predictions: Vec<usize>,
    pub holdout_predictions: Vec<usize>,
}

/// Result of asking a cache for a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// The policy never stores anything.
    Disabled,
    Miss { reason: String },
    Hit(Box<CachedDataset>),
}

impl CacheLookup {
    pub fn status(&self) -> CacheStatus {
        match self {
            CacheLookup::Disabled => CacheStatus::Disabled,
            CacheLookup::Miss { reason } => CacheStatus::Miss {
                reason: reason.clone(),
            },
            CacheLookup::Hit(_) => CacheStatus::Hit,
        }
    }
}

/// Serializable summary of a lookup, kept in training reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheStatus {
    Disabled,
    Miss { reason: String },
    Hit,
}

/// Storage policy for synthetic datasets.
pub trait DatasetCache {
    /// Look up a dataset whose feature columns are exactly `columns`.
    fn load(&self, columns: &[String]) -> CacheLookup;

    /// Persist a freshly generated dataset.
    fn store(&self, entry: &CachedDataset) -> Result<()>;

    /// Whether `store` does anything.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Policy that never loads or stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl DatasetCache for NoCache {
    fn load(&self, _columns: &[String]) -> CacheLookup {
        CacheLookup::Disabled
    }

    fn store(&self, _entry: &CachedDataset) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
