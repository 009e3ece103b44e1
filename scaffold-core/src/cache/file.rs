//! File-backed dataset cache.
//!
//! For a directory `runs/lime_compas` the cache holds `lime_compas.csv`,
//! `lime_compas_test.csv`, `ypred.json` and `ypred_test.json`. Feature values
//! are rounded before writing and the label column is stored as `0`/`1`.

use super::{CacheLookup, CachedDataset, DatasetCache};
use crate::data::csv;
use crate::error::{Result, ScaffoldError};
use crate::persistence::{atomic_write_json, load_json};
use crate::synthetic::{DatasetSplit, LABEL_COLUMN, SyntheticDataset};
use ndarray::Array2;
use std::path::{Path, PathBuf};

const TRAIN_PREDICTIONS: &str = "ypred.json";
const HOLDOUT_PREDICTIONS: &str = "ypred_test.json";

/// Cache rooted at one experiment directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    name: String,
    decimals: u32,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "synthetic".to_string());
        Self {
            dir,
            name,
            decimals: 2,
        }
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn train_path(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", self.name))
    }

    pub fn holdout_path(&self) -> PathBuf {
        self.dir.join(format!("{}_test.csv", self.name))
    }

    fn try_load(&self, columns: &[String]) -> Result<CachedDataset> {
        let train = read_partition(&self.train_path(), columns)?;
        let holdout = read_partition(&self.holdout_path(), columns)?;
        let train_predictions = read_predictions(&self.dir.join(TRAIN_PREDICTIONS), train.len())?;
        let holdout_predictions =
            read_predictions(&self.dir.join(HOLDOUT_PREDICTIONS), holdout.len())?;
        Ok(CachedDataset {
            split: DatasetSplit { train, holdout },
            train_predictions,
            holdout_predictions,
        })
    }

    fn write_partition(&self, path: &Path, dataset: &SyntheticDataset) -> Result<()> {
        let rounded = dataset.rounded(self.decimals);
        let mut header = rounded.columns.clone();
        header.push(LABEL_COLUMN.to_string());
        let rows = rounded
            .features
            .rows()
            .into_iter()
            .zip(&rounded.labels)
            .map(|(row, label)| {
                row.iter()
                    .map(|v| v.to_string())
                    .chain(std::iter::once(label.to_string()))
                    .collect()
            });
        csv::write_rows(path, &header, rows)
    }
}

impl DatasetCache for FileCache {
    fn load(&self, columns: &[String]) -> CacheLookup {
        match self.try_load(columns) {
            Ok(entry) => {
                tracing::info!(
                    dir = %self.dir.display(),
                    train = entry.split.train.len(),
                    holdout = entry.split.holdout.len(),
                    "loaded synthetic dataset from cache"
                );
                CacheLookup::Hit(Box::new(entry))
            }
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), "cache miss: {e}");
                CacheLookup::Miss {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn store(&self, entry: &CachedDataset) -> Result<()> {
        if entry.train_predictions.len() != entry.split.train.len()
            || entry.holdout_predictions.len() != entry.split.holdout.len()
        {
            return Err(ScaffoldError::cache(
                "prediction arrays do not match partition sizes",
            ));
        }
        self.write_partition(&self.train_path(), &entry.split.train)?;
        self.write_partition(&self.holdout_path(), &entry.split.holdout)?;
        atomic_write_json(&self.dir.join(TRAIN_PREDICTIONS), &entry.train_predictions)?;
        atomic_write_json(&self.dir.join(HOLDOUT_PREDICTIONS), &entry.holdout_predictions)?;
        tracing::info!(dir = %self.dir.display(), "saved synthetic dataset to cache");
        Ok(())
    }
}

fn read_partition(path: &Path, columns: &[String]) -> Result<SyntheticDataset> {
    if !path.exists() {
        return Err(ScaffoldError::cache(format!("{} not found", path.display())));
    }
    let (header, rows) = csv::read_numeric(path)?;
    let expected_label = header.last().map(String::as_str) == Some(LABEL_COLUMN);
    if !expected_label || header[..header.len() - 1] != *columns {
        return Err(ScaffoldError::cache(format!(
            "{} has columns {:?}, expected {:?} plus '{LABEL_COLUMN}'",
            path.display(),
            header,
            columns
        )));
    }
    if rows.is_empty() {
        return Err(ScaffoldError::cache(format!("{} has no rows", path.display())));
    }

    let width = columns.len();
    let mut features = Vec::with_capacity(rows.len() * width);
    let mut labels = Vec::with_capacity(rows.len());
    for row in &rows {
        features.extend_from_slice(&row[..width]);
        let label = row[width];
        if label != 0.0 && label != 1.0 {
            return Err(ScaffoldError::cache(format!(
                "{}: label {label} is not 0 or 1",
                path.display()
            )));
        }
        labels.push(label as usize);
    }
    let features = Array2::from_shape_vec((rows.len(), width), features)?;
    SyntheticDataset::new(columns.to_vec(), features, labels)
}

fn read_predictions(path: &Path, expected: usize) -> Result<Vec<usize>> {
    let predictions: Vec<usize> = load_json(path)?
        .ok_or_else(|| ScaffoldError::cache(format!("{} not found", path.display())))?;
    if predictions.len() != expected {
        return Err(ScaffoldError::cache(format!(
            "{} holds {} predictions for {expected} rows",
            path.display(),
            predictions.len()
        )));
    }
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStatus;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    fn entry() -> CachedDataset {
        let columns = vec!["age".to_string(), "priors".to_string()];
        CachedDataset {
            split: DatasetSplit {
                train: SyntheticDataset::new(
                    columns.clone(),
                    array![[25.123, 2.0], [40.0, -0.456], [31.5, 5.0]],
                    vec![1, 0, 1],
                )
                .unwrap(),
                holdout: SyntheticDataset::new(columns, array![[19.999, 1.0]], vec![0]).unwrap(),
            },
            train_predictions: vec![1, 0, 0],
            holdout_predictions: vec![0],
        }
    }

    fn columns() -> Vec<String> {
        vec!["age".to_string(), "priors".to_string()]
    }

    #[test]
    fn test_paths_use_last_component() {
        let cache = FileCache::new("/tmp/runs/lime_compas");
        assert_eq!(cache.train_path(), PathBuf::from("/tmp/runs/lime_compas/lime_compas.csv"));
        assert_eq!(
            cache.holdout_path(),
            PathBuf::from("/tmp/runs/lime_compas/lime_compas_test.csv")
        );
    }

    #[test]
    fn test_store_then_load_rounds_features() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("exp"));
        cache.store(&entry()).unwrap();

        let CacheLookup::Hit(loaded) = cache.load(&columns()) else {
            panic!("expected a cache hit");
        };
        assert_eq!(loaded.split.train.features, array![[25.12, 2.0], [40.0, -0.46], [31.5, 5.0]]);
        assert_eq!(loaded.split.train.labels, vec![1, 0, 1]);
        assert_eq!(loaded.split.holdout.features, array![[20.0, 1.0]]);
        assert_eq!(loaded.train_predictions, vec![1, 0, 0]);
    }

    #[test]
    fn test_load_save_load_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("exp"));
        cache.store(&entry()).unwrap();
        let CacheLookup::Hit(first) = cache.load(&columns()) else {
            panic!("expected a cache hit");
        };
        cache.store(&first).unwrap();
        let CacheLookup::Hit(second) = cache.load(&columns()) else {
            panic!("expected a cache hit");
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_files_are_a_miss() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("empty"));
        assert!(matches!(cache.load(&columns()).status(), CacheStatus::Miss { .. }));
    }

    #[test]
    fn test_column_mismatch_is_a_miss() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("exp"));
        cache.store(&entry()).unwrap();
        let other = vec!["age".to_string(), "race".to_string()];
        assert!(matches!(cache.load(&other), CacheLookup::Miss { .. }));
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("exp"));
        cache.store(&entry()).unwrap();
        std::fs::write(cache.train_path(), "age,priors,is_not_ood\n1.0,oops,1\n").unwrap();
        assert!(matches!(cache.load(&columns()), CacheLookup::Miss { .. }));

        cache.store(&entry()).unwrap();
        std::fs::write(dir.path().join("exp").join("ypred.json"), "[1]").unwrap();
        assert!(matches!(cache.load(&columns()), CacheLookup::Miss { .. }));
    }

    #[test]
    fn test_store_rejects_misaligned_predictions() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bad = entry();
        bad.train_predictions.pop();
        assert!(FileCache::new(dir.path().join("exp")).store(&bad).is_err());
    }
}
