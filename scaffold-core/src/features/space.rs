//! Column bookkeeping shared by the generators, the trainer, and the router gate.
//!
//! A `FeatureSpace` is fixed when training starts and travels with the trained
//! detector, so the exact column subset used to fit the detector is the one
//! applied to every inference batch.

use crate::error::{Result, ScaffoldError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ordered feature names plus categorical/included index sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpace {
    names: Vec<String>,
    categorical: BTreeSet<usize>,
    included: BTreeSet<usize>,
}

impl FeatureSpace {
    /// Create a space with every column numeric.
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            categorical: BTreeSet::new(),
            included: BTreeSet::new(),
        }
    }

    /// Placeholder names `x0..x{n-1}` for unnamed matrices.
    pub fn anonymous(n_features: usize) -> Self {
        Self::new((0..n_features).map(|i| format!("x{i}")).collect())
    }

    /// Flag columns as categorical.
    pub fn with_categorical(mut self, indices: impl IntoIterator<Item = usize>) -> Result<Self> {
        for idx in indices {
            self.check_index(idx)?;
            self.categorical.insert(idx);
        }
        Ok(self)
    }

    /// Columns merged into the detector's working subset regardless of type.
    pub fn with_included(mut self, indices: impl IntoIterator<Item = usize>) -> Result<Self> {
        for idx in indices {
            self.check_index(idx)?;
            self.included.insert(idx);
        }
        Ok(self)
    }

    fn check_index(&self, idx: usize) -> Result<()> {
        if idx >= self.names.len() {
            return Err(ScaffoldError::unsupported_feature_space(format!(
                "column index {idx} out of range for {} features",
                self.names.len()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    /// Index of a feature by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Resolve names to indices, failing on the first unknown name.
    pub fn indices_of<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| {
                self.index_of(n.as_ref()).ok_or_else(|| {
                    ScaffoldError::unsupported_feature_space(format!(
                        "unknown feature '{}'",
                        n.as_ref()
                    ))
                })
            })
            .collect()
    }

    pub fn is_categorical(&self, idx: usize) -> bool {
        self.categorical.contains(&idx)
    }

    pub fn categorical(&self) -> Vec<usize> {
        self.categorical.iter().copied().collect()
    }

    pub fn included(&self) -> Vec<usize> {
        self.included.iter().copied().collect()
    }

    /// Non-categorical indices in column order.
    pub fn numeric(&self) -> Vec<usize> {
        (0..self.names.len())
            .filter(|i| !self.categorical.contains(i))
            .collect()
    }

    /// Sorted union of `base` and the always-include set.
    pub fn with_included_merged(&self, base: &[usize]) -> Vec<usize> {
        let mut merged: BTreeSet<usize> = base.iter().copied().collect();
        merged.extend(self.included.iter().copied());
        merged.into_iter().collect()
    }

    /// Names for a column subset, in subset order.
    pub fn subset_names(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&i| self.names.get(i).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> FeatureSpace {
        FeatureSpace::new(vec![
            "age".into(),
            "race".into(),
            "priors".into(),
            "sex".into(),
            "length_of_stay".into(),
        ])
        .with_categorical([1, 3])
        .unwrap()
    }

    #[test]
    fn test_numeric_is_complement_of_categorical() {
        let s = space();
        assert_eq!(s.numeric(), vec![0, 2, 4]);
        assert_eq!(s.categorical(), vec![1, 3]);
        assert!(s.is_categorical(1));
        assert!(!s.is_categorical(0));
    }

    #[test]
    fn test_included_merge_is_sorted_and_deduplicated() {
        let s = space().with_included([3, 0]).unwrap();
        assert_eq!(s.with_included_merged(&[0, 2]), vec![0, 2, 3]);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let err = space().with_categorical([9]).unwrap_err();
        assert!(matches!(err, ScaffoldError::UnsupportedFeatureSpace(_)));
    }

    #[test]
    fn test_name_lookup() {
        let s = space();
        assert_eq!(s.index_of("priors"), Some(2));
        assert_eq!(s.indices_of(&["sex", "age"]).unwrap(), vec![3, 0]);
        assert!(s.indices_of(&["zip"]).is_err());
        assert_eq!(s.subset_names(&[4, 0]), vec!["length_of_stay", "age"]);
    }

    #[test]
    fn test_anonymous_names() {
        let s = FeatureSpace::anonymous(3);
        assert_eq!(s.names(), &["x0", "x1", "x2"]);
    }
}
