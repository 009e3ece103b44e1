//! Random train/hold-out partitioning.

use crate::error::{Result, ScaffoldError};
use rand::RngCore;
use rand::seq::SliceRandom;

/// Number of hold-out rows for `n` samples: `ceil(fraction * n)`.
pub fn holdout_size(n: usize, fraction: f64) -> usize {
    ((fraction * n as f64).ceil() as usize).min(n)
}

/// Shuffle `0..n` and cut it into `(train, holdout)` index sets.
///
/// Both partitions are guaranteed non-empty.
pub fn shuffled_partition(
    n: usize,
    fraction: f64,
    rng: &mut dyn RngCore,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(ScaffoldError::config(format!(
            "hold-out fraction must be strictly between 0 and 1 (got {fraction})"
        )));
    }
    let n_holdout = holdout_size(n, fraction);
    if n_holdout == 0 || n_holdout >= n {
        return Err(ScaffoldError::dataset(format!(
            "cannot split {n} rows with hold-out fraction {fraction}"
        )));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let holdout = indices.split_off(n - n_holdout);
    Ok((indices, holdout))
}
