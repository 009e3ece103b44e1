//! Data boundary: frames, CSV I/O, and train/hold-out partitioning.

pub mod csv;
pub mod frame;
pub mod split;

pub use frame::{Frame, NumericTable, TrainingInput};

use ndarray::ArrayView1;

/// Exact-value key for a row; `-0.0` and `0.0` compare equal.
pub fn row_key(row: ArrayView1<'_, f64>) -> Vec<u64> {
    row.iter()
        .map(|&v| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() })
        .collect()
}
