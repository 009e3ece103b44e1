//! K-means summaries of a dataset, used as the substitution background.
//!
//! Lloyd's algorithm with k-means++ seeding. With `snap_to_data` every center
//! coordinate is replaced by the closest value observed in that column, so
//! substituted values are always values a real row could carry.

use crate::data::row_key;
use crate::error::{Result, ScaffoldError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, RngCore};
use std::collections::HashSet;

/// K-means background summarizer.
#[derive(Debug, Clone)]
pub struct KMeansSummary {
    n_clusters: usize,
    max_iter: usize,
    tol: f64,
    snap_to_data: bool,
}

impl Default for KMeansSummary {
    fn default() -> Self {
        Self::new(10)
    }
}

impl KMeansSummary {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            snap_to_data: true,
        }
    }

    pub fn with_snap_to_data(mut self, snap: bool) -> Self {
        self.snap_to_data = snap;
        self
    }

    /// Cluster `x` and return one center per row of the result.
    ///
    /// The cluster count is clamped to the number of distinct rows.
    pub fn summarize(&self, x: ArrayView2<'_, f64>, rng: &mut dyn RngCore) -> Result<Array2<f64>> {
        if self.n_clusters == 0 {
            return Err(ScaffoldError::config("k-means needs at least one cluster"));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ScaffoldError::dataset("cannot summarize an empty matrix"));
        }

        let distinct: HashSet<Vec<u64>> = x.rows().into_iter().map(row_key).collect();
        let k = self.n_clusters.min(distinct.len());
        if k < self.n_clusters {
            tracing::debug!(
                requested = self.n_clusters,
                k,
                "clamped cluster count to distinct rows"
            );
        }

        let mut centers = self.init_plus_plus(x, k, rng);
        let tol = self.tol * mean_variance(x).max(f64::MIN_POSITIVE);
        let mut iterations = 0;
        for _ in 0..self.max_iter {
            iterations += 1;
            let assignment = assign(x, centers.view());
            let mut sums = Array2::<f64>::zeros(centers.dim());
            let mut counts = vec![0usize; k];
            for (row, &c) in x.rows().into_iter().zip(&assignment) {
                let mut sum = sums.row_mut(c);
                sum += &row;
                counts[c] += 1;
            }
            let mut shift = 0.0;
            for c in 0..k {
                // Empty clusters keep their previous center.
                if counts[c] == 0 {
                    continue;
                }
                let updated = sums.row(c).mapv(|v| v / counts[c] as f64);
                shift += squared_distance(updated.view(), centers.row(c));
                centers.row_mut(c).assign(&updated);
            }
            if shift <= tol {
                break;
            }
        }
        tracing::debug!(k, iterations, "k-means converged");

        if self.snap_to_data {
            snap_to_observed(x, &mut centers);
        }
        Ok(centers)
    }

    fn init_plus_plus(&self, x: ArrayView2<'_, f64>, k: usize, rng: &mut dyn RngCore) -> Array2<f64> {
        let n = x.nrows();
        let mut centers = Array2::zeros((k, x.ncols()));
        centers.row_mut(0).assign(&x.row(rng.gen_range(0..n)));
        let mut closest: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| squared_distance(row, centers.row(0)))
            .collect();

        for c in 1..k {
            let total: f64 = closest.sum();
            let chosen = if total > 0.0 {
                let mut target = rng.gen_range(0.0..total);
                let mut pick = n - 1;
                for (i, &d) in closest.iter().enumerate() {
                    if target < d {
                        pick = i;
                        break;
                    }
                    target -= d;
                }
                pick
            } else {
                rng.gen_range(0..n)
            };
            centers.row_mut(c).assign(&x.row(chosen));
            for (i, row) in x.rows().into_iter().enumerate() {
                let d = squared_distance(row, centers.row(c));
                if d < closest[i] {
                    closest[i] = d;
                }
            }
        }
        centers
    }
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn assign(x: ArrayView2<'_, f64>, centers: ArrayView2<'_, f64>) -> Vec<usize> {
    x.rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (c, center) in centers.rows().into_iter().enumerate() {
                let d = squared_distance(row, center);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            best
        })
        .collect()
}

fn mean_variance(x: ArrayView2<'_, f64>) -> f64 {
    x.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

fn snap_to_observed(x: ArrayView2<'_, f64>, centers: &mut Array2<f64>) {
    for mut center in centers.rows_mut() {
        for (j, value) in center.iter_mut().enumerate() {
            let column = x.column(j);
            let mut nearest = column[0];
            for &candidate in column.iter() {
                if (candidate - *value).abs() < (nearest - *value).abs() {
                    nearest = candidate;
                }
            }
            *value = nearest;
        }
    }
}
