//! Clustering used to build substitution backgrounds.

pub mod kmeans;

pub use kmeans::KMeansSummary;
