//! Feature-space bookkeeping for detector training and inference.

pub mod space;

pub use space::FeatureSpace;
