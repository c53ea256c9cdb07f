//! Grouped time-series resampling.
//!
//! This crate handles:
//! - Fixed-width bucketing of each group's rows
//! - Per-bucket aggregation, zero coercion and default fill
//! - The fit/transform estimator lifecycle

pub mod bucket;
pub mod estimator;
pub mod resampler;

pub use bucket::BucketGrid;
pub use estimator::Transformer;
pub use resampler::{ResamplerTransformer, Transformed};
