//! Core types and configuration for the ICU time-series resampler.
//!
//! This crate provides shared types used across all other crates:
//! - Tabular data model (frames, index levels, columns, labels)
//! - Resampling frequency and aggregation methods
//! - Configuration structures
//! - Common error types

pub mod aggregation;
pub mod config;
pub mod error;
pub mod frequency;
pub mod types;

pub use aggregation::{Aggregation, AggregationSpec, CustomAggregation};
pub use config::{ErrorPolicy, IndexDetection, ResamplerConfig, ZeroPolicy};
pub use error::{Error, Result};
pub use frequency::Frequency;
pub use types::*;
