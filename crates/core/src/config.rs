//! Configuration structures for the resampler.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::aggregation::AggregationSpec;
use crate::error::Result;
use crate::frequency::Frequency;

/// What to do when the input fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log and return an error.
    #[default]
    Raise,
    /// Log and hand the input back unchanged.
    Ignore,
}

/// How the datetime axis is located in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexDetection {
    /// The index must consist of exactly one datetime level.
    SingleLevel,
    /// Any level of a (possibly multi-level) index may be the datetime axis.
    #[default]
    AnyLevel,
}

/// Treatment of aggregated cells that are exactly zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroPolicy {
    /// Replace zero aggregates with missing before default fill.
    pub zero_as_missing: bool,
    /// Columns where zero is a legitimate value and is kept.
    pub exempt_columns: BTreeSet<String>,
}

impl ZeroPolicy {
    /// Keep zeros everywhere.
    pub fn disabled() -> Self {
        Self {
            zero_as_missing: false,
            exempt_columns: BTreeSet::new(),
        }
    }

    /// Keep zeros in `column`.
    pub fn exempt(mut self, column: impl Into<String>) -> Self {
        self.exempt_columns.insert(column.into());
        self
    }

    /// Whether zeros in `column` become missing.
    pub fn applies_to(&self, column: &str) -> bool {
        self.zero_as_missing && !self.exempt_columns.contains(column)
    }
}

impl Default for ZeroPolicy {
    fn default() -> Self {
        Self {
            zero_as_missing: true,
            exempt_columns: BTreeSet::new(),
        }
    }
}

/// Resampler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResamplerConfig {
    /// Bucket width.
    pub frequency: Frequency,
    /// Name of the grouping key (index level or column).
    pub groupby: String,
    /// Aggregation per bucket.
    pub method: AggregationSpec,
    /// Fill value for missing cells after aggregation.
    pub default_value: Option<f64>,
    /// Behaviour on validation failure.
    pub error_policy: ErrorPolicy,
    /// Datetime index detection rule.
    pub index_detection: IndexDetection,
    /// Zero/missing coercion.
    pub zero_policy: ZeroPolicy,
}

impl Default for ResamplerConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::HOUR,
            groupby: "stay_id".to_string(),
            method: AggregationSpec::default(),
            default_value: None,
            error_policy: ErrorPolicy::Raise,
            index_detection: IndexDetection::AnyLevel,
            zero_policy: ZeroPolicy::default(),
        }
    }
}

impl ResamplerConfig {
    /// Lenient single-index behaviour: invalid input is handed back, missing
    /// cells are filled with 0.0 and zeros are kept.
    pub fn legacy() -> Self {
        Self {
            default_value: Some(0.0),
            error_policy: ErrorPolicy::Ignore,
            index_detection: IndexDetection::SingleLevel,
            zero_policy: ZeroPolicy::disabled(),
            ..Self::default()
        }
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_groupby(mut self, groupby: impl Into<String>) -> Self {
        self.groupby = groupby.into();
        self
    }

    pub fn with_method(mut self, method: impl Into<AggregationSpec>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_default_value(mut self, default_value: Option<f64>) -> Self {
        self.default_value = default_value;
        self
    }

    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn with_index_detection(mut self, index_detection: IndexDetection) -> Self {
        self.index_detection = index_detection;
        self
    }

    pub fn with_zero_policy(mut self, zero_policy: ZeroPolicy) -> Self {
        self.zero_policy = zero_policy;
        self
    }

    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
