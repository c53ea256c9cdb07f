//! Per-bucket aggregation methods.

use serde::{Deserialize, Serialize, Serializer};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{cell, Cell};

/// Signature of a user-supplied reduction.
pub type Reducer = dyn Fn(&[f64]) -> Option<f64> + Send + Sync;

/// A named user-supplied reduction over the values of one bucket.
#[derive(Clone)]
pub struct CustomAggregation {
    name: String,
    func: Arc<Reducer>,
}

impl CustomAggregation {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64]) -> Option<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, values: &[f64]) -> Option<f64> {
        (self.func)(values)
    }
}

impl fmt::Debug for CustomAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAggregation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// Only the name is serialized; functions cannot be restored from JSON.
impl Serialize for CustomAggregation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Reduction applied to all values of one bucket/column pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Mean,
    Sum,
    Max,
    Min,
    /// Sample standard deviation.
    Std,
    /// Sample variance.
    Var,
    Median,
    First,
    Last,
    /// Number of non-missing values.
    Count,
    #[serde(skip_deserializing)]
    Custom(CustomAggregation),
}

impl Aggregation {
    /// Wrap a user-supplied reduction.
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64]) -> Option<f64> + Send + Sync + 'static,
    {
        Aggregation::Custom(CustomAggregation::new(name, func))
    }

    pub fn name(&self) -> &str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Sum => "sum",
            Aggregation::Max => "max",
            Aggregation::Min => "min",
            Aggregation::Std => "std",
            Aggregation::Var => "var",
            Aggregation::Median => "median",
            Aggregation::First => "first",
            Aggregation::Last => "last",
            Aggregation::Count => "count",
            Aggregation::Custom(c) => c.name(),
        }
    }

    /// Reduce the non-missing values of one bucket, given in time order.
    ///
    /// An empty bucket sums and counts to zero; every other method yields a
    /// missing cell. NaN results are reported as missing.
    pub fn reduce(&self, values: &[f64]) -> Cell {
        if values.is_empty() {
            return match self {
                Aggregation::Sum | Aggregation::Count => Some(0.0),
                _ => None,
            };
        }

        let out = match self {
            Aggregation::Mean => values.iter().mean(),
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Std => values.iter().std_dev(),
            Aggregation::Var => values.iter().variance(),
            Aggregation::Median => Data::new(values.to_vec()).median(),
            Aggregation::First => values[0],
            Aggregation::Last => values[values.len() - 1],
            Aggregation::Count => values.len() as f64,
            Aggregation::Custom(c) => return c.call(values).and_then(cell),
        };
        cell(out)
    }
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Aggregation::Mean),
            "sum" => Ok(Aggregation::Sum),
            "max" => Ok(Aggregation::Max),
            "min" => Ok(Aggregation::Min),
            "std" => Ok(Aggregation::Std),
            "var" => Ok(Aggregation::Var),
            "median" => Ok(Aggregation::Median),
            "first" => Ok(Aggregation::First),
            "last" => Ok(Aggregation::Last),
            "count" => Ok(Aggregation::Count),
            other => Err(Error::config(format!("unknown aggregation method '{other}'"))),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregation applied to every value column, or chosen per column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregationSpec {
    Uniform(Aggregation),
    /// Only the mapped columns appear in the output.
    PerColumn(BTreeMap<String, Aggregation>),
}

impl AggregationSpec {
    /// Aggregation for a column, or `None` if the column is not aggregated.
    pub fn for_column(&self, name: &str) -> Option<&Aggregation> {
        match self {
            AggregationSpec::Uniform(agg) => Some(agg),
            AggregationSpec::PerColumn(map) => map.get(name),
        }
    }
}

impl Default for AggregationSpec {
    fn default() -> Self {
        AggregationSpec::Uniform(Aggregation::Mean)
    }
}

impl From<Aggregation> for AggregationSpec {
    fn from(agg: Aggregation) -> Self {
        AggregationSpec::Uniform(agg)
    }
}

impl<K: Into<String>> FromIterator<(K, Aggregation)> for AggregationSpec {
    fn from_iter<I: IntoIterator<Item = (K, Aggregation)>>(iter: I) -> Self {
        AggregationSpec::PerColumn(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
