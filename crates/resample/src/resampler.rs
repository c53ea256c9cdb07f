//! Grouped time-series resampling transformer.
//!
//! Rows are partitioned by the grouping key, assigned to fixed-width buckets
//! on the datetime axis, and aggregated per bucket and column. Each group
//! gets a complete grid from its first to its last occupied bucket.

use icu_core::{
    Aggregation, AggregationSpec, Cell, Column, ColumnData, DatetimeValues, Error, ErrorPolicy,
    Frame, IndexDetection, IndexLevel, Label, LevelData, ResamplerConfig, Result,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

use crate::bucket::BucketGrid;

/// Outcome of a transform call.
#[derive(Debug)]
pub enum Transformed<T> {
    /// The input was resampled.
    Resampled(Frame),
    /// The input failed validation and was handed back untouched.
    Unchanged { input: T, reason: Error },
}

impl<T> Transformed<T> {
    pub fn is_resampled(&self) -> bool {
        matches!(self, Transformed::Resampled(_))
    }

    /// The resampled frame, if the transform ran.
    pub fn resampled(self) -> Option<Frame> {
        match self {
            Transformed::Resampled(frame) => Some(frame),
            Transformed::Unchanged { .. } => None,
        }
    }

    /// Why the input was left unchanged.
    pub fn reason(&self) -> Option<&Error> {
        match self {
            Transformed::Resampled(_) => None,
            Transformed::Unchanged { reason, .. } => Some(reason),
        }
    }
}

impl Transformed<Frame> {
    /// The resampled frame, or the untouched input.
    pub fn into_frame(self) -> Frame {
        match self {
            Transformed::Resampled(frame) => frame,
            Transformed::Unchanged { input, .. } => input,
        }
    }
}

/// Where the grouping key of each row comes from.
enum KeySource<'a> {
    Level(usize, &'a [Label]),
    LabelColumn(&'a str, &'a [Label]),
    NumericColumn(&'a str, &'a [Cell]),
}

impl KeySource<'_> {
    fn key(&self, row: usize) -> Option<Label> {
        match self {
            KeySource::Level(_, labels) | KeySource::LabelColumn(_, labels) => {
                Some(&labels[row]).filter(|l| !l.is_missing()).cloned()
            }
            KeySource::NumericColumn(_, cells) => cells[row].map(Label::from),
        }
    }

    fn column_name(&self) -> Option<&str> {
        match self {
            KeySource::Level(..) => None,
            KeySource::LabelColumn(name, _) | KeySource::NumericColumn(name, _) => Some(name),
        }
    }
}

/// A value column and the aggregation applied to it.
struct ValuePlan<'a> {
    name: &'a str,
    cells: &'a [Cell],
    aggregation: &'a Aggregation,
    zero_as_missing: bool,
}

/// Time-series resampler with a fit/transform lifecycle.
///
/// Configuration is fixed at construction; `fit` learns nothing and every
/// `transform` call is independent.
#[derive(Debug, Clone, Default)]
pub struct ResamplerTransformer {
    config: ResamplerConfig,
}

impl ResamplerTransformer {
    /// Create a transformer from configuration.
    pub fn new(config: ResamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResamplerConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut ResamplerConfig {
        &mut self.config
    }

    /// No-op fit. Returns the transformer unchanged.
    pub fn fit<X: ?Sized>(&self, _x: &X) -> &Self {
        self
    }

    /// Resample a frame.
    ///
    /// Validation failures are logged and then either returned as errors or
    /// reported as [`Transformed::Unchanged`], depending on the error policy.
    /// Other errors (unknown grouping key, non-numeric columns) are always
    /// returned.
    pub fn transform(&self, x: Frame) -> Result<Transformed<Frame>> {
        match self.time_axis(&x) {
            Ok(time_level) => Ok(Transformed::Resampled(self.resample(&x, time_level)?)),
            Err(reason) => self.reject(x, reason),
        }
    }

    /// Resample a frame given as JSON.
    ///
    /// Values that do not describe a frame fail the table-type check.
    pub fn transform_json(&self, x: Value) -> Result<Transformed<Value>> {
        let Some(object) = x.as_object() else {
            let reason = Error::input_type(format!("got a JSON {}", json_kind(&x)));
            return self.reject(x, reason);
        };
        if !object.contains_key("index") && !object.contains_key("columns") {
            let reason = Error::input_type("expected 'index' and/or 'columns' keys");
            return self.reject(x, reason);
        }
        let frame = match serde_json::from_value::<Frame>(x.clone()) {
            Ok(frame) => frame,
            Err(e) => return self.reject(x, Error::input_type(e.to_string())),
        };
        Ok(match self.transform(frame)? {
            Transformed::Resampled(frame) => Transformed::Resampled(frame),
            Transformed::Unchanged { reason, .. } => Transformed::Unchanged { input: x, reason },
        })
    }

    /// Apply the error policy to a validation failure.
    ///
    /// Errors that are not validation failures are returned as is.
    pub fn reject<T>(&self, input: T, reason: Error) -> Result<Transformed<T>> {
        if !reason.is_validation() {
            return Err(reason);
        }
        error!("ResamplerTransformer: {}", reason);
        match self.config.error_policy {
            ErrorPolicy::Raise => Err(reason),
            ErrorPolicy::Ignore => Ok(Transformed::Unchanged { input, reason }),
        }
    }

    /// Names of the value columns `transform` emits for the given input
    /// columns.
    pub fn feature_names_out<S: AsRef<str>>(&self, input_features: &[S]) -> Vec<String> {
        input_features
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| *name != self.config.groupby)
            .filter(|name| self.config.method.for_column(name).is_some())
            .map(str::to_string)
            .collect()
    }

    /// Locate the datetime index level.
    fn time_axis(&self, x: &Frame) -> Result<usize> {
        let index = x.index();
        let found = match self.config.index_detection {
            IndexDetection::SingleLevel => {
                (index.nlevels() == 1 && index.levels()[0].is_datetime()).then_some(0)
            }
            IndexDetection::AnyLevel => index.datetime_position(),
        };
        found.ok_or_else(|| Error::index_type(format!("index levels {:?}", index.names())))
    }

    fn key_source<'a>(&self, x: &'a Frame, time_level: usize) -> Result<KeySource<'a>> {
        let name = self.config.groupby.as_str();

        if let Some(pos) = x.index().position(name) {
            let level = &x.index().levels()[pos];
            return match &level.data {
                LevelData::Labels(labels) => Ok(KeySource::Level(pos, labels)),
                LevelData::Datetime(_) if pos == time_level => Err(Error::data(format!(
                    "grouping key '{name}' is the datetime axis"
                ))),
                LevelData::Datetime(_) => Err(Error::data(format!(
                    "grouping key '{name}' is a datetime level"
                ))),
            };
        }

        let Some(column) = x.column(name) else {
            return Err(Error::missing_column(name));
        };
        Ok(match &column.data {
            ColumnData::Labels(labels) => KeySource::LabelColumn(&column.name, labels),
            ColumnData::Numeric(cells) => KeySource::NumericColumn(&column.name, cells),
        })
    }

    fn value_plan<'a>(
        &'a self,
        x: &'a Frame,
        key_column: Option<&str>,
    ) -> Result<Vec<ValuePlan<'a>>> {
        if let AggregationSpec::PerColumn(map) = &self.config.method {
            for name in map.keys() {
                if x.column(name).is_none() || key_column == Some(name.as_str()) {
                    return Err(Error::missing_column(name.clone()));
                }
            }
        }

        let mut plan = Vec::new();
        for column in x.columns() {
            if key_column == Some(column.name.as_str()) {
                continue;
            }
            let Some(aggregation) = self.config.method.for_column(&column.name) else {
                continue;
            };
            let cells = column
                .as_numeric()
                .ok_or_else(|| Error::non_numeric(column.name.clone()))?;
            plan.push(ValuePlan {
                name: &column.name,
                cells,
                aggregation,
                zero_as_missing: self.config.zero_policy.applies_to(&column.name),
            });
        }
        Ok(plan)
    }

    fn resample(&self, x: &Frame, time_level: usize) -> Result<Frame> {
        let levels = x.index().levels();
        let time = &levels[time_level];
        let times: &DatetimeValues = time
            .as_datetime()
            .ok_or_else(|| Error::index_type(format!("level '{}' is not datetime", time.name)))?;

        let keys = self.key_source(x, time_level)?;
        let plan = self.value_plan(x, keys.column_name())?;

        let key_level = match &keys {
            KeySource::Level(pos, _) => Some(*pos),
            _ => None,
        };
        for (pos, level) in levels.iter().enumerate() {
            if pos != time_level && Some(pos) != key_level {
                warn!("ResamplerTransformer: dropping index level '{}'", level.name);
            }
        }

        // Partition rows by key; rows without a key are dropped.
        let mut groups: BTreeMap<Label, Vec<usize>> = BTreeMap::new();
        for row in 0..x.len() {
            if let Some(key) = keys.key(row) {
                groups.entry(key).or_default().push(row);
            }
        }

        let offset_ms = times.offset_ms();
        let mut out_keys = Vec::new();
        let mut out_ts = Vec::new();
        let mut out_values: Vec<Vec<Cell>> = vec![Vec::new(); plan.len()];
        let mut scratch = Vec::new();

        for (key, mut rows) in groups {
            rows.sort_by_key(|&row| times.ts_ms[row]);

            let mut grid = BucketGrid::new(self.config.frequency);
            for &row in &rows {
                grid.add_row(times.local_ms(row), row);
            }

            for (start, bucket_rows) in grid.complete() {
                out_keys.push(key.clone());
                out_ts.push(start - offset_ms);

                for (value, out) in plan.iter().zip(out_values.iter_mut()) {
                    scratch.clear();
                    scratch.extend(bucket_rows.iter().filter_map(|&row| value.cells[row]));
                    out.push(self.finish_cell(value, value.aggregation.reduce(&scratch)));
                }
            }
        }

        debug!(
            rows_in = x.len(),
            rows_out = out_ts.len(),
            frequency = %self.config.frequency,
            "ResamplerTransformer: resampled"
        );

        let out_time = DatetimeValues {
            ts_ms: out_ts,
            utc_offset_secs: times.utc_offset_secs,
        };
        let columns = plan
            .iter()
            .zip(out_values)
            .map(|(value, cells)| Column::numeric(value.name, cells))
            .collect();

        Frame::new(
            vec![
                IndexLevel::labels(self.config.groupby.clone(), out_keys),
                IndexLevel::datetime(time.name.clone(), out_time),
            ],
            columns,
        )
    }

    /// Zero coercion followed by default fill.
    fn finish_cell(&self, value: &ValuePlan<'_>, cell: Cell) -> Cell {
        let cell = match cell {
            Some(v) if value.zero_as_missing && v == 0.0 => None,
            other => other,
        };
        cell.or(self.config.default_value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
