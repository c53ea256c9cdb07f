//! Core data types for the resampler.
//!
//! A [`Frame`] is a small columnar table: an [`Index`] made of named levels
//! plus named value [`Column`]s, all of the same length.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// A single numeric cell. `None` marks missing data.
pub type Cell = Option<f64>;

/// Convert a raw float into a cell, treating NaN as missing.
#[inline]
pub fn cell(value: f64) -> Cell {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

/// Floor a timestamp to the start of its bucket.
///
/// Buckets are `width_ms` wide and aligned to `origin_ms`.
#[inline]
pub fn ts_to_bucket(ts_ms: TimestampMs, width_ms: i64, origin_ms: TimestampMs) -> TimestampMs {
    origin_ms + (ts_ms - origin_ms).div_euclid(width_ms) * width_ms
}

/// A grouping key value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl Label {
    /// NaN keys mark rows without a group.
    pub fn is_missing(&self) -> bool {
        matches!(self, Label::Float(v) if v.is_nan())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(v) => write!(f, "{v}"),
            Label::Float(v) => write!(f, "{}", v.0),
            Label::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Label {
    fn from(v: i64) -> Self {
        Label::Int(v)
    }
}

impl From<f64> for Label {
    fn from(v: f64) -> Self {
        Label::Float(OrderedFloat(v))
    }
}

impl From<&str> for Label {
    fn from(v: &str) -> Self {
        Label::Str(v.to_string())
    }
}

impl From<String> for Label {
    fn from(v: String) -> Self {
        Label::Str(v)
    }
}

/// Timestamps of a datetime index level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatetimeValues {
    /// Instants in milliseconds since the Unix epoch.
    pub ts_ms: Vec<TimestampMs>,
    /// Fixed UTC offset of timezone-aware data. `None` for naive timestamps,
    /// whose wall-clock time is stored as if it were UTC.
    #[serde(default)]
    pub utc_offset_secs: Option<i32>,
}

impl DatetimeValues {
    /// Timezone-naive timestamps.
    pub fn naive(ts_ms: Vec<TimestampMs>) -> Self {
        Self {
            ts_ms,
            utc_offset_secs: None,
        }
    }

    /// Timezone-aware timestamps sharing one fixed offset.
    pub fn aware(ts_ms: Vec<TimestampMs>, offset: FixedOffset) -> Self {
        Self {
            ts_ms,
            utc_offset_secs: Some(offset.local_minus_utc()),
        }
    }

    /// Build from naive chrono datetimes.
    pub fn from_naive(values: &[NaiveDateTime]) -> Self {
        Self::naive(values.iter().map(|v| v.and_utc().timestamp_millis()).collect())
    }

    /// Build from aware chrono datetimes. All values must share one offset.
    pub fn from_aware(values: &[DateTime<FixedOffset>]) -> Result<Self> {
        let Some(first) = values.first() else {
            return Err(Error::data("cannot infer a UTC offset from an empty datetime level"));
        };
        let offset = *first.offset();
        if values.iter().any(|v| *v.offset() != offset) {
            return Err(Error::data("datetime level mixes UTC offsets"));
        }
        Ok(Self::aware(
            values.iter().map(|v| v.timestamp_millis()).collect(),
            offset,
        ))
    }

    pub fn len(&self) -> usize {
        self.ts_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts_ms.is_empty()
    }

    /// Whether the timestamps carry a timezone.
    pub fn is_aware(&self) -> bool {
        self.utc_offset_secs.is_some()
    }

    /// Offset in milliseconds between wall-clock time and UTC.
    #[inline]
    pub fn offset_ms(&self) -> i64 {
        self.utc_offset_secs.map_or(0, |s| i64::from(s) * 1000)
    }

    /// The fixed offset, if any.
    pub fn offset(&self) -> Option<FixedOffset> {
        self.utc_offset_secs.and_then(FixedOffset::east_opt)
    }

    /// Wall-clock milliseconds of row `i`, used for bucketing.
    #[inline]
    pub fn local_ms(&self, i: usize) -> TimestampMs {
        self.ts_ms[i] + self.offset_ms()
    }

    /// Naive wall-clock datetime of row `i`.
    pub fn naive_datetime(&self, i: usize) -> Option<NaiveDateTime> {
        DateTime::from_timestamp_millis(self.local_ms(i)).map(|d| d.naive_utc())
    }

    /// Aware datetime of row `i`. `None` for naive data.
    pub fn aware_datetime(&self, i: usize) -> Option<DateTime<FixedOffset>> {
        let offset = self.offset()?;
        DateTime::from_timestamp_millis(self.ts_ms[i]).map(|d| d.with_timezone(&offset))
    }
}

/// Values of one index level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelData {
    Labels(Vec<Label>),
    Datetime(DatetimeValues),
}

/// A named index level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexLevel {
    pub name: String,
    pub data: LevelData,
}

impl IndexLevel {
    /// Create a label level.
    pub fn labels(name: impl Into<String>, values: Vec<Label>) -> Self {
        Self {
            name: name.into(),
            data: LevelData::Labels(values),
        }
    }

    /// Create a datetime level.
    pub fn datetime(name: impl Into<String>, values: DatetimeValues) -> Self {
        Self {
            name: name.into(),
            data: LevelData::Datetime(values),
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            LevelData::Labels(v) => v.len(),
            LevelData::Datetime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this level holds timestamps.
    pub fn is_datetime(&self) -> bool {
        matches!(self.data, LevelData::Datetime(_))
    }

    pub fn as_datetime(&self) -> Option<&DatetimeValues> {
        match &self.data {
            LevelData::Datetime(v) => Some(v),
            LevelData::Labels(_) => None,
        }
    }

    pub fn as_labels(&self) -> Option<&[Label]> {
        match &self.data {
            LevelData::Labels(v) => Some(v),
            LevelData::Datetime(_) => None,
        }
    }
}

/// Row index made of zero or more levels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    levels: Vec<IndexLevel>,
}

impl Index {
    pub fn levels(&self) -> &[IndexLevel] {
        &self.levels
    }

    pub fn nlevels(&self) -> usize {
        self.levels.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.levels.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn level(&self, name: &str) -> Option<&IndexLevel> {
        self.levels.iter().find(|l| l.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.levels.iter().position(|l| l.name == name)
    }

    /// Position of the first datetime level.
    pub fn datetime_position(&self) -> Option<usize> {
        self.levels.iter().position(IndexLevel::is_datetime)
    }
}

/// Values of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnData {
    Numeric(Vec<Cell>),
    Labels(Vec<Label>),
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    /// Create a numeric column. NaN values become missing.
    pub fn numeric(name: impl Into<String>, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values.into_iter().map(|v| v.and_then(cell)).collect()),
        }
    }

    /// Create a label column.
    pub fn labels(name: impl Into<String>, values: Vec<Label>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Labels(values),
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Labels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&[Cell]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            ColumnData::Labels(_) => None,
        }
    }
}

/// A table of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FrameParts", into = "FrameParts")]
pub struct Frame {
    index: Index,
    columns: Vec<Column>,
    len: usize,
}

/// Serialized layout of a [`Frame`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameParts {
    #[serde(default)]
    pub index: Vec<IndexLevel>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Frame {
    /// Create a frame, checking that lengths agree and names are unique.
    pub fn new(levels: Vec<IndexLevel>, columns: Vec<Column>) -> Result<Self> {
        let len = levels
            .first()
            .map(IndexLevel::len)
            .or_else(|| columns.first().map(Column::len))
            .unwrap_or(0);

        let mut seen = HashSet::new();
        let named_lens = levels
            .iter()
            .map(|l| (l.name.as_str(), l.len()))
            .chain(columns.iter().map(|c| (c.name.as_str(), c.len())));
        for (name, n) in named_lens {
            if n != len {
                return Err(Error::data(format!(
                    "'{name}' has {n} rows, expected {len}"
                )));
            }
            if !seen.insert(name) {
                return Err(Error::data(format!("duplicate name '{name}'")));
            }
        }

        Ok(Self {
            index: Index { levels },
            columns,
            len,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Numeric values of a column.
    pub fn numeric(&self, name: &str) -> Option<&[Cell]> {
        self.column(name).and_then(Column::as_numeric)
    }

    pub fn level(&self, name: &str) -> Option<&IndexLevel> {
        self.index.level(name)
    }

    /// Split into index levels and columns.
    pub fn into_parts(self) -> (Vec<IndexLevel>, Vec<Column>) {
        (self.index.levels, self.columns)
    }
}

impl TryFrom<FrameParts> for Frame {
    type Error = Error;

    fn try_from(parts: FrameParts) -> Result<Self> {
        Frame::new(parts.index, parts.columns)
    }
}

impl From<Frame> for FrameParts {
    fn from(frame: Frame) -> Self {
        let (index, columns) = frame.into_parts();
        FrameParts { index, columns }
    }
}
