//! PyO3 bindings for the ICU time-series resampler.
//!
//! Exposes the resampler to Python with a scikit-learn style surface:
//! - Keyword-argument construction, `get_params` and `set_params`
//! - No-op `fit`, resampling `transform`
//! - `init_logging` to route `tracing` output to stderr
//!
//! Tables cross the boundary as
//! `{"index": {name: [...]}, "columns": {name: [...]}}`.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDateTime, PyDict, PyList};
use std::collections::BTreeMap;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use icu_core::{
    Aggregation, AggregationSpec, Cell, Column, ColumnData, DatetimeValues, Error as RustError,
    ErrorPolicy, Frame, IndexLevel, Label, LevelData, ResamplerConfig, ZeroPolicy,
};
use icu_resample::{ResamplerTransformer, Transformed};

// ============================================================================
// Error and Parameter Conversion
// ============================================================================

fn to_py_err(err: RustError) -> PyErr {
    match err {
        RustError::MissingColumn(name) => PyKeyError::new_err(name),
        other => PyValueError::new_err(other.to_string()),
    }
}

fn aggregation_from_py(obj: &Bound<'_, PyAny>) -> PyResult<Aggregation> {
    if let Ok(name) = obj.extract::<String>() {
        return name.parse().map_err(to_py_err);
    }
    if !obj.is_callable() {
        return Err(PyValueError::new_err(
            "method must be a string, a callable or a dict of those",
        ));
    }

    let name = obj
        .getattr("__name__")
        .and_then(|n| n.extract::<String>())
        .unwrap_or_else(|_| "custom".to_string());
    let func = obj.clone().unbind();
    let label = name.clone();
    Ok(Aggregation::custom(name, move |values| {
        Python::with_gil(|py| {
            let result = func
                .call1(py, (values.to_vec(),))
                .and_then(|r| r.extract::<Option<f64>>(py));
            match result {
                Ok(value) => value,
                Err(e) => {
                    warn!("ResamplerTransformer: aggregation '{}' failed: {}", label, e);
                    None
                }
            }
        })
    }))
}

fn method_from_py(obj: Option<&Bound<'_, PyAny>>) -> PyResult<AggregationSpec> {
    let Some(obj) = obj.filter(|o| !o.is_none()) else {
        return Ok(AggregationSpec::default());
    };
    if let Ok(dict) = obj.downcast::<PyDict>() {
        let mut map = BTreeMap::new();
        for (column, method) in dict.iter() {
            map.insert(column.extract::<String>()?, aggregation_from_py(&method)?);
        }
        return Ok(AggregationSpec::PerColumn(map));
    }
    Ok(AggregationSpec::Uniform(aggregation_from_py(obj)?))
}

// ============================================================================
// Table Conversion
// ============================================================================

fn items_of<'py>(
    values: &Bound<'py, PyAny>,
    name: &str,
) -> Result<Vec<Bound<'py, PyAny>>, RustError> {
    values
        .iter()
        .and_then(|it| it.collect::<PyResult<Vec<_>>>())
        .map_err(|_| RustError::input_type(format!("'{name}' is not a sequence")))
}

fn label_from_py(value: &Bound<'_, PyAny>, name: &str) -> Result<Label, RustError> {
    // Missing keys; the resampler drops their rows
    if value.is_none() {
        return Ok(Label::from(f64::NAN));
    }
    if let Ok(v) = value.extract::<i64>() {
        return Ok(Label::Int(v));
    }
    if let Ok(v) = value.extract::<f64>() {
        return Ok(Label::from(v));
    }
    if let Ok(v) = value.extract::<String>() {
        return Ok(Label::Str(v));
    }
    Err(RustError::input_type(format!(
        "unsupported value in '{name}': {value}"
    )))
}

fn datetimes_from_py(
    items: &[Bound<'_, PyAny>],
    name: &str,
) -> Result<DatetimeValues, RustError> {
    let aware: PyResult<Vec<DateTime<FixedOffset>>> = items.iter().map(|v| v.extract()).collect();
    if let Ok(aware) = aware {
        return DatetimeValues::from_aware(&aware)
            .map_err(|e| RustError::input_type(format!("'{name}': {e}")));
    }

    let naive: Vec<NaiveDateTime> = items
        .iter()
        .map(|v| v.extract())
        .collect::<PyResult<_>>()
        .map_err(|_| RustError::input_type(format!("'{name}' mixes naive and aware datetimes")))?;
    Ok(DatetimeValues::from_naive(&naive))
}

fn level_from_py(name: String, values: &Bound<'_, PyAny>) -> Result<IndexLevel, RustError> {
    let items = items_of(values, &name)?;
    let is_datetime = !items.is_empty() && items.iter().all(|v| v.is_instance_of::<PyDateTime>());

    if is_datetime {
        let values = datetimes_from_py(&items, &name)?;
        return Ok(IndexLevel::datetime(name, values));
    }
    let labels = items
        .iter()
        .map(|v| label_from_py(v, &name))
        .collect::<Result<_, _>>()?;
    Ok(IndexLevel::labels(name, labels))
}

fn column_from_py(name: String, values: &Bound<'_, PyAny>) -> Result<Column, RustError> {
    let items = items_of(values, &name)?;

    let numeric: Option<Vec<Cell>> = items
        .iter()
        .map(|v| {
            if v.is_none() {
                Some(None)
            } else {
                v.extract::<f64>().ok().map(Some)
            }
        })
        .collect();
    if let Some(cells) = numeric {
        return Ok(Column::numeric(name, cells));
    }

    let labels = items
        .iter()
        .map(|v| label_from_py(v, &name))
        .collect::<Result<_, _>>()?;
    Ok(Column::labels(name, labels))
}

fn section<'py>(
    table: &Bound<'py, PyDict>,
    key: &str,
) -> Result<Option<Bound<'py, PyAny>>, RustError> {
    table
        .get_item(key)
        .map_err(|e| RustError::input_type(e.to_string()))
}

fn frame_from_py(x: &Bound<'_, PyAny>) -> Result<Frame, RustError> {
    let table = x
        .downcast::<PyDict>()
        .map_err(|_| RustError::input_type(format!("got {}", x.get_type())))?;

    let index = section(table, "index")?;
    let columns = section(table, "columns")?;
    if index.is_none() && columns.is_none() {
        return Err(RustError::input_type("expected 'index' and/or 'columns' keys"));
    }

    let mut levels = Vec::new();
    if let Some(index) = index {
        let index = index
            .downcast::<PyDict>()
            .map_err(|_| RustError::input_type("'index' must be a dict"))?;
        for (name, values) in index.iter() {
            let name = name
                .extract::<String>()
                .map_err(|_| RustError::input_type("index level names must be strings"))?;
            levels.push(level_from_py(name, &values)?);
        }
    }

    let mut value_columns = Vec::new();
    if let Some(columns) = columns {
        let columns = columns
            .downcast::<PyDict>()
            .map_err(|_| RustError::input_type("'columns' must be a dict"))?;
        for (name, values) in columns.iter() {
            let name = name
                .extract::<String>()
                .map_err(|_| RustError::input_type("column names must be strings"))?;
            value_columns.push(column_from_py(name, &values)?);
        }
    }

    Frame::new(levels, value_columns).map_err(|e| RustError::input_type(e.to_string()))
}

fn label_to_py(py: Python<'_>, label: &Label) -> PyObject {
    match label {
        Label::Int(v) => v.into_py(py),
        Label::Float(v) => v.0.into_py(py),
        Label::Str(v) => v.as_str().into_py(py),
    }
}

fn datetimes_to_py<'py>(py: Python<'py>, values: &DatetimeValues) -> PyResult<Bound<'py, PyList>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let obj = if values.is_aware() {
            values.aware_datetime(i).map(|d| d.to_object(py))
        } else {
            values.naive_datetime(i).map(|d| d.to_object(py))
        };
        out.push(obj.ok_or_else(|| PyValueError::new_err("timestamp out of range"))?);
    }
    Ok(PyList::new_bound(py, out))
}

fn frame_to_py(py: Python<'_>, frame: &Frame) -> PyResult<PyObject> {
    let index = PyDict::new_bound(py);
    for level in frame.index().levels() {
        let values = match &level.data {
            LevelData::Labels(labels) => {
                PyList::new_bound(py, labels.iter().map(|l| label_to_py(py, l)))
            }
            LevelData::Datetime(values) => datetimes_to_py(py, values)?,
        };
        index.set_item(&level.name, values)?;
    }

    let columns = PyDict::new_bound(py);
    for column in frame.columns() {
        let values = match &column.data {
            ColumnData::Numeric(cells) => PyList::new_bound(py, cells.iter()),
            ColumnData::Labels(labels) => {
                PyList::new_bound(py, labels.iter().map(|l| label_to_py(py, l)))
            }
        };
        columns.set_item(&column.name, values)?;
    }

    let table = PyDict::new_bound(py);
    table.set_item("index", index)?;
    table.set_item("columns", columns)?;
    Ok(table.into_any().unbind())
}

// ============================================================================
// Python-exposed Transformer
// ============================================================================

/// Time-series resampler for grouped, timestamped tables.
#[pyclass(name = "ResamplerTransformer")]
pub struct PyResamplerTransformer {
    inner: ResamplerTransformer,
    /// Constructor arguments as given, for `get_params`.
    frequency: String,
    method: Option<PyObject>,
    error: String,
}

#[pymethods]
impl PyResamplerTransformer {
    #[new]
    #[pyo3(signature = (
        frequency = "1H",
        groupby = "stay_id",
        method = None,
        default_value = None,
        error = "raise",
        zero_as_missing = true,
        keep_zero_columns = None,
    ))]
    fn new(
        frequency: &str,
        groupby: &str,
        method: Option<&Bound<'_, PyAny>>,
        default_value: Option<f64>,
        error: &str,
        zero_as_missing: bool,
        keep_zero_columns: Option<Vec<String>>,
    ) -> PyResult<Self> {
        let error_policy = match error {
            "raise" => ErrorPolicy::Raise,
            "ignore" => ErrorPolicy::Ignore,
            other => {
                return Err(PyValueError::new_err(format!(
                    "error must be 'raise' or 'ignore', got '{other}'"
                )))
            }
        };

        let mut zero_policy = if zero_as_missing {
            ZeroPolicy::default()
        } else {
            ZeroPolicy::disabled()
        };
        for column in keep_zero_columns.unwrap_or_default() {
            zero_policy = zero_policy.exempt(column);
        }

        let config = ResamplerConfig::default()
            .with_frequency(frequency.parse().map_err(to_py_err)?)
            .with_groupby(groupby)
            .with_method(method_from_py(method)?)
            .with_default_value(default_value)
            .with_error_policy(error_policy)
            .with_zero_policy(zero_policy);

        Ok(PyResamplerTransformer {
            inner: ResamplerTransformer::new(config),
            frequency: frequency.to_string(),
            method: method.filter(|m| !m.is_none()).map(|m| m.clone().unbind()),
            error: error.to_string(),
        })
    }

    /// Constructor parameters by name.
    #[pyo3(signature = (deep = true))]
    fn get_params<'py>(&self, py: Python<'py>, deep: bool) -> PyResult<Bound<'py, PyDict>> {
        let _ = deep;
        let config = self.inner.config();
        let params = PyDict::new_bound(py);
        params.set_item("frequency", &self.frequency)?;
        params.set_item("groupby", &config.groupby)?;
        params.set_item("method", self.method.as_ref().map(|m| m.clone_ref(py)))?;
        params.set_item("default_value", config.default_value)?;
        params.set_item("error", &self.error)?;
        params.set_item("zero_as_missing", config.zero_policy.zero_as_missing)?;
        params.set_item(
            "keep_zero_columns",
            config.zero_policy.exempt_columns.iter().collect::<Vec<_>>(),
        )?;
        Ok(params)
    }

    /// Update constructor parameters by name. Returns self.
    ///
    /// Unknown names raise `ValueError` and leave the transformer unchanged.
    #[pyo3(signature = (**params))]
    fn set_params<'py>(
        mut slf: PyRefMut<'py, Self>,
        params: Option<&Bound<'py, PyDict>>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        let merged = slf.get_params(slf.py(), true)?;
        if let Some(params) = params {
            for (name, value) in params.iter() {
                if !merged.contains(&name)? {
                    return Err(PyValueError::new_err(format!(
                        "invalid parameter '{name}' for ResamplerTransformer"
                    )));
                }
                merged.set_item(name, value)?;
            }
        }
        *slf = Self::from_params(&merged)?;
        Ok(slf)
    }

    /// Value columns produced for the given input columns.
    #[pyo3(signature = (input_features = None))]
    fn get_feature_names_out(&self, input_features: Option<Vec<String>>) -> PyResult<Vec<String>> {
        let Some(input_features) = input_features else {
            return Err(PyValueError::new_err(
                "input_features is required: fit does not record column names",
            ));
        };
        Ok(self.inner.feature_names_out(&input_features))
    }

    /// No-op fit. Returns self.
    #[pyo3(signature = (x, y = None))]
    fn fit<'py>(
        slf: PyRef<'py, Self>,
        x: &Bound<'py, PyAny>,
        y: Option<&Bound<'py, PyAny>>,
    ) -> PyRef<'py, Self> {
        let _ = (x, y);
        slf
    }

    /// Resample a table.
    fn transform(&self, py: Python<'_>, x: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        let frame = match frame_from_py(x) {
            Ok(frame) => frame,
            Err(reason) => {
                // Raises under the "raise" policy
                self.inner
                    .reject(x.clone().unbind(), reason)
                    .map_err(to_py_err)?;
                return Ok(x.clone().unbind());
            }
        };

        match self.inner.transform(frame).map_err(to_py_err)? {
            Transformed::Resampled(frame) => frame_to_py(py, &frame),
            Transformed::Unchanged { .. } => Ok(x.clone().unbind()),
        }
    }

    /// Fit (no-op) then transform.
    #[pyo3(signature = (x, y = None))]
    fn fit_transform(
        &self,
        py: Python<'_>,
        x: &Bound<'_, PyAny>,
        y: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<PyObject> {
        let _ = y;
        self.transform(py, x)
    }

    fn __repr__(&self) -> String {
        let config = self.inner.config();
        format!(
            "ResamplerTransformer(frequency='{}', groupby='{}', method='{}', \
             default_value={:?}, error='{}')",
            self.frequency,
            config.groupby,
            method_repr(&config.method),
            config.default_value,
            self.error
        )
    }
}

impl PyResamplerTransformer {
    /// Rebuild from a `get_params`-shaped dict.
    fn from_params(params: &Bound<'_, PyDict>) -> PyResult<Self> {
        let frequency: String = param(params, "frequency")?.extract()?;
        let groupby: String = param(params, "groupby")?.extract()?;
        let method = param(params, "method")?;
        let error: String = param(params, "error")?.extract()?;
        Self::new(
            &frequency,
            &groupby,
            Some(&method),
            param(params, "default_value")?.extract()?,
            &error,
            param(params, "zero_as_missing")?.extract()?,
            param(params, "keep_zero_columns")?.extract()?,
        )
    }
}

fn param<'py>(params: &Bound<'py, PyDict>, name: &str) -> PyResult<Bound<'py, PyAny>> {
    params
        .get_item(name)?
        .ok_or_else(|| PyKeyError::new_err(name.to_string()))
}

fn method_repr(method: &AggregationSpec) -> String {
    match method {
        AggregationSpec::Uniform(agg) => agg.to_string(),
        AggregationSpec::PerColumn(map) => {
            let parts: Vec<_> = map.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// Install a stderr `tracing` subscriber with the given filter directive.
#[pyfunction]
#[pyo3(signature = (level = "info"))]
fn init_logging(level: &str) -> PyResult<()> {
    let filter = EnvFilter::try_new(level).map_err(|e| PyValueError::new_err(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

// ============================================================================
// Module Definition
// ============================================================================

/// ICU Resampler - time-series resampling for grouped clinical data.
#[pymodule]
fn icu_resampler(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyResamplerTransformer>()?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    Ok(())
}
