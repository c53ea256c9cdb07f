//! Estimator lifecycle shared with pipeline tooling.
//!
//! A pipeline only needs `fit`/`transform` and the ability to read and
//! write a step's parameters by name.

use icu_core::{Error, Frame, Result};
use serde_json::{json, Value};

use crate::resampler::{ResamplerTransformer, Transformed};

/// A pipeline step with a fit/transform lifecycle.
pub trait Transformer {
    type Output;

    /// Learn from `x` (and optional targets `y`).
    fn fit(&mut self, x: &Frame, y: Option<&[f64]>) -> Result<&mut Self>;

    /// Transform `x` using what was learned.
    fn transform(&self, x: Frame) -> Result<Self::Output>;

    fn fit_transform(&mut self, x: Frame, y: Option<&[f64]>) -> Result<Self::Output> {
        self.fit(&x, y)?;
        self.transform(x)
    }

    /// Constructor parameters by name.
    fn get_params(&self) -> Result<Value>;

    /// Update constructor parameters by name. Unknown names are rejected.
    fn set_params(&mut self, params: Value) -> Result<()>;
}

impl Transformer for ResamplerTransformer {
    type Output = Transformed<Frame>;

    fn fit(&mut self, _x: &Frame, _y: Option<&[f64]>) -> Result<&mut Self> {
        Ok(self)
    }

    fn transform(&self, x: Frame) -> Result<Self::Output> {
        ResamplerTransformer::transform(self, x)
    }

    fn get_params(&self) -> Result<Value> {
        let config = self.config();
        Ok(json!({
            "frequency": config.frequency,
            "groupby": config.groupby,
            "method": serde_json::to_value(&config.method)?,
            "default_value": config.default_value,
            "error_policy": config.error_policy,
            "index_detection": config.index_detection,
            "zero_policy": config.zero_policy,
        }))
    }

    fn set_params(&mut self, params: Value) -> Result<()> {
        let Value::Object(params) = params else {
            return Err(Error::config("parameters must be a JSON object"));
        };

        // Validate everything before touching the configuration.
        let mut next = self.config().clone();
        for (name, value) in params {
            match name.as_str() {
                "frequency" => next.frequency = serde_json::from_value(value)?,
                "groupby" => next.groupby = serde_json::from_value(value)?,
                // Custom reducers serialize by name only and cannot be
                // rebuilt; an unchanged method is kept as is.
                "method" if serde_json::to_value(&next.method)? == value => {}
                "method" => {
                    next.method = serde_json::from_value(value.clone()).map_err(|_| {
                        Error::config(format!("method {value} cannot be set from parameters"))
                    })?
                }
                "default_value" => next.default_value = serde_json::from_value(value)?,
                "error_policy" => next.error_policy = serde_json::from_value(value)?,
                "index_detection" => next.index_detection = serde_json::from_value(value)?,
                "zero_policy" => next.zero_policy = serde_json::from_value(value)?,
                other => {
                    return Err(Error::config(format!(
                        "invalid parameter '{other}' for ResamplerTransformer"
                    )))
                }
            }
        }
        *self.config_mut() = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icu_core::{
        Aggregation, Column, DatetimeValues, ErrorPolicy, Frequency, IndexLevel, Label,
        ResamplerConfig,
    };

    fn frame() -> Frame {
        Frame::new(
            vec![
                IndexLevel::labels("stay_id", vec![Label::Int(1), Label::Int(1)]),
                IndexLevel::datetime("time", DatetimeValues::naive(vec![0, 20 * 60_000])),
            ],
            vec![Column::numeric("hr", vec![Some(60.0), Some(70.0)])],
        )
        .unwrap()
    }

    fn run<T: Transformer>(step: &mut T, x: Frame) -> Result<T::Output> {
        step.fit_transform(x, None)
    }

    #[test]
    fn test_fit_learns_nothing() {
        let mut resampler = ResamplerTransformer::default();
        let before = resampler.get_params().unwrap();
        Transformer::fit(&mut resampler, &frame(), Some(&[1.0, 0.0])).unwrap();
        assert_eq!(resampler.get_params().unwrap(), before);
    }

    #[test]
    fn test_fit_transform() {
        let mut resampler = ResamplerTransformer::default();
        let out = run(&mut resampler, frame()).unwrap().resampled().unwrap();
        assert_eq!(out.numeric("hr").unwrap(), &[Some(65.0)]);
    }

    #[test]
    fn test_get_params() {
        let params = ResamplerTransformer::default().get_params().unwrap();
        assert_eq!(params["frequency"], "1h");
        assert_eq!(params["groupby"], "stay_id");
        assert_eq!(params["method"], "mean");
        assert_eq!(params["default_value"], Value::Null);
        assert_eq!(params["error_policy"], "raise");
    }

    #[test]
    fn test_params_clone_round_trip() {
        let original = ResamplerTransformer::new(
            ResamplerConfig::default()
                .with_frequency(Frequency::DAY)
                .with_method(Aggregation::Median)
                .with_default_value(Some(1.5)),
        );

        let mut cloned = ResamplerTransformer::default();
        cloned.set_params(original.get_params().unwrap()).unwrap();

        assert_eq!(cloned.get_params().unwrap(), original.get_params().unwrap());
    }

    #[test]
    fn test_params_round_trip_keeps_custom_method() {
        let p90 = Aggregation::custom("p90", |v| v.last().copied());
        let mut resampler = ResamplerTransformer::new(ResamplerConfig::default().with_method(p90));

        let params = resampler.get_params().unwrap();
        assert_eq!(params["method"], json!({"custom": "p90"}));
        resampler.set_params(params).unwrap();

        assert_eq!(resampler.config().method.for_column("hr").unwrap().name(), "p90");
    }

    #[test]
    fn test_custom_method_not_restored_by_name() {
        let p90 = Aggregation::custom("p90", |v| v.last().copied());
        let params = ResamplerTransformer::new(ResamplerConfig::default().with_method(p90))
            .get_params()
            .unwrap();

        let mut fresh = ResamplerTransformer::default();
        let err = fresh.set_params(params).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(fresh.config().method.for_column("hr").unwrap().name(), "mean");
    }

    #[test]
    fn test_set_params_partial() {
        let mut resampler = ResamplerTransformer::default();
        resampler
            .set_params(json!({"frequency": "15min", "error_policy": "ignore"}))
            .unwrap();

        assert_eq!(resampler.config().frequency.width_ms(), 15 * 60_000);
        assert_eq!(resampler.config().error_policy, ErrorPolicy::Ignore);
        assert_eq!(resampler.config().groupby, "stay_id");
    }

    #[test]
    fn test_set_params_rejects_unknown() {
        let mut resampler = ResamplerTransformer::default();
        let err = resampler
            .set_params(json!({"frequency": "2h", "window": 3}))
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        // Nothing applied
        assert_eq!(resampler.config().frequency, Frequency::HOUR);
    }

    #[test]
    fn test_set_params_rejects_bad_frequency() {
        let mut resampler = ResamplerTransformer::default();
        assert!(resampler.set_params(json!({"frequency": "1M"})).is_err());
    }
}
