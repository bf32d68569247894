//! Typed access to the open-ended `extra_params` object.
//!
//! Every calculator owns its parameter schema; this only does the lookup
//! and type checks. JSON `null` counts as absent.

use serde_json::Value;

use openrs_common::{ExtraParams, OpenRsError, OpenRsResult};

/// Reads typed values out of request parameters.
#[derive(Debug, Clone, Copy)]
pub struct ParamReader<'a> {
    params: &'a ExtraParams,
}

impl<'a> ParamReader<'a> {
    pub fn new(params: &'a ExtraParams) -> Self {
        Self { params }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    fn missing(name: &str) -> OpenRsError {
        OpenRsError::invalid_parameter(name, "is required")
    }

    /// An integer. Floats such as `3.0` and booleans are rejected.
    pub fn optional_int(&self, name: &str) -> OpenRsResult<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| OpenRsError::invalid_parameter(name, "must be an integer")),
        }
    }

    pub fn required_int(&self, name: &str) -> OpenRsResult<i64> {
        self.optional_int(name)?.ok_or_else(|| Self::missing(name))
    }

    /// Any JSON number.
    pub fn optional_f64(&self, name: &str) -> OpenRsResult<Option<f64>> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .filter(|f| f.is_finite())
                .map(Some)
                .ok_or_else(|| OpenRsError::invalid_parameter(name, "must be a number")),
        }
    }

    pub fn required_f64(&self, name: &str) -> OpenRsResult<f64> {
        self.optional_f64(name)?.ok_or_else(|| Self::missing(name))
    }

    pub fn optional_bool(&self, name: &str) -> OpenRsResult<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| OpenRsError::invalid_parameter(name, "must be true or false")),
        }
    }

    pub fn required_bool(&self, name: &str) -> OpenRsResult<bool> {
        self.optional_bool(name)?.ok_or_else(|| Self::missing(name))
    }
}

/// Reject values outside the inclusive range `[lo, hi]`.
pub fn check_int_range(name: &str, value: i64, lo: i64, hi: i64) -> OpenRsResult<i64> {
    if value < lo || value > hi {
        return Err(OpenRsError::invalid_parameter(
            name,
            format!("must be between {} and {}, got {}", lo, hi, value),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> ExtraParams {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_int_is_strict() {
        let p = params(json!({"a": 3, "b": 3.0, "c": true, "d": "3"}));
        let reader = ParamReader::new(&p);
        assert_eq!(reader.required_int("a").unwrap(), 3);
        for name in ["b", "c", "d"] {
            let err = reader.required_int(name).unwrap_err();
            assert!(err.to_string().contains("must be an integer"), "{}", name);
        }
    }

    #[test]
    fn test_null_counts_as_missing() {
        let p = params(json!({"gamma": null}));
        let reader = ParamReader::new(&p);
        assert_eq!(reader.optional_f64("gamma").unwrap(), None);
        let err = reader.required_f64("gamma").unwrap_err();
        assert!(err.to_string().contains("'gamma': is required"));
    }

    #[test]
    fn test_number_accepts_ints() {
        let p = params(json!({"gain": 2}));
        assert_eq!(ParamReader::new(&p).required_f64("gain").unwrap(), 2.0);
    }

    #[test]
    fn test_bool_rejects_numbers() {
        let p = params(json!({"inv": 1}));
        assert!(ParamReader::new(&p).required_bool("inv").is_err());
    }

    #[test]
    fn test_int_range() {
        assert!(check_int_range("random_state", 42, 0, 42).is_ok());
        assert!(check_int_range("random_state", 43, 0, 42).is_err());
        assert!(check_int_range("random_state", -1, 0, 42).is_err());
    }
}
