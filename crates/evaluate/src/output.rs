//! JSON serialization of statistics objects.
//!
//! Bad data (NaN) serializes as JSON `null`. Partial-sum objects that are
//! read back use [`bad_data`] so `null` deserializes to NaN.

use serde::Serialize;

use crate::error::EvaluateError;

/// Serialize any statistics object to pretty-printed JSON.
///
/// # Errors
///
/// Returns [`EvaluateError::Serialization`] if serialization fails.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, EvaluateError> {
    serde_json::to_string_pretty(value).map_err(|e| EvaluateError::Serialization {
        reason: e.to_string(),
    })
}

/// Serde adapter mapping bad data to and from JSON `null`.
pub mod bad_data {
    use serde::{Deserialize, Deserializer, Serializer};
    use verif_stats::{BAD, is_bad};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if is_bad(*v) {
            s.serialize_none()
        } else {
            s.serialize_some(v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(BAD))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use verif_stats::is_bad;

    #[derive(Debug, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "bad_data")]
        v: f64,
        n: usize,
    }

    #[test]
    fn test_bad_data_serializes_as_null() {
        let json = serde_json::to_string(&Sample { v: f64::NAN, n: 2 }).unwrap();
        assert_eq!(json, r#"{"v":null,"n":2}"#);
    }

    #[test]
    fn test_null_deserializes_as_bad() {
        let s: Sample = serde_json::from_str(r#"{"v":null,"n":1}"#).unwrap();
        assert!(is_bad(s.v));
        let s: Sample = serde_json::from_str(r#"{"v":2.5,"n":1}"#).unwrap();
        assert_eq!(s.v, 2.5);
    }

    #[test]
    fn test_to_json_pretty() {
        let json = to_json(&Sample { v: 1.5, n: 3 }).unwrap();
        assert!(json.contains("\"v\": 1.5"));
        assert!(json.contains("\"n\": 3"));
    }
}
