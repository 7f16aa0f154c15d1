//! Lenient field coercion for values the API sends as either text or
//! numbers.

use serde::{Deserialize, Deserializer, de::Error as _};

/// Deserializes an optional string, accepting JSON numbers and booleans
/// by rendering them as text. Objects and arrays are rejected.
///
/// # Errors
///
/// Returns a deserialization error for objects and arrays.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "super::opt_string")]
        value: Option<String>,
    }

    #[test]
    fn accepts_numbers_as_text() {
        let holder: Holder = serde_json::from_value(json!({"value": 12.5})).unwrap();
        assert_eq!(holder.value.as_deref(), Some("12.5"));
    }

    #[test]
    fn missing_and_null_are_none() {
        let holder: Holder = serde_json::from_value(json!({})).unwrap();
        assert!(holder.value.is_none());
        let holder: Holder = serde_json::from_value(json!({"value": null})).unwrap();
        assert!(holder.value.is_none());
    }

    #[test]
    fn rejects_arrays() {
        assert!(serde_json::from_value::<Holder>(json!({"value": [1, 2]})).is_err());
    }
}
