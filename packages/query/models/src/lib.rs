#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Transfer objects mirroring the PAIRS query REST API.
//!
//! Every type in this crate is a plain data holder that can be built from a
//! JSON mapping (accepting both the API's camelCase names and the local
//! snake_case names) and serialized back out, either in local form
//! ([`TransferObject::to_value`]) or in the wire form the API expects
//! ([`TransferObject::to_wire_value`]). Unset fields are omitted from the
//! serialized output.
//!
//! The only behaviour that lives here beyond serialization is the job
//! status-code table in [`status`].

pub mod aliases;
pub mod coerce;
pub mod job;
pub mod output_info;
pub mod request;
pub mod response;
pub mod status;
pub mod user;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use job::{LatestQueries, QueryHistory, QueryJob, QueryJobLayer, QueryJobs};
pub use output_info::{OutputFile, QueryOutputInfoFile};
pub use request::{
    Aggregation, Dimension, Filter, Interval, Layer, Notification, Options, Polygon, Processor,
    QueryRequest, Spatial, Temporal, Upload,
};
pub use response::{PointData, QueryResponse, QueryResponseData};
pub use status::QueryStatus;
pub use user::{Group, User};

/// Errors that can occur while converting transfer objects.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// JSON text could not be parsed, or a field had the wrong type.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Input accepted by [`TransferObject::from_input`].
///
/// Callers may hold either raw JSON text or an already-parsed mapping; the
/// variant decides how the input is parsed before it is dispatched to the
/// type's deserializer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferInput {
    /// JSON document text.
    Json(String),
    /// Parsed JSON mapping.
    Value(serde_json::Value),
}

impl From<&str> for TransferInput {
    fn from(value: &str) -> Self {
        Self::Json(value.to_string())
    }
}

impl From<String> for TransferInput {
    fn from(value: String) -> Self {
        Self::Json(value)
    }
}

impl From<serde_json::Value> for TransferInput {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

/// Conversions shared by every transfer object.
///
/// All methods have default implementations built on the type's serde
/// derive (which speaks the wire form) plus the alias table in
/// [`aliases`].
pub trait TransferObject: Serialize + DeserializeOwned {
    /// Builds the object from a JSON mapping using wire or local names.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if a field has the wrong type.
    fn from_value(value: serde_json::Value) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(aliases::to_wire(value))?)
    }

    /// Builds the object from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if the text is not valid JSON or a field
    /// has the wrong type.
    fn from_json(text: &str) -> Result<Self, ModelError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Builds the object from either JSON text or a parsed mapping.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if parsing or field coercion fails.
    fn from_input(input: impl Into<TransferInput>) -> Result<Self, ModelError> {
        match input.into() {
            TransferInput::Json(text) => Self::from_json(&text),
            TransferInput::Value(value) => Self::from_value(value),
        }
    }

    /// Serializes to a mapping keyed by local snake_case names.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if serialization fails.
    fn to_value(&self) -> Result<serde_json::Value, ModelError> {
        Ok(aliases::to_local(serde_json::to_value(self)?))
    }

    /// Serializes to JSON text keyed by local snake_case names.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if serialization fails.
    fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string(&self.to_value()?)?)
    }

    /// Serializes to a mapping keyed by the API's camelCase names.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if serialization fails.
    fn to_wire_value(&self) -> Result<serde_json::Value, ModelError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serializes to JSON text keyed by the API's camelCase names.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if serialization fails.
    fn to_wire_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string(self)?)
    }
}

macro_rules! transfer_objects {
    ($($ty:ty),* $(,)?) => {
        $(impl TransferObject for $ty {})*
    };
}

transfer_objects!(
    Aggregation,
    Dimension,
    Filter,
    Interval,
    Temporal,
    Layer,
    Notification,
    Upload,
    Polygon,
    Spatial,
    Options,
    Processor,
    QueryRequest,
    QueryResponseData,
    QueryResponse,
    QueryJob,
    QueryJobs,
    QueryJobLayer,
    Group,
    User,
    QueryHistory,
    LatestQueries,
    QueryOutputInfoFile,
    OutputFile,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_input_dispatches_on_variant() {
        let from_text = Filter::from_input(r#"{"value": "10", "operator": "GT"}"#).unwrap();
        let from_value = Filter::from_input(json!({"value": "10", "operator": "GT"})).unwrap();
        assert_eq!(from_text, from_value);
        assert_eq!(from_text.operator.as_deref(), Some("GT"));
    }

    #[test]
    fn rejects_mistyped_field() {
        let err = Layer::from_value(json!({"id": "49180", "output": "yes please"})).unwrap_err();
        assert!(err.to_string().contains("JSON error"), "{err}");
    }

    #[test]
    fn rejects_invalid_json_text() {
        assert!(Interval::from_json("{not json").is_err());
    }
}
