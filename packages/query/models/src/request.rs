//! Query submission payload types.
//!
//! [`QueryRequest`] is the body POSTed to the query endpoint. The nested
//! types describe which layers to fetch and how to filter them in time and
//! space.

use serde::{Deserialize, Serialize};

use crate::coerce;

/// Spatial type value that marks a single-point query.
pub const SPATIAL_TYPE_POINT: &str = "point";

/// Areas of interest to aggregate a spatial filter over.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Aggregation {
    /// Area-of-interest identifiers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aoi: Vec<String>,
}

/// A filter on one of a layer's extra dimensions (e.g. forecast horizon).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Dimension {
    /// Dimension name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Value to compare against.
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    /// Comparison operator (`EQ`, `GT`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Additional dimension options.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// A value filter applied to a layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Filter {
    /// Threshold value.
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    /// Comparison operator (`LT`, `GT`, `EQ`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Free-form filter expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// A time interval or snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Interval {
    /// Inclusive start (ISO-8601).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Exclusive end (ISO-8601).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Single instant, used instead of `start`/`end`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

/// Temporal filter: a list of intervals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Temporal {
    /// Intervals to query.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub intervals: Vec<Interval>,
}

/// A single layer requested by a query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Layer {
    /// Layer identifier.
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Layer kind (`raster`, `vector`).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub layer_type: Option<String>,
    /// Per-layer temporal filter, overriding the query-level one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal: Option<Temporal>,
    /// Name used to reference the layer in expressions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Use the layer only to filter others; exclude it from the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_only: Option<bool>,
    /// Temporal aggregation function (`Max`, `Mean`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    /// Value filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Extra dimension filters.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<Dimension>,
    /// User-defined function expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Whether the layer is written to the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<bool>,
}

/// Message-queue notification sent when a job finishes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Notification {
    /// Notification kind (`rabbitmq`).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    /// Broker host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Queue name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
}

/// Object-storage destination the server uploads results to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Upload {
    /// Storage provider (`ibm`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Storage endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Bucket name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// A polygon given as well-known text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Polygon {
    /// WKT geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
}

/// Spatial filter of a query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Spatial {
    /// One of `point`, `square`, `poly`, `area`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub spatial_type: Option<String>,
    /// Area-of-interest identifier (for `area` queries).
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub aoi: Option<String>,
    /// Coordinates: `[lat, lon]` for a point, `[lat1, lon1, lat2, lon2]`
    /// for a square, a flat ring for a polygon.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coordinates: Vec<f64>,
    /// Areas to aggregate over.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    /// Polygon given as WKT.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Polygon>,
}

impl Spatial {
    /// Returns `true` if this filter selects a single point.
    #[must_use]
    pub fn is_point(&self) -> bool {
        self.spatial_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(SPATIAL_TYPE_POINT))
    }
}

/// A named option passed to a post-processor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Option name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Option value.
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
}

/// A server-side post-processing step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Processor {
    /// Execution order among processors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    /// Processor kind (`coarse-grain`, ...).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub processor_type: Option<String>,
    /// Processor options.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Options>,
}

/// The body of a query submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryRequest {
    /// Query name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Layers to fetch.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<Layer>,
    /// Query-level temporal filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal: Option<Temporal>,
    /// Spatial filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial: Option<Spatial>,
    /// Output format (`json`, `csv`, `geotiff`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
    /// Output resolution level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_level: Option<i32>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Publish results to the server's map service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<bool>,
    /// Completion notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    /// Object-storage upload target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<Upload>,
    /// Post-processing steps.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub processor: Vec<Processor>,
    /// Force a point query through the asynchronous job path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<bool>,
}

impl QueryRequest {
    /// Returns `true` if the server answers this query inline: a single
    /// point with no batch flag.
    #[must_use]
    pub fn is_point_query(&self) -> bool {
        self.spatial.as_ref().is_some_and(Spatial::is_point) && self.batch != Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransferObject as _;
    use serde_json::json;

    fn sample_layer() -> serde_json::Value {
        json!({
            "id": "49180",
            "type": "raster",
            "temporal": {"intervals": [{"start": "2020-01-01T00:00:00Z", "end": "2020-02-01T00:00:00Z"}]},
            "alias": "temp",
            "filter_only": false,
            "aggregation": "Max",
            "filter": {"value": "270", "operator": "GT"},
            "dimensions": [{"name": "horizon", "value": "1", "operator": "EQ"}],
            "output": true,
        })
    }

    #[test]
    fn layer_round_trips_through_local_mapping() {
        let value = sample_layer();
        let layer = Layer::from_value(value.clone()).unwrap();
        assert_eq!(layer.to_value().unwrap(), value);
        assert_eq!(Layer::from_json(&layer.to_json().unwrap()).unwrap(), layer);
    }

    #[test]
    fn layer_wire_form_uses_camel_case() {
        let layer = Layer::from_value(sample_layer()).unwrap();
        let wire = layer.to_wire_value().unwrap();
        assert_eq!(wire["filterOnly"], json!(false));
        assert!(wire.get("filter_only").is_none());
        assert_eq!(Layer::from_value(wire).unwrap(), layer);
    }

    #[test]
    fn unset_fields_are_omitted() {
        let layer = Layer {
            id: Some("49180".to_string()),
            ..Layer::default()
        };
        assert_eq!(layer.to_value().unwrap(), json!({"id": "49180"}));
    }

    #[test]
    fn numeric_layer_id_is_coerced() {
        let layer = Layer::from_value(json!({"id": 49180})).unwrap();
        assert_eq!(layer.id.as_deref(), Some("49180"));
    }

    #[test]
    fn request_accepts_both_spellings() {
        let wire = QueryRequest::from_value(json!({"name": "q", "outputType": "csv"})).unwrap();
        let local = QueryRequest::from_value(json!({"name": "q", "output_type": "csv"})).unwrap();
        assert_eq!(wire, local);
        assert_eq!(wire.output_type.as_deref(), Some("csv"));
    }

    #[test]
    fn full_request_round_trips() {
        let value = json!({
            "name": "soil moisture",
            "layers": [sample_layer()],
            "temporal": {"intervals": [{"snapshot": "2020-01-01T00:00:00Z"}]},
            "spatial": {
                "type": "poly",
                "coordinates": [40.0, -75.0, 41.0, -74.0],
                "aggregation": {"aoi": ["24"]},
                "polygon": {"wkt": "POLYGON((0 0, 1 0, 1 1, 0 0))"},
            },
            "output_type": "json",
            "output_level": 12,
            "description": "test",
            "publish": false,
            "notification": {"type": "rabbitmq", "host": "localhost", "queue": "pairs"},
            "upload": {"provider": "ibm", "endpoint": "https://s3", "bucket": "b", "token": "t"},
            "processor": [{"order": 1, "type": "coarse-grain", "options": [{"name": "levelsUp", "value": "1"}]}],
            "batch": true,
        });
        let request = QueryRequest::from_value(value.clone()).unwrap();
        assert_eq!(request.to_value().unwrap(), value);
    }

    #[test]
    fn point_detection_honours_batch_flag() {
        let mut request = QueryRequest::from_value(json!({
            "spatial": {"type": "Point", "coordinates": [40.0, -75.0]},
        }))
        .unwrap();
        assert!(request.is_point_query());

        request.batch = Some(true);
        assert!(!request.is_point_query());

        request.batch = None;
        request.spatial = Some(Spatial {
            spatial_type: Some("square".to_string()),
            ..Spatial::default()
        });
        assert!(!request.is_point_query());
    }
}
