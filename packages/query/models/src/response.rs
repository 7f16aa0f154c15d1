//! Responses to a query submission.

use serde::{Deserialize, Serialize};

use crate::coerce;

/// One row of inline point-query data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryResponseData {
    /// Layer identifier.
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub layer_id: Option<String>,
    /// Layer name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_name: Option<String>,
    /// Dataset name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    /// Observation time in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Longitude (WGS84).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Latitude (WGS84).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Observed value.
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    /// Region name for vector data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Property name for vector data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Aggregation applied to the value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    /// Layer alias from the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Inline data returned by a real-time point query.
///
/// The server returns either typed rows or, for CSV output, one delimited
/// text blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointData {
    /// Typed rows.
    Rows(Vec<QueryResponseData>),
    /// Raw delimited text.
    Csv(String),
}

impl PointData {
    /// Returns `true` if there are no rows and no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Rows(rows) => rows.is_empty(),
            Self::Csv(text) => text.trim().is_empty(),
        }
    }
}

/// Server acknowledgment of a query submission.
///
/// Bulk queries get an `id` for status polling; point queries get their
/// `data` inline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryResponse {
    /// Job identifier.
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Inline point data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PointData>,
    /// Error or informational message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransferObject as _;
    use serde_json::json;

    #[test]
    fn parses_typed_point_rows() {
        let response = QueryResponse::from_value(json!({
            "data": [{
                "layerId": "49180",
                "timestamp": 1_577_836_800_000_i64,
                "longitude": -75.0,
                "latitude": 40.0,
                "value": 271.3,
            }],
        }))
        .unwrap();

        let Some(PointData::Rows(rows)) = &response.data else {
            panic!("expected rows, got {:?}", response.data);
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].layer_id.as_deref(), Some("49180"));
        assert_eq!(rows[0].value.as_deref(), Some("271.3"));
    }

    #[test]
    fn parses_csv_blob() {
        let response =
            QueryResponse::from_value(json!({"data": "layerId,value\n49180,271.3\n"})).unwrap();
        assert!(matches!(response.data, Some(PointData::Csv(ref t)) if t.starts_with("layerId")));
    }

    #[test]
    fn bulk_ack_round_trips() {
        let value = json!({"id": "1613484000_12345678"});
        let response = QueryResponse::from_value(value.clone()).unwrap();
        assert_eq!(response.to_value().unwrap(), value);
        assert!(response.data.is_none());
    }

    #[test]
    fn row_round_trips_in_local_form() {
        let value = json!({
            "layer_id": "49180",
            "layer_name": "Temperature",
            "dataset": "ERA5",
            "timestamp": 1_577_836_800_000_i64,
            "longitude": -75.5,
            "latitude": 40.5,
            "value": "271.3",
            "alias": "t",
        });
        let row = QueryResponseData::from_value(value.clone()).unwrap();
        assert_eq!(row.to_value().unwrap(), value);
    }

    #[test]
    fn empty_point_data() {
        assert!(PointData::Rows(Vec::new()).is_empty());
        assert!(PointData::Csv("  \n".to_string()).is_empty());
        assert!(!PointData::Csv("a,b".to_string()).is_empty());
    }
}
