//! Field-name translation between local snake_case and wire camelCase.
//!
//! The serde derives on every transfer object speak the wire form. This
//! table is the single place that knows which wire keys have a different
//! local spelling; keys absent from it are identical in both forms.

use serde_json::{Map, Value};

/// `(local, wire)` pairs for every aliased field in the API schema.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("filter_only", "filterOnly"),
    ("output_type", "outputType"),
    ("output_level", "outputLevel"),
    ("layer_id", "layerId"),
    ("layer_name", "layerName"),
    ("user_id", "userId"),
    ("status_code", "statusCode"),
    ("sw_lat", "swLat"),
    ("sw_lon", "swLon"),
    ("ne_lat", "neLat"),
    ("ne_lon", "neLon"),
    ("pct_complete", "pctComplete"),
];

/// Returns the wire name for a local key, if the key is aliased.
#[must_use]
pub fn wire_name(local: &str) -> Option<&'static str> {
    FIELD_ALIASES
        .iter()
        .find(|(l, _)| *l == local)
        .map(|(_, w)| *w)
}

/// Returns the local name for a wire key, if the key is aliased.
#[must_use]
pub fn local_name(wire: &str) -> Option<&'static str> {
    FIELD_ALIASES
        .iter()
        .find(|(_, w)| *w == wire)
        .map(|(l, _)| *l)
}

/// Rewrites every aliased object key (at any depth) to its wire name.
#[must_use]
pub fn to_wire(value: Value) -> Value {
    rename_keys(value, wire_name)
}

/// Rewrites every aliased object key (at any depth) to its local name.
#[must_use]
pub fn to_local(value: Value) -> Value {
    rename_keys(value, local_name)
}

fn rename_keys(value: Value, lookup: fn(&str) -> Option<&'static str>) -> Value {
    match value {
        Value::Object(map) => {
            let renamed: Map<String, Value> = map
                .into_iter()
                .map(|(key, inner)| {
                    let key = lookup(&key).map_or(key, ToString::to_string);
                    (key, rename_keys(inner, lookup))
                })
                .collect();
            Value::Object(renamed)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| rename_keys(item, lookup))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renames_nested_keys_both_ways() {
        let local = json!({
            "output_type": "json",
            "layers": [{"id": "49180", "filter_only": true}],
        });
        let wire = to_wire(local.clone());
        assert_eq!(
            wire,
            json!({
                "outputType": "json",
                "layers": [{"id": "49180", "filterOnly": true}],
            })
        );
        assert_eq!(to_local(wire), local);
    }

    #[test]
    fn leaves_unaliased_keys_and_values_alone() {
        let value = json!({"name": "outputType", "value": "filter_only"});
        assert_eq!(to_wire(value.clone()), value);
        assert_eq!(to_local(value.clone()), value);
    }

    #[test]
    fn table_is_a_bijection() {
        for (local, wire) in FIELD_ALIASES {
            assert_eq!(wire_name(local), Some(*wire));
            assert_eq!(local_name(wire), Some(*local));
        }
    }
}
