//! JSON documents (`google.protobuf.Struct` payloads) to and from [`Value`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map as JsonMap, Number, Value as Json};

use super::{ConversionError, ConversionResult, FieldPath, MapKey, Value, ValueMap};

/// Converts a JSON document into a value. Total: every JSON document has a
/// value representation.
pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => from_number(n),
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::list(items.iter().map(from_json).collect()),
        Json::Object(object) => Value::map(from_json_object(object)),
    }
}

pub fn from_json_object(object: &JsonMap<String, Json>) -> ValueMap {
    object
        .iter()
        .map(|(k, v)| (MapKey::String(k.clone()), from_json(v)))
        .collect()
}

fn from_number(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Int(i)
    } else if let Some(u) = n.as_u64() {
        Value::Uint(u)
    } else {
        Value::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Converts a value into JSON, naming `path` in any failure.
pub fn to_json(value: &Value, path: &FieldPath) -> ConversionResult<Json> {
    match value {
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Int(i) => Ok(Json::from(*i)),
        Value::Uint(u) => Ok(Json::from(*u)),
        Value::Double(d) => Number::from_f64(*d).map(Json::Number).ok_or_else(|| {
            ConversionError::UnrepresentableNumber {
                path: path.clone(),
                value: d.to_string(),
            }
        }),
        Value::String(s) => Ok(Json::String(s.clone())),
        Value::Bytes(b) => Ok(Json::String(STANDARD.encode(b))),
        Value::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| to_json(item, &path.index(i)))
            .collect::<ConversionResult<Vec<_>>>()
            .map(Json::Array),
        Value::Map(map) => to_json_object(map, path).map(Json::Object),
        Value::Message(msg) => Err(ConversionError::UnexpectedType {
            path: path.clone(),
            expected: "JSON value".to_string(),
            found: msg.type_name().to_string(),
        }),
        Value::Error(fault) => Err(ConversionError::ErrorValue {
            path: path.clone(),
            message: fault.to_string(),
        }),
    }
}

pub fn to_json_object(map: &ValueMap, path: &FieldPath) -> ConversionResult<JsonMap<String, Json>> {
    let mut object = JsonMap::new();
    for (key, value) in map {
        let MapKey::String(name) = key else {
            return Err(ConversionError::NonStringKey {
                path: path.clone(),
                key: key.to_string(),
            });
        };
        object.insert(name.clone(), to_json(value, &path.field(name))?);
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_json_numbers_keep_shape() {
        assert_eq!(from_json(&json!(3)), Value::Int(3));
        assert!(matches!(from_json(&json!(u64::MAX)), Value::Uint(u64::MAX)));
        assert!(matches!(from_json(&json!(1.5)), Value::Double(d) if d == 1.5));
    }

    #[test]
    fn test_round_trip_document() {
        let doc = json!({
            "sub": "spiffe://example.org/workload",
            "aud": ["a", "b"],
            "exp": 1700000000,
            "nested": {"ok": true, "ratio": 0.25, "none": null}
        });
        let value = from_json(&doc);
        assert_eq!(to_json(&value, &FieldPath::root()).unwrap(), doc);
    }

    #[test]
    fn test_bytes_are_base64() {
        let json = to_json(&Value::Bytes(b"hi".to_vec()), &FieldPath::root()).unwrap();
        assert_eq!(json, json!("aGk="));
    }

    #[test]
    fn test_unrepresentable_values_name_path() {
        let mut inner = ValueMap::new();
        inner.insert(MapKey::Int(1), Value::Null);
        let mut outer = ValueMap::new();
        outer.insert(MapKey::from("groups"), Value::list(vec![Value::map(inner)]));

        let err = to_json(&Value::map(outer), &FieldPath::root().field("claims")).unwrap_err();
        assert_eq!(err.path().as_str(), "claims.groups[0]");
        assert!(matches!(err, ConversionError::NonStringKey { .. }));

        let err = to_json(&Value::Double(f64::INFINITY), &FieldPath::root().field("exp"))
            .unwrap_err();
        assert!(matches!(err, ConversionError::UnrepresentableNumber { .. }));
    }
}
