//! Domain builtins available to composer expressions.

use uuid::Uuid;

use super::{FunctionDecl, Overload};
use crate::types::CelType;
use crate::value::{Fault, Value};

/// `mapOverrideEntries(lhs, rhs)` and `lhs.mapOverrideEntries(rhs)`.
pub fn map_override_entries() -> FunctionDecl {
    let map = || CelType::map(CelType::param("K"), CelType::param("V"));
    FunctionDecl::new("mapOverrideEntries")
        .overload(Overload::global(
            "mapOverrideEntries",
            vec![map(), map()],
            map(),
            |args| override_entries(&args[0], &args[1]),
        ))
        .overload(Overload::member(
            "map_mapOverrideEntries",
            vec![map(), map()],
            map(),
            |args| override_entries(&args[0], &args[1]),
        ))
}

/// `uuidgen()`
pub fn uuidgen() -> FunctionDecl {
    FunctionDecl::new("uuidgen").overload(Overload::global(
        "uuidgen",
        Vec::new(),
        CelType::String,
        |_| Ok(generate_uuid()),
    ))
}

/// Right-biased shallow union. Entries of `lhs` come first in their own
/// order; entries of `rhs` replace them in place or are appended.
pub fn override_entries(lhs: &Value, rhs: &Value) -> Result<Value, Fault> {
    let (Some(lhs), Some(rhs)) = (lhs.as_map(), rhs.as_map()) else {
        return Err(Fault::type_error("unsupported operand type"));
    };
    let mut merged = lhs.clone();
    for (key, value) in rhs.iter() {
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::map(merged))
}

pub fn generate_uuid() -> Value {
    Value::String(Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{MapKey, ValueMap};
    use pretty_assertions::assert_eq;

    fn map(entries: &[(&str, i64)]) -> Value {
        Value::map(
            entries
                .iter()
                .map(|(k, v)| (MapKey::from(*k), Value::Int(*v)))
                .collect::<ValueMap>(),
        )
    }

    #[test]
    fn test_override_entries() {
        let merged = override_entries(&map(&[("a", 1), ("b", 2)]), &map(&[("b", 3), ("c", 4)]))
            .unwrap();
        assert_eq!(merged, map(&[("a", 1), ("b", 3), ("c", 4)]));

        let keys: Vec<&MapKey> = merged.as_map().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec![&MapKey::from("a"), &MapKey::from("b"), &MapKey::from("c")]
        );
    }

    #[test]
    fn test_override_entries_rejects_non_maps() {
        let err = override_entries(&Value::Int(1), &map(&[])).unwrap_err();
        assert_eq!(err, Fault::type_error("unsupported operand type"));
        let err = override_entries(&map(&[]), &Value::string("x")).unwrap_err();
        assert_eq!(err, Fault::type_error("unsupported operand type"));
    }

    #[test]
    fn test_uuidgen_is_fresh_v4() {
        let a = generate_uuid();
        let b = generate_uuid();
        assert_ne!(a, b);
        let text = a.as_str().unwrap();
        let parsed = Uuid::parse_str(text).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(parsed.hyphenated().to_string(), text);
    }
}
