use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value as Json};
use spire_cel_composer::env::builtins::override_entries;
use spire_cel_composer::env::composer_environment;
use spire_cel_composer::eval::Activation;
use spire_cel_composer::value::{Fault, MapKey, Value, ValueMap};
use spire_cel_composer::{compile, ComposeWorkloadJwtSvidRequest, JwtSvidAttributes};

fn int_map(entries: &BTreeMap<String, i64>) -> Value {
    let map: ValueMap = entries
        .iter()
        .map(|(k, v)| (MapKey::String(k.clone()), Value::Int(*v)))
        .collect();
    Value::map(map)
}

fn claim() -> impl Strategy<Value = Json> {
    let leaf = prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::from),
        any::<i64>().prop_map(Json::from),
        (-1.0e6f64..1.0e6).prop_map(Json::from),
        "[a-z0-9:/._-]{0,16}".prop_map(Json::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Json::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Json::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn override_keys_are_union_and_rhs_wins(
        a in prop::collection::btree_map("[a-e]{1,2}", any::<i64>(), 0..8),
        b in prop::collection::btree_map("[a-e]{1,2}", any::<i64>(), 0..8),
    ) {
        let merged = override_entries(&int_map(&a), &int_map(&b)).unwrap();
        let merged = merged.as_map().unwrap();

        let mut expected = a.clone();
        expected.extend(b.clone());
        prop_assert_eq!(merged.len(), expected.len());
        for (key, value) in &expected {
            prop_assert_eq!(merged.get(&MapKey::from(key.as_str())), Some(&Value::Int(*value)));
        }
    }

    #[test]
    fn override_is_stable_for_equal_inputs(
        a in prop::collection::btree_map("[a-e]{1,2}", any::<i64>(), 0..8),
        b in prop::collection::btree_map("[a-e]{1,2}", any::<i64>(), 0..8),
    ) {
        let first = override_entries(&int_map(&a), &int_map(&b)).unwrap();
        let second = override_entries(&int_map(&a), &int_map(&b)).unwrap();
        let order = |v: &Value| v.as_map().unwrap().keys().cloned().collect::<Vec<_>>();
        prop_assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn override_rejects_non_maps(n in any::<i64>(), s in "[a-z]{0,8}") {
        let map = int_map(&BTreeMap::new());
        prop_assert_eq!(
            override_entries(&Value::Int(n), &map),
            Err(Fault::type_error("unsupported operand type"))
        );
        prop_assert_eq!(
            override_entries(&map, &Value::string(s)),
            Err(Fault::type_error("unsupported operand type"))
        );
    }

    #[test]
    fn request_round_trips_through_value(
        spiffe_id in "spiffe://[a-z]{1,8}\\.org(/[a-z0-9]{1,6}){0,3}",
        claims in prop::option::of(prop::collection::btree_map("[a-z]{1,8}", claim(), 0..6)),
    ) {
        let request = ComposeWorkloadJwtSvidRequest {
            spiffe_id,
            attributes: claims.map(|claims| JwtSvidAttributes {
                claims: claims.into_iter().collect(),
            }),
        };
        let value = Value::from(&request);
        let back = ComposeWorkloadJwtSvidRequest::try_from(&value).unwrap();
        prop_assert_eq!(back, request);
    }
}

#[test]
fn override_example_through_expression() {
    let env = Arc::new(composer_environment().unwrap());
    let program = compile(
        env,
        "{'a': 1, 'b': 2}.mapOverrideEntries({'b': 3, 'c': 4}) == {'a': 1, 'b': 3, 'c': 4}",
    )
    .unwrap();
    assert_eq!(program.evaluate(&Activation::new()), Ok(Value::Bool(true)));
}

#[test]
fn claims_json_survives_identity_expression() {
    let env = Arc::new(composer_environment().unwrap());
    let program = compile(env, "{'attributes': {'claims': request.attributes.claims}}").unwrap();
    let request: ComposeWorkloadJwtSvidRequest = serde_json::from_value(json!({
        "spiffe_id": "spiffe://example.org/x",
        "attributes": {"claims": {"big": u64::MAX, "neg": -1, "f": 0.25, "nested": {"l": [1, "x", null]}}}
    }))
    .unwrap();
    let activation = Activation::new().with_binding("request", Value::from(&request));
    let value = program.evaluate(&activation).unwrap();
    let response = spire_cel_composer::ComposeWorkloadJwtSvidResponse::try_from(&value).unwrap();
    assert_eq!(response.attributes, request.attributes);
}
