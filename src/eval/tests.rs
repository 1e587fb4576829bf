use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::env::composer_environment;
use crate::program::{compile, compile_with_options, ProgramOptions};
use crate::schema::{ComposeWorkloadJwtSvidRequest, ATTRIBUTES_TYPE, RESPONSE_TYPE};
use crate::value::{MapKey, Value};

fn context() -> EvaluationContext {
    let request: ComposeWorkloadJwtSvidRequest = serde_json::from_value(json!({
        "spiffe_id": "spiffe://example.org/web",
        "attributes": {"claims": {"sub": "spiffe://example.org/web", "aud": ["a", "b"], "n": 3}}
    }))
    .unwrap();
    EvaluationContext::new("example.org", "spiffe://example.org", &request)
}

fn eval(source: &str) -> EvalResult<Value> {
    let env = Arc::new(composer_environment().unwrap());
    let program = compile(env, source).unwrap_or_else(|e| panic!("{}: {}", source, e));
    program.evaluate(&context().activation())
}

fn eval_ok(source: &str) -> Value {
    eval(source).unwrap_or_else(|e| panic!("{}: {}", source, e))
}

#[test]
fn test_context_variables() {
    assert_eq!(eval_ok("trust_domain"), Value::string("example.org"));
    assert_eq!(
        eval_ok("spiffe_trust_domain == 'spiffe://' + trust_domain"),
        Value::Bool(true)
    );
    assert_eq!(
        eval_ok("request.spiffe_id.startsWith(spiffe_trust_domain)"),
        Value::Bool(true)
    );
    assert_eq!(eval_ok("request.attributes.claims.n + 1"), Value::Int(4));
    assert_eq!(eval_ok("request.attributes.claims['aud'][1]"), Value::string("b"));
}

#[test]
fn test_response_construction() {
    let source = format!(
        "{}{{attributes: {}{{claims: request.attributes.claims.mapOverrideEntries({{'sub': 'x', 'td': trust_domain}})}}}}",
        RESPONSE_TYPE, ATTRIBUTES_TYPE
    );
    let response = eval_ok(&source);
    let Value::Message(message) = response else {
        panic!("expected a message");
    };
    assert_eq!(message.type_name(), RESPONSE_TYPE);
    let Some(Value::Message(attributes)) = message.field("attributes") else {
        panic!("expected attributes");
    };
    let claims = attributes.field("claims").and_then(Value::as_map).unwrap();
    let keys: Vec<&MapKey> = claims.keys().collect();
    assert_eq!(
        keys,
        vec![
            &MapKey::from("aud"),
            &MapKey::from("n"),
            &MapKey::from("sub"),
            &MapKey::from("td")
        ]
    );
    assert_eq!(claims.get(&MapKey::from("sub")), Some(&Value::string("x")));
}

#[test]
fn test_unset_fields_read_defaults() {
    let env = Arc::new(composer_environment().unwrap());
    let program = compile(env, "has(request.attributes) ? 'set' : request.spiffe_id").unwrap();
    let request = ComposeWorkloadJwtSvidRequest::default();
    let ctx = EvaluationContext::new("td", "spiffe://td", &request);
    assert_eq!(program.evaluate(&ctx.activation()), Ok(Value::string("")));

    let env = Arc::new(composer_environment().unwrap());
    let program = compile(env, "size(request.attributes.claims)").unwrap();
    assert_eq!(program.evaluate(&ctx.activation()), Ok(Value::Int(0)));
}

#[test]
fn test_missing_claim_is_an_error() {
    assert_eq!(
        eval("request.attributes.claims.missing"),
        Err(EvalError::NoSuchKey("missing".to_string()))
    );
    assert_eq!(
        eval_ok("has(request.attributes.claims.missing)"),
        Value::Bool(false)
    );
}

#[test]
fn test_logical_operators_absorb_errors() {
    assert_eq!(
        eval_ok("request.attributes.claims.missing == 1 || true"),
        Value::Bool(true)
    );
    assert_eq!(
        eval_ok("false && request.attributes.claims.missing == 1"),
        Value::Bool(false)
    );
    assert!(eval("request.attributes.claims.missing == 1 && true").is_err());
}

#[test]
fn test_arithmetic_errors() {
    assert_eq!(eval("1 / (request.attributes.claims.n - 3)"), Err(EvalError::DivisionByZero));
    assert_eq!(eval("5 % 0"), Err(EvalError::ModulusByZero));
    assert!(matches!(
        eval("9223372036854775807 + 1"),
        Err(EvalError::Overflow(_))
    ));
}

#[test]
fn test_comprehensions() {
    assert_eq!(
        eval_ok("request.attributes.claims.aud.all(a, size(a) == 1)"),
        Value::Bool(true)
    );
    assert_eq!(eval_ok("[1, 2, 3].exists_one(x, x > 2)"), Value::Bool(true));
    assert_eq!(
        eval_ok("[1, 2, 3].filter(x, x % 2 == 1)"),
        Value::list(vec![Value::Int(1), Value::Int(3)])
    );
    assert_eq!(
        eval_ok("[1, 2, 3].map(x, x > 1, x * 10)"),
        Value::list(vec![Value::Int(20), Value::Int(30)])
    );
    assert_eq!(
        eval_ok("['a', 'b'].transformList(i, v, v + string(i))"),
        Value::list(vec![Value::string("a0"), Value::string("b1")])
    );
    assert_eq!(
        eval_ok("{'a': 1, 'b': 2}.exists(k, v, k == 'b' && v == 2)"),
        Value::Bool(true)
    );
    assert_eq!(eval_ok("{'a': 1}.transformMap(k, v, v * 2)['a']"), Value::Int(2));
}

#[test]
fn test_exists_absorbs_errors_once_decided() {
    assert_eq!(
        eval_ok("[0, 1].exists(x, 1 / x == 1)"),
        Value::Bool(true)
    );
    assert_eq!(eval("[0].all(x, 1 / x == 1)"), Err(EvalError::DivisionByZero));
}

#[test]
fn test_bind_and_extensions() {
    assert_eq!(
        eval_ok("cel.bind(parts, request.spiffe_id.split('/'), parts[size(parts) - 1])"),
        Value::string("web")
    );
    assert_eq!(
        eval_ok("lists.range(4).reverse().slice(0, 2)"),
        Value::list(vec![Value::Int(3), Value::Int(2)])
    );
    assert_eq!(eval_ok("trust_domain.upperAscii()"), Value::string("EXAMPLE.ORG"));
}

#[test]
fn test_uuidgen_is_fresh_per_call() {
    let value = eval_ok("[uuidgen(), uuidgen()]");
    let items = value.as_list().unwrap();
    assert_ne!(items[0], items[1]);
    assert_eq!(items[0].as_str().unwrap().len(), 36);
}

#[test]
fn test_dynamic_override_of_non_map() {
    let err = eval("mapOverrideEntries(request.attributes.claims, dyn(request.attributes.claims.n))")
        .unwrap_err();
    assert_eq!(
        err,
        EvalError::Function {
            function: "mapOverrideEntries".to_string(),
            fault: crate::value::Fault::type_error("unsupported operand type"),
        }
    );
}

#[test]
fn test_cost_limit_counts_nodes() {
    let env = Arc::new(composer_environment().unwrap());
    let options = ProgramOptions {
        cost_limit: Some(3),
    };
    let program = compile_with_options(env.clone(), "1 + 2", options).unwrap();
    assert_eq!(program.evaluate(&Activation::new()), Ok(Value::Int(3)));

    let program = compile_with_options(env, "1 + 2 + 3", options).unwrap();
    assert_eq!(
        program.evaluate(&Activation::new()),
        Err(EvalError::CostLimitExceeded(3))
    );
}

#[test]
fn test_cost_limit_is_not_absorbed() {
    let env = Arc::new(composer_environment().unwrap());
    let options = ProgramOptions {
        cost_limit: Some(20),
    };
    let program = compile_with_options(
        env,
        "lists.range(50).exists(x, x == 49) || true",
        options,
    )
    .unwrap();
    assert_eq!(
        program.evaluate(&Activation::new()),
        Err(EvalError::CostLimitExceeded(20))
    );
}

fn eval_limited(source: &str, limit: u64) -> EvalResult<Value> {
    let env = Arc::new(composer_environment().unwrap());
    let options = ProgramOptions {
        cost_limit: Some(limit),
    };
    let program = compile_with_options(env, source, options).unwrap();
    program.evaluate(&context().activation())
}

#[test]
fn test_cost_limit_charges_builtin_work() {
    assert_eq!(
        eval_limited(
            "size(lists.range(100000).distinct()) + size(lists.range(100000000))",
            20
        ),
        Err(EvalError::CostLimitExceeded(20))
    );

    // Two calls and a literal, plus ten elements produced and ten measured.
    assert_eq!(eval_limited("size(lists.range(10))", 23), Ok(Value::Int(10)));
    assert_eq!(
        eval_limited("size(lists.range(10))", 22),
        Err(EvalError::CostLimitExceeded(22))
    );
}

#[test]
fn test_cost_limit_charges_concatenation() {
    assert_eq!(eval_limited("'a' + 'b'", 5), Ok(Value::string("ab")));
    assert_eq!(
        eval_limited("'a' + 'b'", 4),
        Err(EvalError::CostLimitExceeded(4))
    );
    assert_eq!(
        eval_limited("request.attributes.claims.mapOverrideEntries({'x': 1}).size()", 8),
        Err(EvalError::CostLimitExceeded(8))
    );
}
