use super::*;
use crate::analyzer::{expand_macros, parse_tokens};
use crate::env::composer_environment;
use crate::preprocessor::{Preprocessor, TokenPreprocessor};
use crate::schema::{REQUEST_TYPE, RESPONSE_TYPE};
use crate::tokenizer::token::Tokenizer;

fn check(source: &str) -> Result<CheckedExpr, Vec<TypeCheckError>> {
    let env = composer_environment().unwrap();
    let spans = TokenPreprocessor::new().process(Tokenizer::new().tokenize(source).unwrap());
    let locations: Vec<Location> = spans
        .iter()
        .map(|s| Location {
            line: s.line,
            column: s.column,
        })
        .collect();
    let tokens: Vec<_> = spans.into_iter().map(|s| s.token).collect();
    let mut expr = expand_macros(parse_tokens(&tokens).unwrap(), env.macro_options()).unwrap();
    expr.assign_ids(&mut 0);
    run_type_checker(&env, expr, &locations)
}

fn result_type(source: &str) -> CelType {
    match check(source) {
        Ok(checked) => checked.result_type,
        Err(errors) => panic!("{}: {:?}", source, errors),
    }
}

#[test]
fn test_literal_and_operator_types() {
    assert_eq!(result_type("1 + 2"), CelType::Int);
    assert_eq!(result_type("1u * 2u"), CelType::Uint);
    assert_eq!(result_type("'a' + 'b'"), CelType::String);
    assert_eq!(result_type("1 < 2.5"), CelType::Bool);
    assert_eq!(result_type("[1] + [2]"), CelType::list(CelType::Int));
    assert_eq!(result_type("true ? 'x' : 'y'"), CelType::String);
}

#[test]
fn test_variables_and_fields() {
    assert_eq!(result_type("trust_domain"), CelType::String);
    assert_eq!(result_type("request"), CelType::message(REQUEST_TYPE));
    assert_eq!(result_type("request.spiffe_id"), CelType::String);
    assert_eq!(
        result_type("request.attributes.claims"),
        CelType::map(CelType::String, CelType::Dyn)
    );
    assert_eq!(result_type("request.attributes.claims.sub"), CelType::Dyn);
    assert_eq!(result_type("has(request.attributes)"), CelType::Bool);
}

#[test]
fn test_builtins() {
    assert_eq!(result_type("uuidgen()"), CelType::String);
    assert_eq!(
        result_type("request.attributes.claims.mapOverrideEntries({'jti': uuidgen()})"),
        CelType::map(CelType::String, CelType::Dyn)
    );
    assert_eq!(
        result_type("mapOverrideEntries({'a': 1}, {'b': 2})"),
        CelType::map(CelType::String, CelType::Int)
    );
}

#[test]
fn test_message_construction() {
    let source = format!(
        "{}{{attributes: {}{{claims: request.attributes.claims}}}}",
        RESPONSE_TYPE,
        crate::schema::ATTRIBUTES_TYPE
    );
    assert_eq!(result_type(&source), CelType::message(RESPONSE_TYPE));
}

#[test]
fn test_extensions_and_macros() {
    assert_eq!(result_type("strings.quote(trust_domain)"), CelType::String);
    assert_eq!(result_type("lists.range(3)"), CelType::list(CelType::Int));
    assert_eq!(result_type("'a,b'.split(',').join('-')"), CelType::String);
    assert_eq!(result_type("[1, 2].map(x, x * 2)"), CelType::list(CelType::Int));
    assert_eq!(
        result_type("{'a': 1}.transformMap(k, v, v + 1)"),
        CelType::map(CelType::String, CelType::Int)
    );
    assert_eq!(
        result_type("cel.bind(td, trust_domain, td + '/x')"),
        CelType::String
    );
    assert_eq!(result_type("[1, 2].exists(x, x > 1)"), CelType::Bool);
}

#[test]
fn test_calls_are_resolved() {
    let checked = check("size(trust_domain)").unwrap();
    let call = checked.calls.values().next().unwrap();
    assert_eq!(call.function, "size");
    assert_eq!(call.overloads, vec!["size_string".to_string()]);
    assert!(!call.receiver);
}

#[test]
fn test_all_errors_are_collected() {
    let errors = check("uuidgen(1) + missing + request.nope").unwrap_err();
    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[0], TypeCheckError::NoMatchingOverload { .. }));
    assert!(matches!(errors[1], TypeCheckError::UndefinedVariable { .. }));
    assert!(matches!(errors[2], TypeCheckError::UndefinedField { .. }));
}

#[test]
fn test_error_locations() {
    let errors = check("trust_domain +\n  missing").unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].location(), &Location { line: 2, column: 3 });
}

#[test]
fn test_rejected_expressions() {
    assert!(check("1 + 'a'").is_err());
    assert!(check("mapOverrideEntries(1, {})").is_err());
    assert!(check("true ? 1 : 'a'").is_err());
    assert!(check("{[1]: 2}").is_err());
    assert!(check("a.b.Unknown{x: 1}").is_err());
    assert!(check("1 ? 2 : 3").is_err());
    assert!(check("'abc'.missing()").is_err());
}
