use super::parse_tokens;
use crate::analyzer::ParseError;
use crate::ast::{BinaryOperator, Expr, ExprKind};
use crate::preprocessor::{Preprocessor, TokenPreprocessor};
use crate::tokenizer::{literal::Literal, token::Tokenizer};

fn parse(source: &str) -> Result<Expr, ParseError> {
    let spans = Tokenizer::new().tokenize(source).unwrap();
    let tokens: Vec<_> = TokenPreprocessor::new()
        .process(spans)
        .into_iter()
        .map(|span| span.token)
        .collect();
    parse_tokens(&tokens)
}

fn render(source: &str) -> String {
    parse(source).unwrap().to_string()
}

#[test]
fn test_precedence() {
    assert_eq!(render("a + b * c"), "(a + (b * c))");
    assert_eq!(render("a || b && c"), "(a || (b && c))");
    assert_eq!(render("a - b - c"), "((a - b) - c)");
    assert_eq!(render("x in [1, 2] && !y"), "((x in [1, 2]) && !y)");
    assert_eq!(render("a < b == c"), "((a < b) == c)");
}

#[test]
fn test_conditional_is_right_associative() {
    assert_eq!(render("a ? b : c ? d : e"), "(a ? b : (c ? d : e))");
}

#[test]
fn test_member_chain() {
    assert_eq!(
        render("request.attributes.claims.mapOverrideEntries({'jti': uuidgen()})"),
        "request.attributes.claims.mapOverrideEntries({\"jti\": uuidgen()})"
    );
    assert_eq!(render("m['k'][0].size()"), "m[\"k\"][0].size()");
}

#[test]
fn test_struct_construction() {
    let expr = parse("a.b.Msg{x: 1, y: [2],}").unwrap();
    let ExprKind::Struct { type_name, fields } = expr.kind else {
        panic!("expected struct, got {:?}", expr.kind);
    };
    assert_eq!(type_name, "a.b.Msg");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].0, "x");
}

#[test]
fn test_negative_literals_fold() {
    let expr = parse("-5").unwrap();
    assert_eq!(expr.kind, ExprKind::Literal(Literal::Integer(-5)));

    let expr = parse("-x").unwrap();
    assert!(matches!(expr.kind, ExprKind::Unary { .. }));

    let expr = parse("1 - -2").unwrap();
    let ExprKind::Binary { op, right, .. } = expr.kind else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOperator::Subtract);
    assert_eq!(right.kind, ExprKind::Literal(Literal::Integer(-2)));
}

#[test]
fn test_offsets_point_at_tokens() {
    let expr = parse("a + b").unwrap();
    let ExprKind::Binary { left, right, .. } = expr.kind else {
        panic!("expected binary");
    };
    assert_eq!(left.offset, 0);
    assert_eq!(right.offset, 2);
}

#[test]
fn test_syntax_errors() {
    let err = parse("a +").unwrap_err();
    assert!(matches!(
        err,
        ParseError::ParseError { ref message, .. } if message == "unexpected end of expression"
    ));

    let err = parse("f(1, 2").unwrap_err();
    assert!(matches!(err, ParseError::ParseError { .. }));

    let err = parse("a b").unwrap_err();
    let ParseError::ParseError { found, position, .. } = err else {
        panic!("expected positioned error");
    };
    assert_eq!(found, "b");
    assert_eq!(position, 1);

    let err = parse("f(){x: 1}").unwrap_err();
    let ParseError::ParseError { message, .. } = err else {
        panic!("expected positioned error");
    };
    assert!(message.contains("not a message type name"));
}

#[test]
fn test_reserved_word_is_not_identifier() {
    assert!(parse("if + 1").is_err());
}

fn message_of(err: ParseError) -> String {
    match err {
        ParseError::ParseError { message, .. } => message,
        other => panic!("expected positioned error, got {:?}", other),
    }
}

#[test]
fn test_nesting_limit() {
    let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(render(&nested(50)), "1");

    let err = parse(&nested(200)).unwrap_err();
    let ParseError::ParseError {
        message, position, ..
    } = err
    else {
        panic!("expected positioned error");
    };
    assert_eq!(message, "expression nests more than 64 levels deep");
    assert_eq!(position, 64);

    let calls = format!("{}x{}", "f(".repeat(100), ")".repeat(100));
    assert!(message_of(parse(&calls).unwrap_err()).contains("nests more than"));
}

#[test]
fn test_operator_chain_limit() {
    let chain = |terms: usize| vec!["a"; terms].join(" + ");
    assert_eq!(parse(&chain(100)).unwrap().depth(), 100);
    assert_eq!(
        message_of(parse(&chain(101)).unwrap_err()),
        "expression exceeds the maximum depth of 100"
    );
    assert!(message_of(parse(&chain(5000)).unwrap_err()).contains("maximum depth"));

    let negations = format!("{}true", "!".repeat(500));
    assert!(message_of(parse(&negations).unwrap_err()).contains("maximum depth"));

    let selects = format!("a{}", ".b".repeat(500));
    assert!(message_of(parse(&selects).unwrap_err()).contains("maximum depth"));
}

#[test]
fn test_depth_counts_across_nesting() {
    let inner = vec!["a"; 60].join(" + ");
    let source = format!("({}) * ({}) + {}", inner, inner, vec!["a"; 60].join(" * "));
    assert!(parse(&source).is_ok());

    let source = format!("[{}] + [({}) * 2]", inner, vec!["a"; 99].join(" - "));
    assert!(message_of(parse(&source).unwrap_err()).contains("maximum depth"));
}
