//! Expression grammar, from lowest to highest precedence:
//!
//! ```text
//! expr     = or ["?" or ":" expr]
//! or       = and {"||" and}
//! and      = relation {"&&" relation}
//! relation = addition {("<" | "<=" | ">" | ">=" | "==" | "!=" | "in") addition}
//! addition = product {("+" | "-") product}
//! product  = unary {("*" | "/" | "%") unary}
//! unary    = {"!" | "-"} member
//! member   = primary {"." ident ["(" args ")"] | "[" expr "]" | "{" fields "}"}
//! primary  = literal | ["."] ident ["(" args ")"] | "(" expr ")" | "[" list "]" | "{" entries "}"
//! ```

use std::cell::Cell;

use super::super::{core::*, error_handling, prelude::*};
use super::common::*;
use crate::ast::{BinaryOperator, Expr, ExprKind, UnaryOperator, MAX_EXPRESSION_DEPTH};
use crate::tokenizer::{literal::Literal, symbol::Operator, token::Token};

/// How many subexpressions (parenthesised, arguments, elements, branches)
/// may be open at once.
pub const MAX_NESTING_DEPTH: usize = 64;

thread_local! {
    static GRAMMAR: Box<dyn Parser<Token, Expr>> = Box::new(parse_conditional());
    static NESTING: Cell<usize> = const { Cell::new(0) };
}

pub fn parse_expression() -> impl Parser<Token, Expr> {
    with_context(Nested, "expression")
}

/// Enters the grammar for one subexpression. The grammar is built once per
/// thread and every level of nesting parses through the same instance.
#[derive(Clone, Copy)]
struct Nested;

impl Parser<Token, Expr> for Nested {
    fn parse(&self, input: &[Token], pos: usize) -> ParseResult<Expr> {
        let _level = NestingLevel::enter(pos)?;
        let (next, expr) = GRAMMAR.with(|grammar| grammar.parse(input, pos))?;
        if expr.depth() > MAX_EXPRESSION_DEPTH {
            return Err(too_deep(pos));
        }
        Ok((next, expr))
    }
}

/// Holds one level of [`NESTING`] until dropped.
struct NestingLevel;

impl NestingLevel {
    fn enter(pos: usize) -> Result<Self, ParseError> {
        let depth = NESTING.with(|nesting| {
            nesting.set(nesting.get() + 1);
            nesting.get()
        });
        let level = NestingLevel;
        if depth > MAX_NESTING_DEPTH {
            let message = format!(
                "expression nests more than {} levels deep",
                MAX_NESTING_DEPTH
            );
            error_handling::record_message(pos, message.clone());
            return Err(ParseError::Fail(message));
        }
        Ok(level)
    }
}

impl Drop for NestingLevel {
    fn drop(&mut self) {
        NESTING.with(|nesting| nesting.set(nesting.get().saturating_sub(1)));
    }
}

fn too_deep(position: usize) -> ParseError {
    let message = format!(
        "expression exceeds the maximum depth of {}",
        MAX_EXPRESSION_DEPTH
    );
    error_handling::record_message(position, message.clone());
    ParseError::Fail(message)
}

fn parse_conditional() -> impl Parser<Token, Expr> {
    map(
        tuple2(
            parse_logical_or(),
            optional(tuple2(
                preceded(as_unit(parse_operator(Operator::Question)), parse_logical_or()),
                preceded(parse_colon(), parse_expression()),
            )),
        ),
        |(condition, branches)| match branches {
            None => condition,
            Some((then, otherwise)) => Expr::new(
                condition.offset,
                ExprKind::Conditional {
                    condition: Box::new(condition),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
            ),
        },
    )
}

/// Builds the left-deep tree of an operator chain such as `a + b + c`.
fn fold_binary((first, rest): (Expr, Vec<(BinaryOperator, Expr)>)) -> Result<Expr, ParseError> {
    if let Some((_, right)) = rest.get(MAX_EXPRESSION_DEPTH) {
        return Err(too_deep(right.offset));
    }
    Ok(rest.into_iter().fold(first, |left, (op, right)| {
        Expr::new(
            left.offset,
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }))
}

fn binary_operator(op: Operator, binary: BinaryOperator) -> Box<dyn Parser<Token, BinaryOperator>> {
    Box::new(map(parse_operator(op), move |_| binary))
}

fn parse_logical_or() -> impl Parser<Token, Expr> {
    try_map(
        tuple2(
            parse_logical_and(),
            many(tuple2(
                map(parse_operator(Operator::Or), |_| BinaryOperator::Or),
                parse_logical_and(),
            )),
        ),
        fold_binary,
    )
}

fn parse_logical_and() -> impl Parser<Token, Expr> {
    try_map(
        tuple2(
            parse_relation(),
            many(tuple2(
                map(parse_operator(Operator::And), |_| BinaryOperator::And),
                parse_relation(),
            )),
        ),
        fold_binary,
    )
}

fn parse_relation_operator() -> impl Parser<Token, BinaryOperator> {
    choice(vec![
        binary_operator(Operator::LessEqual, BinaryOperator::LessEqual),
        binary_operator(Operator::Less, BinaryOperator::Less),
        binary_operator(Operator::GreaterEqual, BinaryOperator::GreaterEqual),
        binary_operator(Operator::Greater, BinaryOperator::Greater),
        binary_operator(Operator::EqualEqual, BinaryOperator::Equal),
        binary_operator(Operator::NotEqual, BinaryOperator::NotEqual),
        Box::new(map(parse_in_keyword(), |_| BinaryOperator::In)),
    ])
}

fn parse_relation() -> impl Parser<Token, Expr> {
    try_map(
        tuple2(
            parse_additive(),
            many(tuple2(parse_relation_operator(), parse_additive())),
        ),
        fold_binary,
    )
}

fn parse_additive() -> impl Parser<Token, Expr> {
    try_map(
        tuple2(
            parse_multiplicative(),
            many(tuple2(
                choice(vec![
                    binary_operator(Operator::Plus, BinaryOperator::Add),
                    binary_operator(Operator::Minus, BinaryOperator::Subtract),
                ]),
                parse_multiplicative(),
            )),
        ),
        fold_binary,
    )
}

fn parse_multiplicative() -> impl Parser<Token, Expr> {
    try_map(
        tuple2(
            parse_unary(),
            many(tuple2(
                choice(vec![
                    binary_operator(Operator::Multiply, BinaryOperator::Multiply),
                    binary_operator(Operator::Divide, BinaryOperator::Divide),
                    binary_operator(Operator::Modulo, BinaryOperator::Modulo),
                ]),
                parse_unary(),
            )),
        ),
        fold_binary,
    )
}

fn parse_unary_operator() -> impl Parser<Token, UnaryOperator> {
    choice(vec![
        Box::new(map(parse_operator(Operator::Not), |_| UnaryOperator::Not)),
        Box::new(map(parse_operator(Operator::Minus), |_| UnaryOperator::Negate)),
    ])
}

fn parse_unary() -> impl Parser<Token, Expr> {
    try_map(
        positioned(tuple2(many(parse_unary_operator()), parse_member())),
        |(offset, (ops, operand))| {
            if ops.len() > MAX_EXPRESSION_DEPTH {
                return Err(too_deep(offset));
            }
            Ok(ops
                .into_iter()
                .rev()
                .fold(operand, |operand, op| apply_unary(offset, op, operand)))
        },
    )
}

/// Negated number literals are folded into the literal itself.
fn apply_unary(offset: usize, op: UnaryOperator, operand: Expr) -> Expr {
    match (op, &operand.kind) {
        (UnaryOperator::Negate, ExprKind::Literal(Literal::Integer(i))) => {
            Expr::new(offset, ExprKind::Literal(Literal::Integer(-i)))
        }
        (UnaryOperator::Negate, ExprKind::Literal(Literal::Float(f))) => {
            Expr::new(offset, ExprKind::Literal(Literal::Float(-f)))
        }
        _ => Expr::new(
            offset,
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        ),
    }
}

enum MemberSuffix {
    Field {
        name: String,
        args: Option<Vec<Expr>>,
    },
    Index(Expr),
    Fields(Vec<(String, Expr)>),
}

fn parse_arguments() -> impl Parser<Token, Vec<Expr>> {
    delimited(
        parse_open_paren(),
        separated_list(parse_expression(), parse_comma()),
        parse_close_paren(),
    )
}

fn parse_member_suffix() -> impl Parser<Token, (usize, MemberSuffix)> {
    positioned(choice(vec![
        Box::new(map(
            preceded(
                parse_dot(),
                tuple2(parse_identifier(), optional(parse_arguments())),
            ),
            |(name, args)| MemberSuffix::Field { name, args },
        )),
        Box::new(map(
            delimited(
                parse_open_bracket(),
                parse_expression(),
                parse_close_bracket(),
            ),
            MemberSuffix::Index,
        )),
        Box::new(map(
            delimited(
                parse_open_brace(),
                separated_list(
                    tuple2(parse_identifier(), preceded(parse_colon(), parse_expression())),
                    parse_comma(),
                ),
                parse_close_brace(),
            ),
            MemberSuffix::Fields,
        )),
    ]))
}

fn parse_member() -> impl Parser<Token, Expr> {
    try_map(
        tuple2(parse_primary(), many(parse_member_suffix())),
        |(primary, suffixes)| {
            if let Some((position, _)) = suffixes.get(MAX_EXPRESSION_DEPTH) {
                return Err(too_deep(*position));
            }
            suffixes
                .into_iter()
                .try_fold(primary, |operand, (position, suffix)| {
                    apply_suffix(operand, position, suffix)
                })
        },
    )
}

fn apply_suffix(operand: Expr, position: usize, suffix: MemberSuffix) -> Result<Expr, ParseError> {
    let offset = operand.offset;
    let kind = match suffix {
        MemberSuffix::Field { name, args: None } => ExprKind::Select {
            operand: Box::new(operand),
            field: name,
            test_only: false,
        },
        MemberSuffix::Field {
            name,
            args: Some(args),
        } => ExprKind::Call {
            target: Some(Box::new(operand)),
            function: name,
            args,
        },
        MemberSuffix::Index(index) => ExprKind::Index {
            operand: Box::new(operand),
            index: Box::new(index),
        },
        MemberSuffix::Fields(fields) => match operand.qualified_name() {
            Some(type_name) => ExprKind::Struct { type_name, fields },
            None => {
                let message = format!("'{}' is not a message type name", operand);
                error_handling::record_message(position, message.clone());
                return Err(ParseError::Fail(message));
            }
        },
    };
    Ok(Expr::new(offset, kind))
}

fn parse_primary() -> impl Parser<Token, Expr> {
    choice(vec![
        Box::new(map(positioned(parse_literal()), |(offset, lit)| {
            Expr::new(offset, ExprKind::Literal(lit))
        })),
        Box::new(parse_ident_or_call()),
        Box::new(delimited(
            parse_open_paren(),
            parse_expression(),
            parse_close_paren(),
        )),
        Box::new(map(
            positioned(delimited(
                parse_open_bracket(),
                separated_list(parse_expression(), parse_comma()),
                parse_close_bracket(),
            )),
            |(offset, items)| Expr::new(offset, ExprKind::List(items)),
        )),
        Box::new(map(
            positioned(delimited(
                parse_open_brace(),
                separated_list(
                    tuple2(parse_expression(), preceded(parse_colon(), parse_expression())),
                    parse_comma(),
                ),
                parse_close_brace(),
            )),
            |(offset, entries)| Expr::new(offset, ExprKind::Map(entries)),
        )),
    ])
}

fn parse_ident_or_call() -> impl Parser<Token, Expr> {
    map(
        positioned(tuple3(
            optional(parse_dot()),
            parse_identifier(),
            optional(parse_arguments()),
        )),
        |(offset, (_, name, args))| match args {
            None => Expr::new(offset, ExprKind::Ident(name)),
            Some(args) => Expr::new(
                offset,
                ExprKind::Call {
                    target: None,
                    function: name,
                    args,
                },
            ),
        },
    )
}
