use super::super::{core::*, prelude::*};
use crate::tokenizer::{
    keyword::Keyword,
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::Token,
};

// Basic token parsers. Each one is tracked so that a failed parse can name
// what was expected at the furthest position reached.

pub fn parse_identifier() -> impl Parser<Token, String> {
    tracked(
        satisfy(|token: &Token| match token {
            Token::Identifier(s) => Some(s.clone()),
            _ => None,
        }),
        "identifier",
    )
}

pub fn parse_literal() -> impl Parser<Token, Literal> {
    tracked(
        satisfy(|token: &Token| match token {
            Token::Literal(lit) => Some(lit.clone()),
            _ => None,
        }),
        "literal",
    )
}

pub fn parse_operator(op: Operator) -> impl Parser<Token, Token> {
    let expected = format!("'{}'", op);
    tracked(equal(Token::Operator(op)), expected)
}

pub fn parse_delimiter(delimiter: Delimiter) -> impl Parser<Token, Token> {
    let expected = format!("'{}'", delimiter);
    tracked(equal(Token::Delimiter(delimiter)), expected)
}

pub fn parse_in_keyword() -> impl Parser<Token, Token> {
    tracked(equal(Token::Keyword(Keyword::In)), "'in'")
}

pub fn parse_dot() -> impl Parser<Token, ()> {
    as_unit(parse_operator(Operator::Dot))
}

pub fn parse_comma() -> impl Parser<Token, ()> {
    as_unit(parse_delimiter(Delimiter::Comma))
}

pub fn parse_colon() -> impl Parser<Token, ()> {
    as_unit(parse_delimiter(Delimiter::Colon))
}

pub fn parse_open_paren() -> impl Parser<Token, ()> {
    as_unit(parse_delimiter(Delimiter::OpenParen))
}

pub fn parse_close_paren() -> impl Parser<Token, ()> {
    as_unit(parse_delimiter(Delimiter::CloseParen))
}

pub fn parse_open_bracket() -> impl Parser<Token, ()> {
    as_unit(parse_delimiter(Delimiter::OpenBracket))
}

pub fn parse_close_bracket() -> impl Parser<Token, ()> {
    as_unit(parse_delimiter(Delimiter::CloseBracket))
}

pub fn parse_open_brace() -> impl Parser<Token, ()> {
    as_unit(parse_delimiter(Delimiter::OpenBrace))
}

pub fn parse_close_brace() -> impl Parser<Token, ()> {
    as_unit(parse_delimiter(Delimiter::CloseBrace))
}
