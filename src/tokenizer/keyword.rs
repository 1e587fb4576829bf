use nom::{
    bytes::complete::{take_while, take_while1},
    combinator::{map_res, recognize},
    error::context,
    sequence::pair,
};

use super::token::{ParserResult, Token};

/// Words with a meaning of their own. `in` is the membership operator; the
/// rest are reserved and rejected wherever an identifier is expected.
#[derive(
    Debug, Clone, PartialEq, strum::EnumString, strum::Display, strum::EnumIter, strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    In,
    As,
    Break,
    Const,
    Continue,
    Else,
    For,
    Function,
    If,
    Import,
    Let,
    Loop,
    Package,
    Namespace,
    Return,
    Var,
    Void,
    While,
}

/// Matches a whole word, so `index` never yields the `in` keyword.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_keyword(input: &str) -> ParserResult<Token> {
    context(
        "keyword",
        map_res(
            recognize(pair(
                take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
                take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
            )),
            |word: &str| word.parse::<Keyword>().map(Token::Keyword),
        ),
    )(input)
}
