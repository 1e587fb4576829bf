pub mod common;
pub mod expression;

pub use common::*;

use super::{core::*, error_handling};
use crate::ast::Expr;
use crate::tokenizer::token::Token;

/// Parses a whole token stream as a single expression. Trailing tokens are
/// an error.
#[tracing::instrument(level = "debug", skip(tokens))]
pub fn parse_tokens(tokens: &[Token]) -> Result<Expr, ParseError> {
    error_handling::reset();
    let result = expression::parse_expression().parse(tokens, 0);
    let failure = error_handling::take();

    let stopped_at = match result {
        Ok((pos, expr)) if pos == tokens.len() => return Ok(expr),
        Ok((pos, _)) => pos,
        Err(_) => 0,
    };

    let failure = failure
        .filter(|f| f.position >= stopped_at)
        .unwrap_or(error_handling::Failure {
            position: stopped_at,
            ..Default::default()
        });

    Err(describe_failure(tokens, failure))
}

fn describe_failure(tokens: &[Token], failure: error_handling::Failure) -> ParseError {
    let found = tokens
        .get(failure.position)
        .map(|t| t.to_string())
        .unwrap_or_default();

    let message = match (failure.message, tokens.get(failure.position)) {
        (Some(message), _) => message,
        (None, None) => "unexpected end of expression".to_string(),
        (None, Some(token)) => {
            let expected = &failure.expected;
            if expected.is_empty() || expected.len() > 4 {
                format!("unexpected token '{}'", token)
            } else {
                format!(
                    "unexpected token '{}', expected {}",
                    token,
                    expected.join(" or ")
                )
            }
        }
    };

    ParseError::ParseError {
        message,
        found,
        position: failure.position,
    }
}

#[cfg(test)]
mod tests;
