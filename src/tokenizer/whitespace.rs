//! Whitespace and newline tokens.
//!
//! Both are kept in the token stream so that line and column tracking stays
//! exact; the preprocessor drops them before parsing.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    combinator::{map, value},
    error::context,
};

use super::token::{ParserResult, Token};

/// Spaces, tabs, form feeds and carriage returns not followed by `\n`.
///
/// ```
/// # use spire_cel_composer::tokenizer::whitespace::parse_whitespace;
/// # use spire_cel_composer::tokenizer::token::Token;
/// let (rest, token) = parse_whitespace(" \t claims").unwrap();
/// assert_eq!(token, Token::Whitespace(" \t ".to_string()));
/// assert_eq!(rest, "claims");
/// ```
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_whitespace(input: &str) -> ParserResult<Token> {
    let (rest, ws) = context(
        "whitespace",
        take_while1(|c| c == ' ' || c == '\t' || c == '\x0c' || c == '\r'),
    )(input)?;

    // keep "\r\n" for parse_newline
    if ws.ends_with('\r') && rest.starts_with('\n') {
        let trimmed = &ws[..ws.len() - 1];
        if trimmed.is_empty() {
            return parse_newline(input);
        }
        return Ok((&input[trimmed.len()..], Token::Whitespace(trimmed.to_string())));
    }
    Ok((rest, Token::Whitespace(ws.to_string())))
}

/// Unix (`\n`) and Windows (`\r\n`) line endings.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_newline(input: &str) -> ParserResult<Token> {
    context(
        "newline",
        map(alt((value((), tag("\r\n")), value((), tag("\n")))), |_| {
            Token::Newline
        }),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace() {
        let (rest, token) = parse_whitespace("\t\t  x").unwrap();
        assert_eq!(token, Token::Whitespace("\t\t  ".to_string()));
        assert_eq!(rest, "x");
    }

    #[test]
    fn test_crlf_is_left_for_newline() {
        let (rest, token) = parse_whitespace("  \r\nx").unwrap();
        assert_eq!(token, Token::Whitespace("  ".to_string()));
        assert_eq!(rest, "\r\nx");

        let (rest, token) = parse_newline(rest).unwrap();
        assert_eq!(token, Token::Newline);
        assert_eq!(rest, "x");
    }

    #[test]
    fn test_error() {
        assert!(parse_whitespace("x").is_err());
        assert!(parse_newline("x").is_err());
    }
}
