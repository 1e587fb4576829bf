//! String, bytes and number literals.
//!
//! Strings may be quoted with `"` or `'`, tripled for multi-line text, and
//! prefixed with `r` (raw, no escapes) and/or `b` (bytes). Numbers are
//! unsigned in the token stream; a leading `-` is an operator.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1, take_while_m_n},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize},
    error::{context, VerboseError, VerboseErrorKind},
    sequence::{pair, preceded, tuple},
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Bytes(Vec<u8>),
    Integer(i64),
    UInteger(u64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::UInteger(u) => write!(f, "{}u", u),
            Literal::Float(v) => write!(f, "{:?}", v),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

fn failure<'a, T>(input: &'a str, message: &'static str) -> ParserResult<'a, T> {
    Err(nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(message))],
    }))
}

enum Escaped {
    Char(char),
    Byte(u8),
}

/// Decodes the escape sequence following a backslash.
fn parse_escape(input: &str) -> ParserResult<Escaped> {
    let Some(c) = input.chars().next() else {
        return failure(input, "unterminated escape sequence");
    };
    let rest = &input[c.len_utf8()..];
    let simple = match c {
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        'a' => Some('\x07'),
        'b' => Some('\x08'),
        'f' => Some('\x0c'),
        'v' => Some('\x0b'),
        '\\' | '\'' | '"' | '`' | '?' => Some(c),
        _ => None,
    };
    if let Some(decoded) = simple {
        return Ok((rest, Escaped::Char(decoded)));
    }

    let hex = |n: usize| {
        take_while_m_n::<_, _, VerboseError<&str>>(n, n, |c: char| c.is_ascii_hexdigit())
    };
    match c {
        'x' | 'X' => match hex(2)(rest) {
            Ok((after, digits)) => match u8::from_str_radix(digits, 16) {
                Ok(byte) => Ok((after, Escaped::Byte(byte))),
                Err(_) => failure(input, "invalid hex escape"),
            },
            Err(_) => failure(input, "invalid hex escape"),
        },
        'u' | 'U' => {
            let width = if c == 'u' { 4 } else { 8 };
            match hex(width)(rest) {
                Ok((after, digits)) => match u32::from_str_radix(digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                {
                    Some(decoded) => Ok((after, Escaped::Char(decoded))),
                    None => failure(input, "invalid unicode escape"),
                },
                Err(_) => failure(input, "invalid unicode escape"),
            }
        }
        '0'..='3' => match take_while_m_n::<_, _, VerboseError<&str>>(3, 3, |c: char| {
            ('0'..='7').contains(&c)
        })(input)
        {
            Ok((after, digits)) => match u8::from_str_radix(digits, 8) {
                Ok(byte) => Ok((after, Escaped::Byte(byte))),
                Err(_) => failure(input, "invalid octal escape"),
            },
            Err(_) => failure(input, "invalid octal escape"),
        },
        _ => failure(input, "invalid escape sequence"),
    }
}

/// Scans the body of a quoted literal up to and including the closing quote.
fn parse_quoted_body<'a>(
    input: &'a str,
    quote: &str,
    raw: bool,
    bytes: bool,
) -> ParserResult<'a, Vec<u8>> {
    let mut out = Vec::new();
    let mut rest = input;
    loop {
        if let Some(after) = rest.strip_prefix(quote) {
            return Ok((after, out));
        }
        let Some(c) = rest.chars().next() else {
            return failure(input, "unterminated string literal");
        };
        if quote.len() == 1 && (c == '\n' || c == '\r') {
            return failure(rest, "newline in string literal");
        }
        if c == '\\' && !raw {
            let (after, escaped) = parse_escape(&rest[1..])?;
            match escaped {
                Escaped::Byte(b) if bytes => out.push(b),
                Escaped::Byte(b) => push_char(&mut out, char::from(b)),
                Escaped::Char(decoded) => push_char(&mut out, decoded),
            }
            rest = after;
            continue;
        }
        push_char(&mut out, c);
        rest = &rest[c.len_utf8()..];
    }
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    let (rest, prefix) = recognize(opt(alt((
        tag_no_case("br"),
        tag_no_case("rb"),
        tag_no_case("b"),
        tag_no_case("r"),
    ))))(input)?;
    let (rest, quote) = context(
        "string quote",
        alt((tag("\"\"\""), tag("'''"), tag("\""), tag("'"))),
    )(rest)?;

    let raw = prefix.contains(['r', 'R']);
    let is_bytes = prefix.contains(['b', 'B']);
    let (rest, content) = parse_quoted_body(rest, quote, raw, is_bytes)?;

    if is_bytes {
        return Ok((rest, Literal::Bytes(content)));
    }
    match String::from_utf8(content) {
        Ok(text) => Ok((rest, Literal::String(text))),
        Err(_) => failure(input, "invalid UTF-8 in string literal"),
    }
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_hex_literal(input: &str) -> ParserResult<Literal> {
    let (rest, (digits, unsigned)) = preceded(
        tag_no_case("0x"),
        pair(
            take_while1(|c: char| c.is_ascii_hexdigit()),
            opt(one_of("uU")),
        ),
    )(input)?;
    integer_literal(input, rest, digits, 16, unsigned.is_some())
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_float_literal(input: &str) -> ParserResult<Literal> {
    let exponent = || tuple((one_of("eE"), opt(one_of("+-")), digit1));
    let (rest, text) = context(
        "float literal",
        alt((
            recognize(tuple((digit1, char('.'), digit1, opt(exponent())))),
            recognize(pair(digit1, exponent())),
        )),
    )(input)?;
    match text.parse::<f64>() {
        Ok(v) => Ok((rest, Literal::Float(v))),
        Err(_) => failure(input, "invalid float literal"),
    }
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_decimal_literal(input: &str) -> ParserResult<Literal> {
    let (rest, (digits, unsigned)) =
        context("integer literal", pair(digit1, opt(one_of("uU"))))(input)?;
    integer_literal(input, rest, digits, 10, unsigned.is_some())
}

fn integer_literal<'a>(
    input: &'a str,
    rest: &'a str,
    digits: &str,
    radix: u32,
    unsigned: bool,
) -> ParserResult<'a, Literal> {
    if unsigned {
        match u64::from_str_radix(digits, radix) {
            Ok(v) => Ok((rest, Literal::UInteger(v))),
            Err(_) => failure(input, "unsigned integer literal out of range"),
        }
    } else {
        match i64::from_str_radix(digits, radix) {
            Ok(v) => Ok((rest, Literal::Integer(v))),
            Err(_) => failure(input, "integer literal out of range"),
        }
    }
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((
                parse_string_literal,
                parse_hex_literal,
                parse_float_literal,
                parse_decimal_literal,
            )),
            Token::Literal,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(input: &str) -> Literal {
        let (rest, lit) = parse_string_literal(input).unwrap();
        assert_eq!(rest, "");
        lit
    }

    #[test]
    fn test_simple_strings() {
        assert_eq!(string("\"hello world\""), Literal::String("hello world".into()));
        assert_eq!(string("'jti'"), Literal::String("jti".into()));
        assert_eq!(string("\"it's\""), Literal::String("it's".into()));
    }

    #[test]
    fn test_escapes() {
        assert_eq!(string(r#""a\nb\t\"c\"""#), Literal::String("a\nb\t\"c\"".into()));
        assert_eq!(string(r#""\x41\101é""#), Literal::String("AAé".into()));
        assert_eq!(string(r#"r"\n""#), Literal::String("\\n".into()));
    }

    #[test]
    fn test_triple_quoted() {
        assert_eq!(
            string("'''line one\nline \"two\"'''"),
            Literal::String("line one\nline \"two\"".into())
        );
    }

    #[test]
    fn test_bytes() {
        assert_eq!(string(r#"b"\xff\x00a""#), Literal::Bytes(vec![0xff, 0x00, b'a']));
        assert_eq!(string("b'é'"), Literal::Bytes("é".as_bytes().to_vec()));
    }

    #[test]
    fn test_string_failures() {
        assert!(matches!(parse_string_literal("\"open"), Err(nom::Err::Failure(_))));
        assert!(matches!(parse_string_literal("\"a\nb\""), Err(nom::Err::Failure(_))));
        assert!(matches!(parse_string_literal(r#""\q""#), Err(nom::Err::Failure(_))));
        // a lone prefix is an identifier, not a broken literal
        assert!(matches!(parse_string_literal("b + 1"), Err(nom::Err::Error(_))));
    }

    #[test]
    fn test_number_literals() {
        let (rest, result) = parse_literal("123").unwrap();
        assert_eq!(result, Token::Literal(Literal::Integer(123)));
        assert_eq!(rest, "");

        let (_, result) = parse_literal("42u").unwrap();
        assert_eq!(result, Token::Literal(Literal::UInteger(42)));

        let (_, result) = parse_literal("0xFF").unwrap();
        assert_eq!(result, Token::Literal(Literal::Integer(255)));

        let (_, result) = parse_literal("123.45").unwrap();
        assert_eq!(result, Token::Literal(Literal::Float(123.45)));

        let (_, result) = parse_literal("1e3").unwrap();
        assert_eq!(result, Token::Literal(Literal::Float(1000.0)));

        let (rest, result) = parse_literal("1.size").unwrap();
        assert_eq!(result, Token::Literal(Literal::Integer(1)));
        assert_eq!(rest, ".size");
    }

    #[test]
    fn test_integer_overflow() {
        assert!(matches!(
            parse_literal("99999999999999999999"),
            Err(nom::Err::Failure(_))
        ));
    }
}
