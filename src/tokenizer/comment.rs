use nom::{
    bytes::complete::tag, character::complete::not_line_ending, combinator::map, error::context,
    sequence::preceded,
};

use super::token::{ParserResult, Token};

/// `// ...` up to the end of the line. The expression language has no block
/// comments.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_comment(input: &str) -> ParserResult<Token> {
    context(
        "line comment",
        map(preceded(tag("//"), not_line_ending), |content: &str| {
            Token::Comment(content.trim().to_string())
        }),
    )(input)
}
