use thiserror::Error;

/// A parser over a slice of tokens. `pos` is the index of the next token;
/// on success the parser returns the index after what it consumed.
pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

pub type ParseResult<O> = Result<(usize, O), ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Syntax error: {message}")]
    ParseError {
        message: String,
        found: String,
        position: usize,
    },
    #[error("Unexpected end of expression")]
    UnexpectedEOF,
    #[error("EOF")]
    EOF,
    #[error("No alternative")]
    NoAlternative,
    #[error("Fail: {0}")]
    Fail(String),
    #[error("{message}: {inner}")]
    WithContext {
        message: String,
        inner: Box<ParseError>,
    },
}
