//! # Tokenizer Component
//!
//! Lexical analysis of expression source, turning raw text into a token
//! stream for the parser.
//!
//! Each token carries its position (byte range, line and column) so that
//! later stages can report issues at the right place. Whitespace, newlines
//! and comments are kept as tokens; the [`crate::preprocessor`] removes them
//! before parsing.
//!
//! ## Component Structure
//!
//! * [`token`]: Core token types and tokenizer implementation
//! * [`keyword`]: The `in` operator keyword and reserved words
//! * [`symbol`]: Operators and delimiters parsing
//! * [`literal`]: String, bytes and number literal parsing
//! * [`whitespace`]: Whitespace and newline handling
//! * [`comment`]: Line comments
//!
//! ## Usage Example
//!
//! ```rust
//! use spire_cel_composer::tokenizer::token::Tokenizer;
//!
//! let mut tokenizer = Tokenizer::new();
//! let tokens = tokenizer.tokenize("request.spiffe_id + '#x'").unwrap();
//! assert_eq!(tokens.len(), 7);
//! ```

pub mod comment;
pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;
