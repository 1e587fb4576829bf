//! Token-level parsing of expressions into an [`Expr`](crate::ast::Expr) tree,
//! followed by macro expansion.

pub mod combinators;
pub mod core;
pub mod error_handling;
pub mod macros;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;
pub use macros::{expand_macros, MacroError, MacroOptions};
pub use parsers::parse_tokens;
