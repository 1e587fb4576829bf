//! Compilation of expression source into a reusable [`Program`].
//!
//! ```text
//! source → Tokenizer → TokenPreprocessor → parse_tokens → expand_macros → type checker
//! ```
//!
//! Each stage reports into one [`CompileError`]; a program that compiled
//! is evaluated any number of times, from any number of threads, without
//! going through these stages again.

use std::fmt;
use std::sync::Arc;

use strum_macros::Display;
use thiserror::Error;
use tracing::debug;

use crate::analyzer::{expand_macros, parse_tokens, ParseError};
use crate::env::Environment;
use crate::eval::{Activation, EvalResult, Interpreter};
use crate::preprocessor::{Preprocessor, TokenPreprocessor};
use crate::tokenizer::token::{TokenSpan, Tokenizer, TokenizerError};
use crate::type_checker::{run_type_checker, CheckedExpr, Location};
use crate::types::CelType;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramOptions {
    /// Maximum number of evaluation steps per call; unbounded when `None`.
    pub cost_limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum IssueKind {
    #[strum(serialize = "syntax")]
    Syntax,
    #[strum(serialize = "type")]
    Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
    pub location: Location,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error at {}: {}", self.kind, self.location, self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub struct CompileError {
    pub issues: Vec<Issue>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let issues: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", issues.join("; "))
    }
}

impl CompileError {
    fn single(kind: IssueKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            issues: vec![Issue {
                kind,
                message: message.into(),
                location,
            }],
        }
    }
}

/// A checked expression bound to the environment it was compiled against.
pub struct Program {
    env: Arc<Environment>,
    checked: CheckedExpr,
    options: ProgramOptions,
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("result_type", &self.checked.result_type)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Program {
    pub fn result_type(&self) -> &CelType {
        &self.checked.result_type
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    pub fn evaluate(&self, activation: &Activation) -> EvalResult<Value> {
        let interpreter = Interpreter::new(&self.env, &self.checked, self.options.cost_limit);
        let result = interpreter.evaluate(activation);
        debug!(cost = interpreter.cost(), ok = result.is_ok(), "expression evaluated");
        result
    }
}

pub fn compile(env: Arc<Environment>, source: &str) -> Result<Program, CompileError> {
    compile_with_options(env, source, ProgramOptions::default())
}

#[tracing::instrument(level = "debug", skip(env, source))]
pub fn compile_with_options(
    env: Arc<Environment>,
    source: &str,
    options: ProgramOptions,
) -> Result<Program, CompileError> {
    let spans = Tokenizer::new().tokenize(source).map_err(tokenizer_issue)?;
    let spans: Vec<TokenSpan> = TokenPreprocessor::new().process(spans);
    let locations: Vec<Location> = spans.iter().map(span_location).collect();
    let tokens: Vec<_> = spans.into_iter().map(|span| span.token).collect();
    if tokens.is_empty() {
        return Err(CompileError::single(
            IssueKind::Syntax,
            "empty expression",
            Location { line: 1, column: 1 },
        ));
    }

    let location_at = |offset: usize| {
        locations
            .get(offset)
            .or(locations.last())
            .copied()
            .unwrap_or_default()
    };

    let expr = parse_tokens(&tokens).map_err(|e| {
        let (message, position) = match e {
            ParseError::ParseError {
                message, position, ..
            } => (message, position),
            other => (other.to_string(), tokens.len()),
        };
        CompileError::single(IssueKind::Syntax, message, location_at(position))
    })?;

    let mut expr = expand_macros(expr, env.macro_options()).map_err(|errors| CompileError {
        issues: errors
            .into_iter()
            .map(|e| Issue {
                kind: IssueKind::Syntax,
                location: location_at(e.offset),
                message: e.message,
            })
            .collect(),
    })?;
    expr.assign_ids(&mut 0);

    let checked = run_type_checker(&env, expr, &locations).map_err(|errors| CompileError {
        issues: errors
            .into_iter()
            .map(|e| Issue {
                kind: IssueKind::Type,
                location: *e.location(),
                message: e.to_string(),
            })
            .collect(),
    })?;

    debug!(result_type = %checked.result_type, "expression compiled");
    Ok(Program {
        env,
        checked,
        options,
    })
}

fn span_location(span: &TokenSpan) -> Location {
    Location {
        line: span.line,
        column: span.column,
    }
}

fn tokenizer_issue(error: TokenizerError) -> CompileError {
    match error {
        TokenizerError::ParseError { message, span, .. } => CompileError::single(
            IssueKind::Syntax,
            message,
            Location {
                line: span.line,
                column: span.column,
            },
        ),
    }
}
