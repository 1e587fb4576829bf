//! Evaluation of checked expressions.
//!
//! * [`context`]: variable bindings and the per-request composer inputs
//! * [`interpreter`]: the tree-walking evaluator

pub mod context;
pub mod interpreter;

pub use context::{Activation, EvaluationContext};
pub use interpreter::Interpreter;

use thiserror::Error;

use crate::value::{Fault, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("no such attribute: '{0}'")]
    UnboundVariable(String),

    #[error("no such field '{field}' on {type_name}")]
    NoSuchField { type_name: String, field: String },

    #[error("no such key: {0}")]
    NoSuchKey(String),

    #[error("index out of range: {index} (size {len})")]
    IndexOutOfRange { index: String, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulus by zero")]
    ModulusByZero,

    #[error("integer overflow in '{0}'")]
    Overflow(String),

    #[error("no matching overload for '{function}' applied to ({arguments})")]
    NoMatchingOverload { function: String, arguments: String },

    #[error("{function}: {fault}")]
    Function { function: String, fault: Fault },

    #[error("evaluation cost limit of {0} exceeded")]
    CostLimitExceeded(u64),

    #[error("type error: {0}")]
    Type(String),

    #[error("{0}")]
    Runtime(String),
}

impl EvalError {
    pub fn no_matching_overload(function: &str, args: &[&Value]) -> Self {
        Self::NoMatchingOverload {
            function: function.to_string(),
            arguments: args
                .iter()
                .map(|v| v.type_name().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<Fault> for EvalError {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Type(message) => EvalError::Type(message),
            Fault::Runtime(message) => EvalError::Runtime(message),
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests;
