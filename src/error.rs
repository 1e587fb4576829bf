use strum_macros::Display;
use thiserror::Error;

use crate::config::ConfigError;
use crate::env::EnvironmentError;
use crate::eval::EvalError;
use crate::program::CompileError;
use crate::value::ConversionError;

/// Host-facing classification of a failure, so a transport can map it to
/// its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StatusCode {
    InvalidArgument,
    FailedPrecondition,
    Unimplemented,
    Internal,
}

#[derive(Error, Debug)]
pub enum ComposerError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load cel environment: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("Failed to compile cel expression: {0}")]
    Compile(#[from] CompileError),

    #[error("not configured")]
    NotConfigured,

    #[error("Failed to evaluate cel expression: {0}")]
    Eval(#[from] EvalError),

    #[error("Failed to parse return type: {0}")]
    Conversion(#[from] ConversionError),

    #[error("{operation}: not implemented")]
    Unimplemented { operation: &'static str },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ComposerResult<T> = Result<T, ComposerError>;

impl ComposerError {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        ComposerError::Internal(message.into())
    }

    pub fn code(&self) -> StatusCode {
        match self {
            ComposerError::Config(_)
            | ComposerError::Environment(_)
            | ComposerError::Compile(_)
            | ComposerError::Eval(_)
            | ComposerError::Conversion(_) => StatusCode::InvalidArgument,
            ComposerError::NotConfigured => StatusCode::FailedPrecondition,
            ComposerError::Unimplemented { .. } => StatusCode::Unimplemented,
            ComposerError::Internal(_) => StatusCode::Internal,
        }
    }

    /// The pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            ComposerError::Config(_) => "configuration",
            ComposerError::Environment(_) => "environment",
            ComposerError::Compile(_) => "compile",
            ComposerError::NotConfigured => "lookup",
            ComposerError::Eval(_) => "evaluation",
            ComposerError::Conversion(_) => "conversion",
            ComposerError::Unimplemented { .. } => "dispatch",
            ComposerError::Internal(_) => "internal",
        }
    }
}
