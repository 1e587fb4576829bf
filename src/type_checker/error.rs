use std::fmt;

use thiserror::Error;

use crate::types::CelType;

/// Error type for type checking operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeCheckError {
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: CelType,
        found: CelType,
        location: Location,
    },

    #[error("undeclared reference to '{name}'")]
    UndefinedVariable { name: String, location: Location },

    #[error("undeclared reference to function '{name}'")]
    UndefinedFunction { name: String, location: Location },

    #[error("undefined message type '{name}'")]
    UndefinedType { name: String, location: Location },

    #[error("undefined field '{field}' on {type_name}")]
    UndefinedField {
        type_name: String,
        field: String,
        location: Location,
    },

    #[error("found no matching overload for '{function}' applied to ({arguments})")]
    NoMatchingOverload {
        function: String,
        arguments: String,
        location: Location,
    },

    #[error("unsupported map key type: {key_type}")]
    InvalidMapKey { key_type: CelType, location: Location },

    #[error("{message}")]
    InvalidExpression { message: String, location: Location },
}

impl TypeCheckError {
    pub fn location(&self) -> &Location {
        match self {
            Self::TypeMismatch { location, .. }
            | Self::UndefinedVariable { location, .. }
            | Self::UndefinedFunction { location, .. }
            | Self::UndefinedType { location, .. }
            | Self::UndefinedField { location, .. }
            | Self::NoMatchingOverload { location, .. }
            | Self::InvalidMapKey { location, .. }
            | Self::InvalidExpression { location, .. } => location,
        }
    }

    pub fn type_mismatch(expected: CelType, found: CelType, location: Location) -> Self {
        Self::TypeMismatch {
            expected,
            found,
            location,
        }
    }

    pub fn no_matching_overload(function: &str, arguments: &[CelType], location: Location) -> Self {
        Self::NoMatchingOverload {
            function: function.to_string(),
            arguments: arguments
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            location,
        }
    }

    pub fn invalid(message: impl Into<String>, location: Location) -> Self {
        Self::InvalidExpression {
            message: message.into(),
            location,
        }
    }
}

/// Location information for error reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Result type for type checking operations
pub type TypeCheckResult<T> = Result<T, TypeCheckError>;
