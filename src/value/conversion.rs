use std::fmt;

use thiserror::Error;

/// Dotted location of a field inside a converted document, e.g.
/// `attributes.claims.groups[2]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("{path}: expected {expected}, found {found}")]
    UnexpectedType {
        path: FieldPath,
        expected: String,
        found: String,
    },
    #[error("{path}: unknown field for {type_name}")]
    UnknownField { path: FieldPath, type_name: String },
    #[error("{path}: map key {key} is not a string")]
    NonStringKey { path: FieldPath, key: String },
    #[error("{path}: number {value} cannot be represented")]
    UnrepresentableNumber { path: FieldPath, value: String },
    #[error("{path}: evaluation produced an error: {message}")]
    ErrorValue { path: FieldPath, message: String },
}

impl ConversionError {
    pub fn path(&self) -> &FieldPath {
        match self {
            ConversionError::UnexpectedType { path, .. }
            | ConversionError::UnknownField { path, .. }
            | ConversionError::NonStringKey { path, .. }
            | ConversionError::UnrepresentableNumber { path, .. }
            | ConversionError::ErrorValue { path, .. } => path,
        }
    }
}

pub type ConversionResult<T> = Result<T, ConversionError>;
