pub mod checker;
mod error;
pub mod scope;

#[cfg(test)]
mod tests;

pub use checker::TypeChecker;
pub use error::{Location, TypeCheckError, TypeCheckResult};
pub use scope::TypeScope;

use std::collections::HashMap;

use crate::ast::{Expr, ExprId};
use crate::env::Environment;
use crate::types::CelType;

/// Expression Type Checker
///
/// The checker sits between macro expansion and evaluation. It walks the
/// expanded tree once, against a fixed [`Environment`], and:
///
/// ## Type Validation
/// - Resolves identifiers to comprehension variables, `cel.bind` locals or
///   declared environment variables
/// - Validates field selection against registered message schemas
/// - Validates message construction (known type, known fields, assignable
///   values)
/// - Checks operator operand types, branch compatibility of `?:` and
///   comprehension ranges
///
/// ## Overload Resolution
/// - Matches every call against the declared overloads of its function,
///   binding type parameters such as `A` in `list(A)`
/// - Resolves namespaced globals like `strings.quote(x)`, where the target
///   is a namespace and not a value
/// - Records the surviving candidates per call in [`CheckedExpr::calls`];
///   the interpreter dispatches among them on runtime argument values
///
/// ## Error Collection
/// Errors do not stop the walk. A failing sub-expression is typed as
/// [`CelType::Error`], which unifies with everything so that one mistake is
/// reported once, and all errors are returned together.
///
/// # Example
/// ```
/// use spire_cel_composer::env::composer_environment;
/// use spire_cel_composer::program::compile;
///
/// let env = std::sync::Arc::new(composer_environment().unwrap());
/// let err = compile(env, "size(trust_domain, 1) + missing").unwrap_err();
/// assert_eq!(err.issues.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct TypeContext {
    pub scope: TypeScope,
    errors: Vec<TypeCheckError>,
}

impl TypeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error to the context
    pub fn add_error(&mut self, error: TypeCheckError) {
        self.errors.push(error);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take all errors, leaving the error list empty
    pub fn take_errors(&mut self) -> Vec<TypeCheckError> {
        std::mem::take(&mut self.errors)
    }
}

/// Overload candidates the checker accepted for a call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall {
    /// Function name, qualified for namespaced globals.
    pub function: String,
    pub overloads: Vec<String>,
    /// The call target is evaluated and passed as the first argument.
    pub receiver: bool,
}

/// A type-checked expression ready for evaluation.
#[derive(Debug, Clone)]
pub struct CheckedExpr {
    pub expr: Expr,
    pub result_type: CelType,
    pub types: HashMap<ExprId, CelType>,
    pub calls: HashMap<ExprId, ResolvedCall>,
}

/// Run Type Checker
///
/// `locations` maps token offsets to source positions for error reporting.
pub fn run_type_checker(
    env: &Environment,
    expr: Expr,
    locations: &[Location],
) -> Result<CheckedExpr, Vec<TypeCheckError>> {
    TypeChecker::new(env, locations).check(expr)
}
