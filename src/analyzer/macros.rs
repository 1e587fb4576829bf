//! Macro expansion.
//!
//! Macros look like ordinary calls in the source but bind variables or
//! defer evaluation, so they are rewritten into dedicated nodes before type
//! checking:
//!
//! * `has(e.f)` becomes a presence-testing select.
//! * `e.all(x, p)`, `e.exists(x, p)`, `e.exists_one(x, p)`, `e.map(x, [p,] t)`
//!   and `e.filter(x, p)` become comprehensions.
//! * With two-variable comprehensions enabled, `e.all(k, v, p)`,
//!   `e.exists(k, v, p)`, `e.existsOne(k, v, p)`, `e.transformList(i, v, [p,] t)`
//!   and `e.transformMap(k, v, [p,] t)` as well.
//! * With bindings enabled, `cel.bind(name, init, body)` becomes a local binding.
//!
//! A call whose shape does not match any macro stays a call and is resolved
//! (or rejected) by the checker.

use thiserror::Error;

use crate::ast::{Comprehension, ComprehensionKind, Expr, ExprKind};
use crate::tokenizer::literal::Literal;

#[derive(Debug, Clone, Copy, Default)]
pub struct MacroOptions {
    pub bindings: bool,
    pub two_var_comprehensions: bool,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct MacroError {
    pub message: String,
    /// Token index of the offending call.
    pub offset: usize,
}

/// Expands every macro in `expr`, collecting all malformed uses.
pub fn expand_macros(expr: Expr, options: MacroOptions) -> Result<Expr, Vec<MacroError>> {
    let mut errors = Vec::new();
    let expanded = Expander {
        options,
        errors: &mut errors,
    }
    .expand(expr);
    if errors.is_empty() {
        Ok(expanded)
    } else {
        Err(errors)
    }
}

struct Expander<'a> {
    options: MacroOptions,
    errors: &'a mut Vec<MacroError>,
}

impl Expander<'_> {
    fn expand(&mut self, expr: Expr) -> Expr {
        let offset = expr.offset;
        let kind = match expr.kind {
            ExprKind::Call {
                target,
                function,
                args,
            } => {
                let target = target.map(|t| Box::new(self.expand(*t)));
                let args: Vec<Expr> = args.into_iter().map(|a| self.expand(a)).collect();
                return self.expand_call(offset, target, function, args);
            }
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => ExprKind::Select {
                operand: Box::new(self.expand(*operand)),
                field,
                test_only,
            },
            ExprKind::Index { operand, index } => ExprKind::Index {
                operand: Box::new(self.expand(*operand)),
                index: Box::new(self.expand(*index)),
            },
            ExprKind::List(items) => {
                ExprKind::List(items.into_iter().map(|i| self.expand(i)).collect())
            }
            ExprKind::Map(entries) => ExprKind::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (self.expand(k), self.expand(v)))
                    .collect(),
            ),
            ExprKind::Struct { type_name, fields } => ExprKind::Struct {
                type_name,
                fields: fields
                    .into_iter()
                    .map(|(name, v)| (name, self.expand(v)))
                    .collect(),
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: Box::new(self.expand(*operand)),
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op,
                left: Box::new(self.expand(*left)),
                right: Box::new(self.expand(*right)),
            },
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => ExprKind::Conditional {
                condition: Box::new(self.expand(*condition)),
                then: Box::new(self.expand(*then)),
                otherwise: Box::new(self.expand(*otherwise)),
            },
            kind @ (ExprKind::Literal(_)
            | ExprKind::Ident(_)
            | ExprKind::Comprehension(_)
            | ExprKind::Bind { .. }) => kind,
        };
        Expr::new(offset, kind)
    }

    fn error(&mut self, offset: usize, message: impl Into<String>) {
        self.errors.push(MacroError {
            message: message.into(),
            offset,
        });
    }

    fn expand_call(
        &mut self,
        offset: usize,
        target: Option<Box<Expr>>,
        function: String,
        mut args: Vec<Expr>,
    ) -> Expr {
        let call = |target: Option<Box<Expr>>, function: String, args: Vec<Expr>| {
            Expr::new(
                offset,
                ExprKind::Call {
                    target,
                    function,
                    args,
                },
            )
        };

        let Some(target) = target else {
            if function == "has" && args.len() == 1 {
                return self.expand_has(offset, args.remove(0));
            }
            return call(None, function, args);
        };

        if self.options.bindings
            && function == "bind"
            && args.len() == 3
            && matches!(&target.kind, ExprKind::Ident(ns) if ns == "cel")
        {
            let mut args = args.into_iter();
            let (Some(name), Some(init), Some(body)) = (args.next(), args.next(), args.next())
            else {
                return call(Some(target), function, Vec::new());
            };
            let Some(name) = self.variable_name(&name, "cel.bind") else {
                return malformed(offset);
            };
            return Expr::new(
                offset,
                ExprKind::Bind {
                    name,
                    init: Box::new(init),
                    body: Box::new(body),
                },
            );
        }

        let two_var = self.options.two_var_comprehensions;
        let shape = match (function.as_str(), args.len()) {
            ("all", 2) => Some((ComprehensionKind::All, 1, false)),
            ("exists", 2) => Some((ComprehensionKind::Exists, 1, false)),
            ("exists_one", 2) => Some((ComprehensionKind::ExistsOne, 1, false)),
            ("map", 2) => Some((ComprehensionKind::Map, 1, false)),
            ("map", 3) => Some((ComprehensionKind::Map, 1, true)),
            ("filter", 2) => Some((ComprehensionKind::Filter, 1, false)),
            ("all", 3) if two_var => Some((ComprehensionKind::All, 2, false)),
            ("exists", 3) if two_var => Some((ComprehensionKind::Exists, 2, false)),
            ("existsOne" | "exists_one", 3) if two_var => {
                Some((ComprehensionKind::ExistsOne, 2, false))
            }
            ("transformList", 3) if two_var => Some((ComprehensionKind::TransformList, 2, false)),
            ("transformList", 4) if two_var => Some((ComprehensionKind::TransformList, 2, true)),
            ("transformMap", 3) if two_var => Some((ComprehensionKind::TransformMap, 2, false)),
            ("transformMap", 4) if two_var => Some((ComprehensionKind::TransformMap, 2, true)),
            _ => None,
        };
        let Some((kind, var_count, has_filter)) = shape else {
            return call(Some(target), function, args);
        };

        let mut args = args.into_iter();
        let macro_name = function.as_str();
        let mut vars = Vec::with_capacity(var_count);
        for arg in args.by_ref().take(var_count) {
            vars.push(self.variable_name(&arg, macro_name));
        }
        let filter = if has_filter { args.next() } else { None };
        let Some(body) = args.next() else {
            return call(Some(target), function, Vec::new());
        };

        let mut vars = vars.into_iter();
        let (Some(Some(var)), var2) = (vars.next(), vars.next()) else {
            return malformed(offset);
        };
        let var2 = match var2 {
            Some(Some(name)) => {
                if name == var {
                    self.error(offset, format!("{}: duplicate variable name '{}'", macro_name, name));
                }
                Some(name)
            }
            Some(None) => return malformed(offset),
            None => None,
        };

        Expr::new(
            offset,
            ExprKind::Comprehension(Box::new(Comprehension {
                kind,
                range: *target,
                var,
                var2,
                filter,
                body,
            })),
        )
    }

    fn expand_has(&mut self, offset: usize, arg: Expr) -> Expr {
        match arg.kind {
            ExprKind::Select {
                operand,
                field,
                test_only: false,
            } => Expr::new(
                offset,
                ExprKind::Select {
                    operand,
                    field,
                    test_only: true,
                },
            ),
            _ => {
                self.error(offset, "invalid argument to has() macro");
                arg
            }
        }
    }

    fn variable_name(&mut self, arg: &Expr, macro_name: &str) -> Option<String> {
        match &arg.kind {
            ExprKind::Ident(name) => Some(name.clone()),
            _ => {
                self.error(
                    arg.offset,
                    format!("{}: argument must be a simple name, found '{}'", macro_name, arg),
                );
                None
            }
        }
    }
}

/// Placeholder for a macro that failed to expand. Expansion errors are
/// always reported, so it never reaches the checker.
fn malformed(offset: usize) -> Expr {
    Expr::new(offset, ExprKind::Literal(Literal::Null))
}
