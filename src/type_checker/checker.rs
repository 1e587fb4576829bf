use std::collections::HashMap;

use tracing::debug;

use super::{error::Location, CheckedExpr, ResolvedCall, TypeCheckError, TypeContext};
use crate::ast::{
    BinaryOperator, Comprehension, ComprehensionKind, Expr, ExprId, ExprKind, UnaryOperator,
};
use crate::env::{Environment, MessageKind};
use crate::tokenizer::literal::Literal;
use crate::types::CelType;

pub struct TypeChecker<'a> {
    env: &'a Environment,
    /// Source location of every significant token, indexed by token offset.
    locations: &'a [Location],
    ctx: TypeContext,
    types: HashMap<ExprId, CelType>,
    calls: HashMap<ExprId, ResolvedCall>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(env: &'a Environment, locations: &'a [Location]) -> Self {
        Self {
            env,
            locations,
            ctx: TypeContext::new(),
            types: HashMap::new(),
            calls: HashMap::new(),
        }
    }

    /// Checks the whole tree. Every problem found is reported, not only the
    /// first one.
    pub fn check(mut self, expr: Expr) -> Result<CheckedExpr, Vec<TypeCheckError>> {
        let result_type = self.check_expr(&expr);
        if self.ctx.has_errors() {
            return Err(self.ctx.take_errors());
        }
        debug!(result_type = %result_type, "expression checked");
        Ok(CheckedExpr {
            expr,
            result_type,
            types: self.types,
            calls: self.calls,
        })
    }

    fn location(&self, expr: &Expr) -> Location {
        self.locations
            .get(expr.offset)
            .or(self.locations.last())
            .copied()
            .unwrap_or_default()
    }

    fn report(&mut self, error: TypeCheckError) -> CelType {
        self.ctx.add_error(error);
        CelType::Error
    }

    fn check_expr(&mut self, expr: &Expr) -> CelType {
        let ty = match &expr.kind {
            ExprKind::Literal(literal) => literal_type(literal),
            ExprKind::Ident(name) => self.check_ident(expr, name),
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => self.check_select(expr, operand, field, *test_only),
            ExprKind::Call {
                target,
                function,
                args,
            } => self.check_call(expr, target.as_deref(), function, args),
            ExprKind::Index { operand, index } => self.check_index(expr, operand, index),
            ExprKind::List(items) => self.check_list(items),
            ExprKind::Map(entries) => self.check_map(entries),
            ExprKind::Struct { type_name, fields } => self.check_struct(expr, type_name, fields),
            ExprKind::Unary { op, operand } => self.check_unary(expr, *op, operand),
            ExprKind::Binary { op, left, right } => self.check_binary(expr, *op, left, right),
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => self.check_conditional(expr, condition, then, otherwise),
            ExprKind::Comprehension(comprehension) => {
                self.check_comprehension(expr, comprehension)
            }
            ExprKind::Bind { name, init, body } => {
                let init_type = self.check_expr(init);
                self.ctx.scope.enter_scope();
                self.ctx.scope.insert_type(name.clone(), init_type);
                let body_type = self.check_expr(body);
                self.ctx.scope.exit_scope();
                body_type
            }
        };
        self.types.insert(expr.id, ty.clone());
        ty
    }

    fn check_ident(&mut self, expr: &Expr, name: &str) -> CelType {
        if let Some(ty) = self.ctx.scope.get_type(name) {
            return ty.clone();
        }
        if let Some(ty) = self.env.variable(name) {
            return ty.clone();
        }
        let location = self.location(expr);
        self.report(TypeCheckError::UndefinedVariable {
            name: name.to_string(),
            location,
        })
    }

    fn field_type(&mut self, expr: &Expr, operand_type: &CelType, field: &str) -> CelType {
        match operand_type {
            CelType::Message(name) => {
                let Some(schema) = self.env.message(name) else {
                    return CelType::Dyn;
                };
                if schema.kind == MessageKind::Struct {
                    return CelType::Dyn;
                }
                match schema.field_type(field) {
                    Some(ty) => ty.clone(),
                    None => {
                        let location = self.location(expr);
                        self.report(TypeCheckError::UndefinedField {
                            type_name: name.clone(),
                            field: field.to_string(),
                            location,
                        })
                    }
                }
            }
            CelType::Map(key, value) if key.is_assignable_from(&CelType::String) => {
                (**value).clone()
            }
            ty if ty.is_dyn_like() => CelType::Dyn,
            other => {
                let location = self.location(expr);
                self.report(TypeCheckError::invalid(
                    format!("type '{}' does not support field selection", other),
                    location,
                ))
            }
        }
    }

    fn check_select(&mut self, expr: &Expr, operand: &Expr, field: &str, test_only: bool) -> CelType {
        let operand_type = self.check_expr(operand);
        let field_type = self.field_type(expr, &operand_type, field);
        if test_only {
            CelType::Bool
        } else {
            field_type
        }
    }

    /// `ns.fn(args)` where `ns.fn` names a declared function and `ns` is not
    /// a variable in scope.
    fn namespaced_function(&self, target: &Expr, function: &str) -> Option<String> {
        let namespace = target.qualified_name()?;
        let root = namespace.split('.').next().unwrap_or(&namespace);
        if self.ctx.scope.contains(root) || self.env.variable(root).is_some() {
            return None;
        }
        let qualified = format!("{}.{}", namespace, function);
        self.env.function(&qualified).map(|_| qualified)
    }

    fn check_call(
        &mut self,
        expr: &Expr,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
    ) -> CelType {
        if let Some(qualified) = target.and_then(|t| self.namespaced_function(t, function)) {
            let arg_types: Vec<CelType> = args.iter().map(|a| self.check_expr(a)).collect();
            return self.resolve(expr, &qualified, false, &arg_types);
        }

        let mut arg_types = Vec::with_capacity(args.len() + 1);
        if let Some(target) = target {
            arg_types.push(self.check_expr(target));
        }
        arg_types.extend(args.iter().map(|a| self.check_expr(a)));
        self.resolve(expr, function, target.is_some(), &arg_types)
    }

    fn resolve(&mut self, expr: &Expr, function: &str, receiver: bool, arg_types: &[CelType]) -> CelType {
        let location = self.location(expr);
        let Some(decl) = self.env.function(function) else {
            return self.report(TypeCheckError::UndefinedFunction {
                name: function.to_string(),
                location,
            });
        };

        let mut matched = Vec::new();
        let mut result: Option<CelType> = None;
        for overload in &decl.overloads {
            if overload.member != receiver || overload.params.len() != arg_types.len() {
                continue;
            }
            let mut bindings = HashMap::new();
            let unified = overload
                .params
                .iter()
                .zip(arg_types)
                .all(|(param, arg)| param.unify(arg, &mut bindings));
            if !unified {
                continue;
            }
            let overload_result = overload.result.substitute(&bindings);
            result = Some(match result {
                None => overload_result,
                Some(previous) => previous.join(&overload_result).unwrap_or(CelType::Dyn),
            });
            matched.push(overload.id.clone());
        }

        match result {
            Some(ty) => {
                self.calls.insert(
                    expr.id,
                    ResolvedCall {
                        function: function.to_string(),
                        overloads: matched,
                        receiver,
                    },
                );
                ty
            }
            None => self.report(TypeCheckError::no_matching_overload(
                function, arg_types, location,
            )),
        }
    }

    fn check_index(&mut self, expr: &Expr, operand: &Expr, index: &Expr) -> CelType {
        let operand_type = self.check_expr(operand);
        let index_type = self.check_expr(index);
        match &operand_type {
            CelType::List(elem)
                if matches!(index_type, CelType::Int | CelType::Uint) || index_type.is_dyn_like() =>
            {
                (**elem).clone()
            }
            CelType::Map(key, value)
                if key.is_assignable_from(&index_type)
                    || (key.is_numeric() && index_type.is_numeric()) =>
            {
                (**value).clone()
            }
            ty if ty.is_dyn_like() => CelType::Dyn,
            _ => {
                let location = self.location(expr);
                self.report(TypeCheckError::no_matching_overload(
                    "_[_]",
                    &[operand_type, index_type],
                    location,
                ))
            }
        }
    }

    fn check_list(&mut self, items: &[Expr]) -> CelType {
        let mut elem: Option<CelType> = None;
        for item in items {
            let ty = self.check_expr(item);
            elem = Some(match elem {
                None => ty,
                Some(previous) => previous.join(&ty).unwrap_or(CelType::Dyn),
            });
        }
        CelType::list(elem.unwrap_or(CelType::Dyn))
    }

    fn check_map(&mut self, entries: &[(Expr, Expr)]) -> CelType {
        let mut key: Option<CelType> = None;
        let mut value: Option<CelType> = None;
        for (k, v) in entries {
            let key_type = self.check_expr(k);
            if !key_type.is_key_type() {
                let location = self.location(k);
                self.report(TypeCheckError::InvalidMapKey {
                    key_type: key_type.clone(),
                    location,
                });
            }
            let value_type = self.check_expr(v);
            key = Some(match key {
                None => key_type,
                Some(previous) => previous.join(&key_type).unwrap_or(CelType::Dyn),
            });
            value = Some(match value {
                None => value_type,
                Some(previous) => previous.join(&value_type).unwrap_or(CelType::Dyn),
            });
        }
        CelType::map(key.unwrap_or(CelType::Dyn), value.unwrap_or(CelType::Dyn))
    }

    fn check_struct(&mut self, expr: &Expr, type_name: &str, fields: &[(String, Expr)]) -> CelType {
        let location = self.location(expr);
        let Some(schema) = self.env.message(type_name) else {
            fields.iter().for_each(|(_, value)| {
                self.check_expr(value);
            });
            return self.report(TypeCheckError::UndefinedType {
                name: type_name.to_string(),
                location,
            });
        };
        if schema.kind == MessageKind::Struct {
            return self.report(TypeCheckError::invalid(
                format!("'{}' cannot be constructed directly, use a map literal", type_name),
                location,
            ));
        }

        let mut seen: Vec<&str> = Vec::new();
        for (name, value) in fields {
            let value_type = self.check_expr(value);
            let location = self.location(value);
            if seen.contains(&name.as_str()) {
                self.report(TypeCheckError::invalid(
                    format!("field '{}' is set more than once", name),
                    location,
                ));
                continue;
            }
            seen.push(name);
            match schema.field_type(name) {
                None => {
                    self.report(TypeCheckError::UndefinedField {
                        type_name: type_name.to_string(),
                        field: name.clone(),
                        location,
                    });
                }
                Some(expected) if !expected.is_assignable_from(&value_type) => {
                    self.report(TypeCheckError::type_mismatch(
                        expected.clone(),
                        value_type,
                        location,
                    ));
                }
                Some(_) => {}
            }
        }
        CelType::message(type_name)
    }

    fn check_unary(&mut self, expr: &Expr, op: UnaryOperator, operand: &Expr) -> CelType {
        let ty = self.check_expr(operand);
        match (op, &ty) {
            (UnaryOperator::Not, CelType::Bool) => CelType::Bool,
            (UnaryOperator::Negate, CelType::Int | CelType::Double) => ty.clone(),
            (UnaryOperator::Not, t) if t.is_dyn_like() => CelType::Bool,
            (UnaryOperator::Negate, t) if t.is_dyn_like() => CelType::Dyn,
            _ => {
                let location = self.location(expr);
                self.report(TypeCheckError::no_matching_overload(
                    &format!("{}_", op),
                    &[ty.clone()],
                    location,
                ))
            }
        }
    }

    fn check_binary(&mut self, expr: &Expr, op: BinaryOperator, left: &Expr, right: &Expr) -> CelType {
        let l = self.check_expr(left);
        let r = self.check_expr(right);
        let dyn_like = l.is_dyn_like() || r.is_dyn_like();
        let both_numeric = l.is_numeric() && r.is_numeric();

        let result = match op {
            BinaryOperator::And | BinaryOperator::Or => {
                let boolish = |t: &CelType| matches!(t, CelType::Bool) || t.is_dyn_like();
                (boolish(&l) && boolish(&r)).then_some(CelType::Bool)
            }
            BinaryOperator::Equal | BinaryOperator::NotEqual => {
                (l.join(&r).is_some() || both_numeric).then_some(CelType::Bool)
            }
            BinaryOperator::Less
            | BinaryOperator::LessEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterEqual => {
                let ordered = matches!(l, CelType::String | CelType::Bytes | CelType::Bool) && l == r;
                (dyn_like || both_numeric || ordered).then_some(CelType::Bool)
            }
            BinaryOperator::In => {
                let member = match &r {
                    CelType::List(elem) => {
                        elem.is_assignable_from(&l) || (elem.is_numeric() && l.is_numeric())
                    }
                    CelType::Map(key, _) => {
                        key.is_assignable_from(&l) || (key.is_numeric() && l.is_numeric())
                    }
                    t => t.is_dyn_like(),
                };
                member.then_some(CelType::Bool)
            }
            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo => arithmetic_type(op, &l, &r),
        };

        match result {
            Some(ty) => ty,
            None => {
                let location = self.location(expr);
                self.report(TypeCheckError::no_matching_overload(
                    &operator_name(op),
                    &[l, r],
                    location,
                ))
            }
        }
    }

    fn check_conditional(&mut self, expr: &Expr, condition: &Expr, then: &Expr, otherwise: &Expr) -> CelType {
        let condition_type = self.check_expr(condition);
        if !matches!(condition_type, CelType::Bool) && !condition_type.is_dyn_like() {
            let location = self.location(condition);
            self.report(TypeCheckError::type_mismatch(
                CelType::Bool,
                condition_type,
                location,
            ));
        }
        let then_type = self.check_expr(then);
        let otherwise_type = self.check_expr(otherwise);
        match then_type.join(&otherwise_type) {
            Some(ty) => ty,
            None => {
                let location = self.location(expr);
                self.report(TypeCheckError::invalid(
                    format!(
                        "conditional branches have incompatible types: {} and {}",
                        then_type, otherwise_type
                    ),
                    location,
                ))
            }
        }
    }

    fn expect_bool(&mut self, expr: &Expr, ty: CelType) {
        if !matches!(ty, CelType::Bool) && !ty.is_dyn_like() {
            let location = self.location(expr);
            self.report(TypeCheckError::type_mismatch(CelType::Bool, ty, location));
        }
    }

    fn check_comprehension(&mut self, expr: &Expr, c: &Comprehension) -> CelType {
        let range_type = self.check_expr(&c.range);
        let two_vars = c.var2.is_some();
        let (first, second) = match &range_type {
            CelType::List(elem) if two_vars => (CelType::Int, (**elem).clone()),
            CelType::List(elem) => ((**elem).clone(), CelType::Dyn),
            CelType::Map(key, value) => ((**key).clone(), (**value).clone()),
            t if t.is_dyn_like() => (CelType::Dyn, CelType::Dyn),
            other => {
                let location = self.location(&c.range);
                self.report(TypeCheckError::invalid(
                    format!("expression of type '{}' cannot be the range of a comprehension", other),
                    location,
                ));
                (CelType::Error, CelType::Error)
            }
        };

        self.ctx.scope.enter_scope();
        self.ctx.scope.insert_type(c.var.clone(), first.clone());
        if let Some(var2) = &c.var2 {
            self.ctx.scope.insert_type(var2.clone(), second);
        }
        if let Some(filter) = &c.filter {
            let filter_type = self.check_expr(filter);
            self.expect_bool(filter, filter_type);
        }
        let body_type = self.check_expr(&c.body);
        self.ctx.scope.exit_scope();

        match c.kind {
            ComprehensionKind::All | ComprehensionKind::Exists | ComprehensionKind::ExistsOne => {
                self.expect_bool(&c.body, body_type);
                CelType::Bool
            }
            ComprehensionKind::Filter => {
                self.expect_bool(&c.body, body_type);
                CelType::list(first)
            }
            ComprehensionKind::Map | ComprehensionKind::TransformList => CelType::list(body_type),
            ComprehensionKind::TransformMap => {
                if !first.is_key_type() {
                    let location = self.location(expr);
                    return self.report(TypeCheckError::InvalidMapKey {
                        key_type: first,
                        location,
                    });
                }
                CelType::map(first, body_type)
            }
        }
    }
}

fn literal_type(literal: &Literal) -> CelType {
    match literal {
        Literal::String(_) => CelType::String,
        Literal::Bytes(_) => CelType::Bytes,
        Literal::Integer(_) => CelType::Int,
        Literal::UInteger(_) => CelType::Uint,
        Literal::Float(_) => CelType::Double,
        Literal::Boolean(_) => CelType::Bool,
        Literal::Null => CelType::Null,
    }
}

pub(crate) fn operator_name(op: BinaryOperator) -> String {
    match op {
        BinaryOperator::In => "@in".to_string(),
        op => format!("_{}_", op),
    }
}

fn arithmetic_type(op: BinaryOperator, l: &CelType, r: &CelType) -> Option<CelType> {
    let supports = |t: &CelType| match op {
        BinaryOperator::Add => matches!(
            t,
            CelType::Int
                | CelType::Uint
                | CelType::Double
                | CelType::String
                | CelType::Bytes
                | CelType::List(_)
        ),
        BinaryOperator::Modulo => matches!(t, CelType::Int | CelType::Uint),
        _ => t.is_numeric(),
    };

    match (l.is_dyn_like(), r.is_dyn_like()) {
        (true, true) => Some(CelType::Dyn),
        (true, false) => supports(r).then(|| r.clone()),
        (false, true) => supports(l).then(|| l.clone()),
        (false, false) => match (l, r) {
            (CelType::List(a), CelType::List(b)) if op == BinaryOperator::Add => {
                Some(CelType::list(a.join(b).unwrap_or(CelType::Dyn)))
            }
            (a, b) if a == b && supports(a) => Some(a.clone()),
            _ => None,
        },
    }
}
