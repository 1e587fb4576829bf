//! Tree-walking interpreter over a checked expression.

use std::cell::Cell;

use super::context::Activation;
use super::{EvalError, EvalResult};
use crate::ast::{BinaryOperator, Comprehension, ComprehensionKind, Expr, ExprKind, UnaryOperator};
use crate::env::{traversal_cost, Environment};
use crate::tokenizer::literal::Literal;
use crate::type_checker::CheckedExpr;
use crate::value::{map_lookup, MapKey, MessageValue, Value, ValueMap};

/// One evaluation of a checked expression. The interpreter is cheap to
/// build and holds the cost counter, so a fresh one is used per call.
pub struct Interpreter<'a> {
    env: &'a Environment,
    checked: &'a CheckedExpr,
    cost_limit: Option<u64>,
    cost: Cell<u64>,
}

impl<'a> Interpreter<'a> {
    pub fn new(env: &'a Environment, checked: &'a CheckedExpr, cost_limit: Option<u64>) -> Self {
        Self {
            env,
            checked,
            cost_limit,
            cost: Cell::new(0),
        }
    }

    pub fn evaluate(&self, activation: &Activation) -> EvalResult<Value> {
        self.eval(&self.checked.expr, activation)
    }

    /// Evaluation steps taken so far.
    pub fn cost(&self) -> u64 {
        self.cost.get()
    }

    fn charge(&self) -> EvalResult<()> {
        self.charge_units(1)
    }

    /// Adds `units` to the running cost. Work that grows with the size of
    /// its operands is charged before it is done.
    fn charge_units(&self, units: u64) -> EvalResult<()> {
        let cost = self.cost.get().saturating_add(units);
        self.cost.set(cost);
        match self.cost_limit {
            Some(limit) if cost > limit => Err(EvalError::CostLimitExceeded(limit)),
            _ => Ok(()),
        }
    }

    fn eval(&self, expr: &Expr, act: &Activation) -> EvalResult<Value> {
        self.charge()?;
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(literal_value(literal)),
            ExprKind::Ident(name) => act
                .lookup(name)
                .cloned()
                .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => {
                let operand = self.eval(operand, act)?;
                self.select(&operand, field, *test_only)
            }
            ExprKind::Call {
                target,
                function: _,
                args,
            } => self.call(expr, target.as_deref(), args, act),
            ExprKind::Index { operand, index } => {
                let operand = self.eval(operand, act)?;
                let index = self.eval(index, act)?;
                index_value(&operand, &index)
            }
            ExprKind::List(items) => Ok(Value::list(
                items
                    .iter()
                    .map(|item| self.eval(item, act))
                    .collect::<EvalResult<Vec<_>>>()?,
            )),
            ExprKind::Map(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| Ok((self.eval(k, act)?, self.eval(v, act)?)))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::from_entries(entries)?)
            }
            ExprKind::Struct { type_name, fields } => {
                let mut message = MessageValue::new(type_name.as_str());
                for (name, value) in fields {
                    let value = self.eval(value, act)?;
                    if !matches!(value, Value::Null) {
                        message = message.with_field(name.as_str(), value);
                    }
                }
                Ok(Value::message(message))
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.eval(operand, act)?;
                unary(*op, operand)
            }
            ExprKind::Binary {
                op: BinaryOperator::And,
                left,
                right,
            } => self.logical(left, right, act, false),
            ExprKind::Binary {
                op: BinaryOperator::Or,
                left,
                right,
            } => self.logical(left, right, act, true),
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, act)?;
                let right = self.eval(right, act)?;
                self.charge_units(operator_cost(*op, &left, &right))?;
                binary(*op, &left, &right)
            }
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => match self.eval(condition, act)? {
                Value::Bool(true) => self.eval(then, act),
                Value::Bool(false) => self.eval(otherwise, act),
                other => Err(EvalError::no_matching_overload("_?_:_", &[&other])),
            },
            ExprKind::Comprehension(comprehension) => self.comprehension(comprehension, act),
            ExprKind::Bind { name, init, body } => {
                let init = self.eval(init, act)?;
                let scope = Activation::with_parent(act).with_binding(name.as_str(), init);
                self.eval(body, &scope)
            }
        }
    }

    fn select(&self, operand: &Value, field: &str, test_only: bool) -> EvalResult<Value> {
        match operand {
            Value::Message(message) => {
                let schema = self.env.message(message.type_name());
                match message.field(field) {
                    Some(value) if test_only => Ok(Value::Bool(!value.is_zero_value())),
                    Some(value) => Ok(value.clone()),
                    None => match schema.and_then(|s| s.field_type(field)) {
                        Some(_) if test_only => Ok(Value::Bool(false)),
                        Some(_) => Ok(schema
                            .map(|s| s.default_value(field))
                            .unwrap_or(Value::Null)),
                        None => Err(EvalError::NoSuchField {
                            type_name: message.type_name().to_string(),
                            field: field.to_string(),
                        }),
                    },
                }
            }
            Value::Map(map) => {
                let found = map.get(&MapKey::from(field));
                match (found, test_only) {
                    (found, true) => Ok(Value::Bool(found.is_some())),
                    (Some(value), false) => Ok(value.clone()),
                    (None, false) => Err(EvalError::NoSuchKey(field.to_string())),
                }
            }
            other => Err(EvalError::NoSuchField {
                type_name: other.type_name().to_string(),
                field: field.to_string(),
            }),
        }
    }

    fn call(
        &self,
        expr: &Expr,
        target: Option<&Expr>,
        args: &[Expr],
        act: &Activation,
    ) -> EvalResult<Value> {
        let resolved = self.checked.calls.get(&expr.id).ok_or_else(|| {
            EvalError::Type(format!("call at node {} was not resolved", expr.id))
        })?;

        let mut values = Vec::with_capacity(args.len() + 1);
        if let (true, Some(target)) = (resolved.receiver, target) {
            values.push(self.eval(target, act)?);
        }
        for arg in args {
            values.push(self.eval(arg, act)?);
        }

        let decl = self
            .env
            .function(&resolved.function)
            .ok_or_else(|| EvalError::Type(format!("unknown function '{}'", resolved.function)))?;
        let candidates: Vec<_> = resolved
            .overloads
            .iter()
            .filter_map(|id| decl.find(id))
            .collect();
        // Implementations validate their own arguments, so a dynamically
        // typed mismatch reaches the first candidate and fails there.
        let overload = candidates
            .iter()
            .find(|o| o.admits(&values))
            .or_else(|| candidates.first())
            .ok_or_else(|| {
                EvalError::no_matching_overload(&resolved.function, &values.iter().collect::<Vec<_>>())
            })?;

        self.charge_units((overload.cost)(&values))?;
        match (overload.implementation)(&values) {
            Ok(Value::Error(fault)) | Err(fault) => Err(EvalError::Function {
                function: resolved.function.clone(),
                fault,
            }),
            Ok(value) => Ok(value),
        }
    }

    /// `&&` and `||` are commutative with respect to errors: an error on one
    /// side is dropped when the other side alone decides the result.
    fn logical(&self, left: &Expr, right: &Expr, act: &Activation, is_or: bool) -> EvalResult<Value> {
        let name = if is_or { "_||_" } else { "_&&_" };
        let decisive = is_or;

        let left = self.eval(left, act);
        match left {
            Ok(Value::Bool(b)) if b == decisive => return Ok(Value::Bool(b)),
            Err(EvalError::CostLimitExceeded(limit)) => {
                return Err(EvalError::CostLimitExceeded(limit))
            }
            _ => {}
        }

        let right = self.eval(right, act);
        match (left, right) {
            (_, Ok(Value::Bool(b))) if b == decisive => Ok(Value::Bool(b)),
            (_, Err(EvalError::CostLimitExceeded(limit))) => Err(EvalError::CostLimitExceeded(limit)),
            (Ok(Value::Bool(_)), Ok(Value::Bool(b))) => Ok(Value::Bool(b)),
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(l), Ok(r)) => Err(EvalError::no_matching_overload(name, &[&l, &r])),
        }
    }

    fn comprehension(&self, c: &Comprehension, act: &Activation) -> EvalResult<Value> {
        let range = self.eval(&c.range, act)?;
        let pairs: Vec<(Value, Value)> = match &range {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (Value::Int(i as i64), item.clone()))
                .collect(),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| (k.to_value(), v.clone()))
                .collect(),
            other => {
                return Err(EvalError::Type(format!(
                    "expression of type '{}' cannot be the range of a comprehension",
                    other.type_name()
                )))
            }
        };
        let is_list = matches!(range, Value::List(_));

        let mut all_error: Option<EvalError> = None;
        let mut decided: Option<bool> = None;
        let mut count = 0usize;
        let mut list_out = Vec::new();
        let mut map_out = ValueMap::new();

        for (key, element) in pairs {
            let mut scope = Activation::with_parent(act);
            // A single variable binds the element of a list and the key of a map.
            let single = if is_list { element.clone() } else { key.clone() };
            match &c.var2 {
                Some(var2) => {
                    scope.insert(c.var.as_str(), key.clone());
                    scope.insert(var2.as_str(), element.clone());
                }
                None => scope.insert(c.var.as_str(), single.clone()),
            }

            if let Some(filter) = &c.filter {
                match self.eval(filter, &scope)? {
                    Value::Bool(true) => {}
                    Value::Bool(false) => continue,
                    other => return Err(EvalError::no_matching_overload("filter", &[&other])),
                }
            }

            match c.kind {
                ComprehensionKind::All | ComprehensionKind::Exists => {
                    let decisive = c.kind == ComprehensionKind::Exists;
                    match self.eval(&c.body, &scope) {
                        Ok(Value::Bool(b)) if b == decisive => {
                            decided = Some(b);
                            break;
                        }
                        Ok(Value::Bool(_)) => {}
                        Ok(other) => {
                            all_error.get_or_insert(EvalError::no_matching_overload(
                                &c.kind.to_string(),
                                &[&other],
                            ));
                        }
                        Err(e @ EvalError::CostLimitExceeded(_)) => return Err(e),
                        Err(e) => {
                            all_error.get_or_insert(e);
                        }
                    }
                }
                ComprehensionKind::ExistsOne => match self.eval(&c.body, &scope)? {
                    Value::Bool(true) => count += 1,
                    Value::Bool(false) => {}
                    other => {
                        return Err(EvalError::no_matching_overload("exists_one", &[&other]))
                    }
                },
                ComprehensionKind::Filter => match self.eval(&c.body, &scope)? {
                    Value::Bool(true) => list_out.push(single),
                    Value::Bool(false) => {}
                    other => return Err(EvalError::no_matching_overload("filter", &[&other])),
                },
                ComprehensionKind::Map | ComprehensionKind::TransformList => {
                    list_out.push(self.eval(&c.body, &scope)?);
                }
                ComprehensionKind::TransformMap => {
                    let value = self.eval(&c.body, &scope)?;
                    map_out.insert(MapKey::try_from(&key)?, value);
                }
            }
        }

        match c.kind {
            ComprehensionKind::All | ComprehensionKind::Exists => {
                let decisive = c.kind == ComprehensionKind::Exists;
                match (decided, all_error) {
                    (Some(b), _) => Ok(Value::Bool(b)),
                    (None, Some(e)) => Err(e),
                    (None, None) => Ok(Value::Bool(!decisive)),
                }
            }
            ComprehensionKind::ExistsOne => Ok(Value::Bool(count == 1)),
            ComprehensionKind::Map | ComprehensionKind::Filter | ComprehensionKind::TransformList => {
                Ok(Value::list(list_out))
            }
            ComprehensionKind::TransformMap => Ok(Value::map(map_out)),
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bytes(b) => Value::Bytes(b.clone()),
        Literal::Integer(i) => Value::Int(*i),
        Literal::UInteger(u) => Value::Uint(*u),
        Literal::Float(f) => Value::Double(*f),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn index_value(operand: &Value, index: &Value) -> EvalResult<Value> {
    match (operand, index) {
        (Value::List(items), _) => {
            let position = match index {
                Value::Int(i) => usize::try_from(*i).ok(),
                Value::Uint(u) => usize::try_from(*u).ok(),
                Value::Double(d) if d.fract() == 0.0 && *d >= 0.0 => Some(*d as usize),
                other => return Err(EvalError::no_matching_overload("_[_]", &[operand, other])),
            };
            position
                .and_then(|p| items.get(p))
                .cloned()
                .ok_or_else(|| EvalError::IndexOutOfRange {
                    index: index.to_string(),
                    len: items.len(),
                })
        }
        (Value::Map(map), key) => map_lookup(map, key)
            .cloned()
            .ok_or_else(|| EvalError::NoSuchKey(key.to_string())),
        (other, _) => Err(EvalError::no_matching_overload("_[_]", &[other, index])),
    }
}

/// Concatenation copies both operands; membership and equality of
/// containers walk them.
fn operator_cost(op: BinaryOperator, left: &Value, right: &Value) -> u64 {
    match op {
        BinaryOperator::Add => traversal_cost(left).saturating_add(traversal_cost(right)),
        BinaryOperator::In => traversal_cost(right),
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            traversal_cost(left).min(traversal_cost(right))
        }
        _ => 0,
    }
}

fn unary(op: UnaryOperator, operand: Value) -> EvalResult<Value> {
    match (op, &operand) {
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOperator::Negate, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| EvalError::Overflow("-_".to_string())),
        (UnaryOperator::Negate, Value::Double(d)) => Ok(Value::Double(-d)),
        _ => Err(EvalError::no_matching_overload(&format!("{}_", op), &[&operand])),
    }
}

fn binary(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
    use std::cmp::Ordering::{Greater, Less};

    let name = crate::type_checker::checker::operator_name(op);
    let mismatch = || EvalError::no_matching_overload(&name, &[left, right]);

    match op {
        BinaryOperator::Equal => Ok(Value::Bool(left == right)),
        BinaryOperator::NotEqual => Ok(Value::Bool(left != right)),
        BinaryOperator::Less
        | BinaryOperator::LessEqual
        | BinaryOperator::Greater
        | BinaryOperator::GreaterEqual => {
            let ordering = left.compare(right).ok_or_else(mismatch)?;
            Ok(Value::Bool(match op {
                BinaryOperator::Less => ordering == Less,
                BinaryOperator::LessEqual => ordering != Greater,
                BinaryOperator::Greater => ordering == Greater,
                _ => ordering != Less,
            }))
        }
        BinaryOperator::In => match right {
            Value::List(items) => Ok(Value::Bool(items.iter().any(|item| item == left))),
            Value::Map(map) => Ok(Value::Bool(map_lookup(map, left).is_some())),
            _ => Err(mismatch()),
        },
        BinaryOperator::Add => match (left, right) {
            (Value::Int(a), Value::Int(b)) => checked(a.checked_add(*b), &name).map(Value::Int),
            (Value::Uint(a), Value::Uint(b)) => checked(a.checked_add(*b), &name).map(Value::Uint),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::Bytes(a), Value::Bytes(b)) => Ok(Value::Bytes([a.as_slice(), b].concat())),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::list(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => Err(mismatch()),
        },
        BinaryOperator::Subtract => match (left, right) {
            (Value::Int(a), Value::Int(b)) => checked(a.checked_sub(*b), &name).map(Value::Int),
            (Value::Uint(a), Value::Uint(b)) => checked(a.checked_sub(*b), &name).map(Value::Uint),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a - b)),
            _ => Err(mismatch()),
        },
        BinaryOperator::Multiply => match (left, right) {
            (Value::Int(a), Value::Int(b)) => checked(a.checked_mul(*b), &name).map(Value::Int),
            (Value::Uint(a), Value::Uint(b)) => checked(a.checked_mul(*b), &name).map(Value::Uint),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a * b)),
            _ => Err(mismatch()),
        },
        BinaryOperator::Divide => match (left, right) {
            (Value::Int(_), Value::Int(0)) | (Value::Uint(_), Value::Uint(0)) => {
                Err(EvalError::DivisionByZero)
            }
            (Value::Int(a), Value::Int(b)) => checked(a.checked_div(*b), &name).map(Value::Int),
            (Value::Uint(a), Value::Uint(b)) => checked(a.checked_div(*b), &name).map(Value::Uint),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a / b)),
            _ => Err(mismatch()),
        },
        BinaryOperator::Modulo => match (left, right) {
            (Value::Int(_), Value::Int(0)) | (Value::Uint(_), Value::Uint(0)) => {
                Err(EvalError::ModulusByZero)
            }
            (Value::Int(a), Value::Int(b)) => checked(a.checked_rem(*b), &name).map(Value::Int),
            (Value::Uint(a), Value::Uint(b)) => checked(a.checked_rem(*b), &name).map(Value::Uint),
            _ => Err(mismatch()),
        },
        BinaryOperator::And | BinaryOperator::Or => Err(mismatch()),
    }
}

fn checked<T>(result: Option<T>, operation: &str) -> EvalResult<T> {
    result.ok_or_else(|| EvalError::Overflow(operation.to_string()))
}
