//! Static types understood by the type checker and the function registry.

use std::collections::HashMap;
use std::fmt;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CelType {
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    List(Box<CelType>),
    Map(Box<CelType>, Box<CelType>),
    /// A registered message, referenced by its fully qualified name.
    Message(String),
    Dyn,
    /// Type parameter of a generic overload signature, e.g. `A` in `list(A)`.
    Param(String),
    /// Placeholder for an expression that already failed to check.
    Error,
}

impl CelType {
    pub fn list(elem: CelType) -> Self {
        CelType::List(Box::new(elem))
    }

    pub fn map(key: CelType, value: CelType) -> Self {
        CelType::Map(Box::new(key), Box::new(value))
    }

    pub fn message(name: impl Into<String>) -> Self {
        CelType::Message(name.into())
    }

    pub fn param(name: &str) -> Self {
        CelType::Param(name.to_string())
    }

    pub fn is_dyn_like(&self) -> bool {
        matches!(self, CelType::Dyn | CelType::Error | CelType::Param(_))
    }

    /// Types that may be used as map keys.
    pub fn is_key_type(&self) -> bool {
        matches!(
            self,
            CelType::Bool
                | CelType::Int
                | CelType::Uint
                | CelType::String
                | CelType::Dyn
                | CelType::Error
                | CelType::Param(_)
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CelType::Int | CelType::Uint | CelType::Double)
    }

    /// Whether a value of type `other` may flow into a slot declared as `self`.
    pub fn is_assignable_from(&self, other: &CelType) -> bool {
        if self.is_dyn_like() || other.is_dyn_like() {
            return true;
        }
        match (self, other) {
            (CelType::List(a), CelType::List(b)) => a.is_assignable_from(b),
            (CelType::Map(ak, av), CelType::Map(bk, bv)) => {
                ak.is_assignable_from(bk) && av.is_assignable_from(bv)
            }
            (CelType::Message(_), CelType::Null) => true,
            (a, b) => a == b,
        }
    }

    /// Least common type of two branches, `None` when they are incompatible.
    pub fn join(&self, other: &CelType) -> Option<CelType> {
        if self == other {
            return Some(self.clone());
        }
        match (self, other) {
            (CelType::Error, t) | (t, CelType::Error) => Some(t.clone()),
            (CelType::Dyn, _) | (_, CelType::Dyn) => Some(CelType::Dyn),
            (CelType::List(a), CelType::List(b)) => {
                Some(CelType::list(a.join(b).unwrap_or(CelType::Dyn)))
            }
            (CelType::Map(ak, av), CelType::Map(bk, bv)) => Some(CelType::map(
                ak.join(bk).unwrap_or(CelType::Dyn),
                av.join(bv).unwrap_or(CelType::Dyn),
            )),
            (CelType::Message(name), CelType::Null) | (CelType::Null, CelType::Message(name)) => {
                Some(CelType::Message(name.clone()))
            }
            _ => None,
        }
    }

    /// Matches an overload parameter against an argument type, binding type
    /// parameters as it goes.
    pub fn unify(&self, arg: &CelType, bindings: &mut HashMap<String, CelType>) -> bool {
        match (self, arg) {
            (CelType::Param(name), _) => match bindings.get(name).cloned() {
                Some(bound) => match bound.join(arg) {
                    Some(joined) if bound.is_assignable_from(arg) || arg.is_dyn_like() => {
                        bindings.insert(name.clone(), joined);
                        true
                    }
                    _ => false,
                },
                None => {
                    let bound = if matches!(arg, CelType::Error) {
                        CelType::Dyn
                    } else {
                        arg.clone()
                    };
                    bindings.insert(name.clone(), bound);
                    true
                }
            },
            (CelType::Dyn, _) | (_, CelType::Dyn) | (_, CelType::Error) => true,
            (CelType::List(p), CelType::List(a)) => p.unify(a, bindings),
            (CelType::Map(pk, pv), CelType::Map(ak, av)) => {
                pk.unify(ak, bindings) && pv.unify(av, bindings)
            }
            (CelType::Message(_), CelType::Null) => true,
            (p, a) => p == a,
        }
    }

    /// Replaces type parameters with their bindings, or `dyn` when unbound.
    pub fn substitute(&self, bindings: &HashMap<String, CelType>) -> CelType {
        match self {
            CelType::Param(name) => bindings.get(name).cloned().unwrap_or(CelType::Dyn),
            CelType::List(elem) => CelType::list(elem.substitute(bindings)),
            CelType::Map(k, v) => CelType::map(k.substitute(bindings), v.substitute(bindings)),
            other => other.clone(),
        }
    }

    /// Runtime check used by overload dispatch. Containers are matched
    /// shallowly, the checker already validated their element types.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (CelType::Dyn | CelType::Param(_) | CelType::Error, _) => true,
            (CelType::Null, Value::Null) => true,
            (CelType::Bool, Value::Bool(_)) => true,
            (CelType::Int, Value::Int(_)) => true,
            (CelType::Uint, Value::Uint(_)) => true,
            (CelType::Double, Value::Double(_)) => true,
            (CelType::String, Value::String(_)) => true,
            (CelType::Bytes, Value::Bytes(_)) => true,
            (CelType::List(_), Value::List(_)) => true,
            (CelType::Map(..), Value::Map(_)) => true,
            (CelType::Message(name), Value::Message(msg)) => msg.type_name() == name,
            (CelType::Message(_), Value::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CelType::Null => write!(f, "null_type"),
            CelType::Bool => write!(f, "bool"),
            CelType::Int => write!(f, "int"),
            CelType::Uint => write!(f, "uint"),
            CelType::Double => write!(f, "double"),
            CelType::String => write!(f, "string"),
            CelType::Bytes => write!(f, "bytes"),
            CelType::List(elem) => write!(f, "list({})", elem),
            CelType::Map(k, v) => write!(f, "map({}, {})", k, v),
            CelType::Message(name) => write!(f, "{}", name),
            CelType::Dyn => write!(f, "dyn"),
            CelType::Param(name) => write!(f, "{}", name),
            CelType::Error => write!(f, "*error*"),
        }
    }
}
