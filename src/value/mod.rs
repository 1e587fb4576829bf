//! # Value Model
//!
//! [`Value`] is the dynamically typed unit exchanged between the interpreter,
//! the builtin functions and the schema adapters. Values are immutable once
//! produced; containers are reference counted so that variables and
//! comprehension results can be shared without deep copies.
//!
//! * [`conversion`]: error type and field paths for schema conversions
//! * [`json`]: adapter between values and free-form JSON documents

pub mod conversion;
pub mod json;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

pub use conversion::{ConversionError, ConversionResult, FieldPath};

/// Failure raised by a function implementation, carried as a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Fault {
    #[error("type error: {0}")]
    Type(String),
    #[error("{0}")]
    Runtime(String),
}

impl Fault {
    pub fn type_error(message: impl Into<String>) -> Self {
        Fault::Type(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Fault::Runtime(message.into())
    }
}

/// Map keys are restricted to the primitive kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(String),
}

impl MapKey {
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::Uint(u) => Value::Uint(*u),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }
}

impl TryFrom<&Value> for MapKey {
    type Error = Fault;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(MapKey::Bool(*b)),
            Value::Int(i) => Ok(MapKey::Int(*i)),
            Value::Uint(u) => Ok(MapKey::Uint(*u)),
            Value::String(s) => Ok(MapKey::String(s.clone())),
            other => Err(Fault::type_error(format!(
                "unsupported map key type: {}",
                other.type_name()
            ))),
        }
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        MapKey::String(value.to_string())
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_value().fmt(f)
    }
}

pub type ValueMap = IndexMap<MapKey, Value>;

/// A typed structured message: an opaque payload tagged with its schema name.
/// Only explicitly set fields are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageValue {
    type_name: String,
    fields: IndexMap<String, Value>,
}

impl MessageValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Arc<Vec<Value>>),
    Map(Arc<ValueMap>),
    Message(Arc<MessageValue>),
    Error(Fault),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn map(map: ValueMap) -> Self {
        Value::Map(Arc::new(map))
    }

    pub fn message(message: MessageValue) -> Self {
        Value::Message(Arc::new(message))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Value::Error(Fault::type_error(message))
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Value::Error(Fault::runtime(message))
    }

    /// Builds a map from key/value pairs. Non-primitive keys are a type
    /// error and repeated keys are rejected.
    pub fn from_entries<I>(entries: I) -> Result<Value, Fault>
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        let mut map = ValueMap::new();
        for (key, value) in entries {
            let key = MapKey::try_from(&key)?;
            if map.contains_key(&key) {
                return Err(Fault::runtime(format!("duplicate map key: {}", key)));
            }
            map.insert(key, value);
        }
        Ok(Value::map(map))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null_type",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Message(m) => m.type_name(),
            Value::Error(_) => "error",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Zero values read as "not set" for presence tests.
    pub fn is_zero_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Double(d) => *d == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::Message(_) | Value::Error(_) => false,
        }
    }

    /// Ordering across comparable kinds. Numbers compare across int, uint
    /// and double.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Uint(b)) => Some(compare_int_uint(*a, *b)),
            (Value::Uint(a), Value::Int(b)) => Some(compare_int_uint(*b, *a).reverse()),
            (Value::Int(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Uint(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Uint(b)) => a.partial_cmp(&(*b as f64)),
            _ => None,
        }
    }
}

fn compare_int_uint(i: i64, u: u64) -> Ordering {
    if i < 0 {
        Ordering::Less
    } else {
        (i as u64).cmp(&u)
    }
}

/// Looks a key up in a map, allowing numerically equal int, uint and
/// integral double keys to match each other.
pub fn map_lookup<'a>(map: &'a ValueMap, key: &Value) -> Option<&'a Value> {
    if let Ok(exact) = MapKey::try_from(key) {
        if let Some(found) = map.get(&exact) {
            return Some(found);
        }
    }
    let alternates = match key {
        Value::Int(i) => vec![u64::try_from(*i).ok().map(MapKey::Uint)],
        Value::Uint(u) => vec![i64::try_from(*u).ok().map(MapKey::Int)],
        Value::Double(d) if d.fract() == 0.0 && d.is_finite() => vec![
            (*d >= i64::MIN as f64 && *d < i64::MAX as f64).then(|| MapKey::Int(*d as i64)),
            (*d >= 0.0 && *d < u64::MAX as f64).then(|| MapKey::Uint(*d as u64)),
        ],
        _ => Vec::new(),
    };
    alternates
        .into_iter()
        .flatten()
        .find_map(|candidate| map.get(&candidate))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(k, v)| map_lookup(b, &k.to_value()).is_some_and(|w| v == w))
            }
            (Value::Message(a), Value::Message(b)) => a == b,
            (Value::Error(_), _) | (_, Value::Error(_)) => false,
            (a, b) => a.compare(b) == Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Uint(u) => write!(f, "{}u", u),
            Value::Double(d) => write!(f, "{:?}", d),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Message(msg) => {
                write!(f, "{}{{", msg.type_name())?;
                for (i, (k, v)) in msg.fields().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Error(fault) => write!(f, "error: {}", fault),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Uint(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::list(value)
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Value::map(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_equality_across_kinds() {
        assert_eq!(Value::Int(1), Value::Uint(1));
        assert_eq!(Value::Double(2.0), Value::Int(2));
        assert_ne!(Value::Int(-1), Value::Uint(u64::MAX));
        assert_ne!(Value::Int(1), Value::from("1"));
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let a = Value::from_entries(vec![
            (Value::from("a"), Value::Int(1)),
            (Value::from("b"), Value::Int(2)),
        ])
        .unwrap();
        let b = Value::from_entries(vec![
            (Value::from("b"), Value::Int(2)),
            (Value::from("a"), Value::Int(1)),
        ])
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_map_keys() {
        let err = Value::from_entries(vec![(Value::list(vec![]), Value::Null)]).unwrap_err();
        assert!(matches!(err, Fault::Type(_)));

        let err = Value::from_entries(vec![
            (Value::from("k"), Value::Null),
            (Value::from("k"), Value::Null),
        ])
        .unwrap_err();
        assert!(matches!(err, Fault::Runtime(_)));
    }

    #[test]
    fn test_map_lookup_numeric_keys() {
        let mut map = ValueMap::new();
        map.insert(MapKey::Int(1), Value::from("one"));
        assert_eq!(map_lookup(&map, &Value::Uint(1)), Some(&Value::from("one")));
        assert_eq!(map_lookup(&map, &Value::Double(1.0)), Some(&Value::from("one")));
        assert_eq!(map_lookup(&map, &Value::Double(1.5)), None);
    }

    #[test]
    fn test_errors_never_compare_equal() {
        let err = Value::runtime_error("boom");
        assert_ne!(err, err.clone());
    }
}
