//! Functions every environment carries: sizes, string predicates, regular
//! expression matching and the type conversions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use regex::Regex;

use super::{FunctionDecl, Overload};
use crate::types::CelType;
use crate::value::{Fault, Value};

pub fn functions() -> Vec<FunctionDecl> {
    vec![
        size(),
        string_predicate("contains", "contains_string", |s, t| s.contains(t)),
        string_predicate("startsWith", "starts_with_string", |s, t| s.starts_with(t)),
        string_predicate("endsWith", "ends_with_string", |s, t| s.ends_with(t)),
        matches(),
        to_int(),
        to_uint(),
        to_double(),
        to_string(),
        to_bytes(),
        to_bool(),
        to_dyn(),
    ]
}

pub(crate) fn str_arg(args: &[Value], index: usize) -> Result<&str, Fault> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Fault::type_error(format!(
            "expected string argument, found {}",
            other.type_name()
        ))),
        None => Err(Fault::runtime("missing argument")),
    }
}

pub(crate) fn int_arg(args: &[Value], index: usize) -> Result<i64, Fault> {
    match args.get(index) {
        Some(Value::Int(i)) => Ok(*i),
        Some(other) => Err(Fault::type_error(format!(
            "expected int argument, found {}",
            other.type_name()
        ))),
        None => Err(Fault::runtime("missing argument")),
    }
}

pub(crate) fn list_arg(args: &[Value], index: usize) -> Result<&[Value], Fault> {
    match args.get(index) {
        Some(Value::List(items)) => Ok(items),
        Some(other) => Err(Fault::type_error(format!(
            "expected list argument, found {}",
            other.type_name()
        ))),
        None => Err(Fault::runtime("missing argument")),
    }
}

fn len_as_int(len: usize) -> Result<Value, Fault> {
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|_| Fault::runtime("size overflow"))
}

fn size_of(value: &Value) -> Result<Value, Fault> {
    match value {
        Value::String(s) => len_as_int(s.chars().count()),
        Value::Bytes(b) => len_as_int(b.len()),
        Value::List(items) => len_as_int(items.len()),
        Value::Map(map) => len_as_int(map.len()),
        other => Err(Fault::type_error(format!(
            "size() not supported for {}",
            other.type_name()
        ))),
    }
}

fn size() -> FunctionDecl {
    let kinds = [
        ("string", CelType::String),
        ("bytes", CelType::Bytes),
        ("list", CelType::list(CelType::param("A"))),
        ("map", CelType::map(CelType::param("K"), CelType::param("V"))),
    ];
    let mut decl = FunctionDecl::new("size");
    for (name, ty) in kinds {
        decl = decl
            .overload(Overload::global(
                format!("size_{}", name),
                vec![ty.clone()],
                CelType::Int,
                |args| size_of(&args[0]),
            ))
            .overload(Overload::member(
                format!("{}_size", name),
                vec![ty],
                CelType::Int,
                |args| size_of(&args[0]),
            ));
    }
    decl
}

fn string_predicate(name: &str, id: &str, test: fn(&str, &str) -> bool) -> FunctionDecl {
    FunctionDecl::new(name).overload(Overload::member(
        id,
        vec![CelType::String, CelType::String],
        CelType::Bool,
        move |args| Ok(Value::Bool(test(str_arg(args, 0)?, str_arg(args, 1)?))),
    ))
}

const REGEX_CACHE_CAPACITY: usize = 64;

/// Compiled `matches` patterns shared by every program of one environment.
/// The oldest pattern is evicted once the cache is full.
#[derive(Debug, Default)]
struct RegexCache {
    compiled: Mutex<IndexMap<String, Regex>>,
}

impl RegexCache {
    fn compiled(&self) -> MutexGuard<'_, IndexMap<String, Regex>> {
        self.compiled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, pattern: &str) -> Result<Regex, Fault> {
        if let Some(regex) = self.compiled().get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(pattern)
            .map_err(|e| Fault::runtime(format!("invalid regular expression '{}': {}", pattern, e)))?;
        let mut compiled = self.compiled();
        if compiled.len() >= REGEX_CACHE_CAPACITY {
            compiled.shift_remove_index(0);
        }
        compiled.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

fn regex_matches(cache: &RegexCache, args: &[Value]) -> Result<Value, Fault> {
    let text = str_arg(args, 0)?;
    let regex = cache.get(str_arg(args, 1)?)?;
    Ok(Value::Bool(regex.is_match(text)))
}

fn matches() -> FunctionDecl {
    matches_with(Arc::new(RegexCache::default()))
}

fn matches_with(cache: Arc<RegexCache>) -> FunctionDecl {
    let params = || vec![CelType::String, CelType::String];
    let member_cache = cache.clone();
    FunctionDecl::new("matches")
        .overload(Overload::global(
            "matches",
            params(),
            CelType::Bool,
            move |args| regex_matches(&cache, args),
        ))
        .overload(Overload::member(
            "matches_string",
            params(),
            CelType::Bool,
            move |args| regex_matches(&member_cache, args),
        ))
}

fn conversion(name: &str, result: CelType, sources: &[CelType], convert: fn(&Value) -> Result<Value, Fault>) -> FunctionDecl {
    sources.iter().fold(FunctionDecl::new(name), |decl, source| {
        decl.overload(Overload::global(
            format!("{}_to_{}", source, name),
            vec![source.clone()],
            result.clone(),
            move |args| convert(&args[0]),
        ))
    })
}

fn double_to_int(d: f64) -> Result<i64, Fault> {
    if d.is_finite() && d >= i64::MIN as f64 && d < i64::MAX as f64 {
        Ok(d.trunc() as i64)
    } else {
        Err(Fault::runtime("int range error"))
    }
}

fn double_to_uint(d: f64) -> Result<u64, Fault> {
    if d.is_finite() && d >= 0.0 && d < u64::MAX as f64 {
        Ok(d.trunc() as u64)
    } else {
        Err(Fault::runtime("uint range error"))
    }
}

fn unsupported(value: &Value, target: &str) -> Fault {
    Fault::type_error(format!(
        "cannot convert {} to {}",
        value.type_name(),
        target
    ))
}

fn to_int() -> FunctionDecl {
    conversion(
        "int",
        CelType::Int,
        &[CelType::Int, CelType::Uint, CelType::Double, CelType::String],
        |value| match value {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Uint(u) => i64::try_from(*u)
                .map(Value::Int)
                .map_err(|_| Fault::runtime("int range error")),
            Value::Double(d) => double_to_int(*d).map(Value::Int),
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Fault::runtime(format!("cannot parse '{}' as int", s))),
            other => Err(unsupported(other, "int")),
        },
    )
}

fn to_uint() -> FunctionDecl {
    conversion(
        "uint",
        CelType::Uint,
        &[CelType::Int, CelType::Uint, CelType::Double, CelType::String],
        |value| match value {
            Value::Int(i) => u64::try_from(*i)
                .map(Value::Uint)
                .map_err(|_| Fault::runtime("uint range error")),
            Value::Uint(u) => Ok(Value::Uint(*u)),
            Value::Double(d) => double_to_uint(*d).map(Value::Uint),
            Value::String(s) => s
                .parse::<u64>()
                .map(Value::Uint)
                .map_err(|_| Fault::runtime(format!("cannot parse '{}' as uint", s))),
            other => Err(unsupported(other, "uint")),
        },
    )
}

fn to_double() -> FunctionDecl {
    conversion(
        "double",
        CelType::Double,
        &[CelType::Int, CelType::Uint, CelType::Double, CelType::String],
        |value| match value {
            Value::Int(i) => Ok(Value::Double(*i as f64)),
            Value::Uint(u) => Ok(Value::Double(*u as f64)),
            Value::Double(d) => Ok(Value::Double(*d)),
            Value::String(s) => s
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| Fault::runtime(format!("cannot parse '{}' as double", s))),
            other => Err(unsupported(other, "double")),
        },
    )
}

fn to_string() -> FunctionDecl {
    conversion(
        "string",
        CelType::String,
        &[
            CelType::String,
            CelType::Int,
            CelType::Uint,
            CelType::Double,
            CelType::Bool,
            CelType::Bytes,
        ],
        |value| match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Int(i) => Ok(Value::String(i.to_string())),
            Value::Uint(u) => Ok(Value::String(u.to_string())),
            Value::Double(d) => Ok(Value::String(d.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map(Value::String)
                .map_err(|_| Fault::runtime("invalid UTF-8 in bytes")),
            other => Err(unsupported(other, "string")),
        },
    )
}

fn to_bytes() -> FunctionDecl {
    conversion(
        "bytes",
        CelType::Bytes,
        &[CelType::Bytes, CelType::String],
        |value| match value {
            Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
            Value::String(s) => Ok(Value::Bytes(s.as_bytes().to_vec())),
            other => Err(unsupported(other, "bytes")),
        },
    )
}

fn to_bool() -> FunctionDecl {
    conversion(
        "bool",
        CelType::Bool,
        &[CelType::Bool, CelType::String],
        |value| match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => match s.as_str() {
                "true" | "True" | "TRUE" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "False" | "FALSE" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(Fault::runtime(format!("cannot parse '{}' as bool", s))),
            },
            other => Err(unsupported(other, "bool")),
        },
    )
}

fn to_dyn() -> FunctionDecl {
    FunctionDecl::new("dyn").overload(Overload::global(
        "to_dyn",
        vec![CelType::param("A")],
        CelType::Dyn,
        |args| Ok(args[0].clone()),
    ))
}
