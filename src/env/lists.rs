//! List extension library.

use std::cmp::Ordering;

use indexmap::IndexSet;

use super::stdlib::{int_arg, list_arg};
use super::{traversal_cost, FunctionDecl, Overload};
use crate::types::CelType;
use crate::value::{Fault, Value};

pub fn functions() -> Vec<FunctionDecl> {
    let list_a = || CelType::list(CelType::param("A"));
    let elem_a = || CelType::param("A");

    vec![
        FunctionDecl::new("slice").overload(Overload::member(
            "list_slice",
            vec![list_a(), CelType::Int, CelType::Int],
            list_a(),
            slice,
        )),
        FunctionDecl::new("flatten")
            .overload(
                Overload::member(
                    "list_flatten",
                    vec![list_a()],
                    CelType::list(CelType::Dyn),
                    flatten,
                )
                .with_cost(flatten_cost),
            )
            .overload(
                Overload::member(
                    "list_flatten_int",
                    vec![list_a(), CelType::Int],
                    CelType::list(CelType::Dyn),
                    flatten,
                )
                .with_cost(flatten_cost),
            ),
        FunctionDecl::new("distinct").overload(Overload::member(
            "list_distinct",
            vec![list_a()],
            list_a(),
            distinct,
        )),
        FunctionDecl::new("reverse").overload(Overload::member(
            "list_reverse",
            vec![list_a()],
            list_a(),
            |args| {
                let mut items = list_arg(args, 0)?.to_vec();
                items.reverse();
                Ok(Value::list(items))
            },
        )),
        FunctionDecl::new("sort").overload(
            Overload::member("list_sort", vec![list_a()], list_a(), sort).with_cost(sort_cost),
        ),
        FunctionDecl::new("first").overload(Overload::member(
            "list_first",
            vec![list_a()],
            elem_a(),
            |args| {
                list_arg(args, 0)?
                    .first()
                    .cloned()
                    .ok_or_else(|| Fault::runtime("first() called on an empty list"))
            },
        )),
        FunctionDecl::new("last").overload(Overload::member(
            "list_last",
            vec![list_a()],
            elem_a(),
            |args| {
                list_arg(args, 0)?
                    .last()
                    .cloned()
                    .ok_or_else(|| Fault::runtime("last() called on an empty list"))
            },
        )),
        FunctionDecl::new("lists.range").overload(
            Overload::global(
                "lists_range",
                vec![CelType::Int],
                CelType::list(CelType::Int),
                |args| {
                    let end = int_arg(args, 0)?;
                    Ok(Value::list((0..end.max(0)).map(Value::Int).collect()))
                },
            )
            .with_cost(|args| match args.first() {
                Some(Value::Int(end)) => (*end).max(0) as u64,
                _ => 0,
            }),
        ),
    ]
}

fn slice(args: &[Value]) -> Result<Value, Fault> {
    let items = list_arg(args, 0)?;
    let bound = |index: usize| -> Result<usize, Fault> {
        let value = int_arg(args, index)?;
        usize::try_from(value)
            .ok()
            .filter(|i| *i <= items.len())
            .ok_or_else(|| Fault::runtime(format!("slice index out of range: {}", value)))
    };
    let (start, end) = (bound(1)?, bound(2)?);
    if start > end {
        return Err(Fault::runtime(format!(
            "cannot slice({}, {}), start index must be less than or equal to end index",
            start, end
        )));
    }
    Ok(Value::list(items[start..end].to_vec()))
}

fn flatten_into(items: &[Value], depth: i64, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::List(inner) if depth > 0 => flatten_into(inner, depth - 1, out),
            other => out.push(other.clone()),
        }
    }
}

/// Elements a flatten to `depth` levels will copy.
fn flattened_len(items: &[Value], depth: i64) -> u64 {
    items
        .iter()
        .map(|item| match item {
            Value::List(inner) if depth > 0 => flattened_len(inner, depth - 1),
            _ => 1,
        })
        .fold(0, u64::saturating_add)
}

fn flatten_cost(args: &[Value]) -> u64 {
    let depth = match args.get(1) {
        Some(Value::Int(depth)) => *depth,
        _ => 1,
    };
    match args.first() {
        Some(Value::List(items)) => flattened_len(items, depth),
        _ => 0,
    }
}

fn flatten(args: &[Value]) -> Result<Value, Fault> {
    let items = list_arg(args, 0)?;
    let depth = match args.get(1) {
        Some(_) => int_arg(args, 1)?,
        None => 1,
    };
    if depth < 0 {
        return Err(Fault::runtime("level must be non-negative"));
    }
    let mut out = Vec::with_capacity(items.len());
    flatten_into(items, depth, &mut out);
    Ok(Value::list(out))
}

/// Hashable identity of a scalar under value equality. Numbers that compare
/// equal share a key; NaN and containers have none.
#[derive(Debug, PartialEq, Eq, Hash)]
enum ScalarKey<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(u64),
    String(&'a str),
    Bytes(&'a [u8]),
}

fn scalar_key(value: &Value) -> Option<ScalarKey<'_>> {
    let key = match value {
        Value::Null => ScalarKey::Null,
        Value::Bool(b) => ScalarKey::Bool(*b),
        Value::Int(i) => ScalarKey::Int(*i),
        Value::Uint(u) => i64::try_from(*u).map_or(ScalarKey::Uint(*u), ScalarKey::Int),
        Value::Double(d) if d.is_nan() => return None,
        Value::Double(d) if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d < i64::MAX as f64 => {
            ScalarKey::Int(*d as i64)
        }
        Value::Double(d) if d.fract() == 0.0 && *d >= 0.0 && *d < u64::MAX as f64 => {
            ScalarKey::Uint(*d as u64)
        }
        Value::Double(d) => ScalarKey::Double(d.to_bits()),
        Value::String(s) => ScalarKey::String(s),
        Value::Bytes(b) => ScalarKey::Bytes(b),
        _ => return None,
    };
    Some(key)
}

fn distinct(args: &[Value]) -> Result<Value, Fault> {
    let mut seen = IndexSet::new();
    let mut containers: Vec<&Value> = Vec::new();
    let mut unique = Vec::new();
    for item in list_arg(args, 0)? {
        let first_occurrence = match scalar_key(item) {
            Some(key) => seen.insert(key),
            None if containers.contains(&item) => false,
            None => {
                containers.push(item);
                true
            }
        };
        if first_occurrence {
            unique.push(item.clone());
        }
    }
    Ok(Value::list(unique))
}

/// Comparison sort: n log n.
fn sort_cost(args: &[Value]) -> u64 {
    let n = args.first().map_or(0, traversal_cost);
    n.saturating_mul(u64::from(u64::BITS - n.leading_zeros()))
}

fn sort(args: &[Value]) -> Result<Value, Fault> {
    let mut items = list_arg(args, 0)?.to_vec();
    if let Some(first) = items.first() {
        let comparable = items
            .iter()
            .all(|item| first.compare(item).is_some() && item.type_name() == first.type_name());
        if !comparable {
            return Err(Fault::type_error("list elements must have the same orderable type"));
        }
    }
    items.sort_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal));
    Ok(Value::list(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_slice() {
        assert_eq!(
            slice(&[ints(&[1, 2, 3, 4]), Value::Int(1), Value::Int(3)]),
            Ok(ints(&[2, 3]))
        );
        assert!(slice(&[ints(&[1]), Value::Int(0), Value::Int(2)]).is_err());
    }

    #[test]
    fn test_flatten() {
        let nested = Value::list(vec![ints(&[1]), Value::list(vec![ints(&[2])]), Value::Int(3)]);
        assert_eq!(
            flatten(&[nested.clone()]),
            Ok(Value::list(vec![Value::Int(1), ints(&[2]), Value::Int(3)]))
        );
        assert_eq!(flatten(&[nested, Value::Int(2)]), Ok(ints(&[1, 2, 3])));
    }

    #[test]
    fn test_distinct_and_sort() {
        assert_eq!(distinct(&[ints(&[3, 1, 3, 2, 1])]), Ok(ints(&[3, 1, 2])));
        assert_eq!(sort(&[ints(&[3, 1, 2])]), Ok(ints(&[1, 2, 3])));

        let mixed = Value::list(vec![Value::Int(1), Value::string("a")]);
        assert!(sort(&[mixed]).is_err());
    }

    #[test]
    fn test_distinct_uses_value_equality() {
        let mixed = Value::list(vec![
            Value::Int(1),
            Value::Uint(1),
            Value::Double(1.0),
            Value::Double(1.5),
            Value::Double(1.5),
            Value::string("a"),
            Value::string("a"),
            ints(&[1]),
            ints(&[1]),
            Value::Double(f64::NAN),
        ]);
        let Ok(Value::List(unique)) = distinct(&[mixed]) else {
            panic!("expected a list");
        };
        assert_eq!(unique.len(), 5);
        assert_eq!(unique[0], Value::Int(1));
        assert_eq!(unique[1], Value::Double(1.5));
        assert_eq!(unique[3], ints(&[1]));
    }

    #[test]
    fn test_costs_follow_sizes() {
        let big = Value::list((0..1024).map(Value::Int).collect());
        assert_eq!(sort_cost(&[big.clone()]), 1024 * 11);
        assert_eq!(sort_cost(&[ints(&[])]), 0);

        let nested = Value::list(vec![ints(&[1, 2, 3]), Value::list(vec![ints(&[4, 5])])]);
        assert_eq!(flatten_cost(&[nested.clone()]), 4);
        assert_eq!(flatten_cost(&[nested, Value::Int(2)]), 5);
    }
}
