//! String extension library. Indices count code points, not bytes.

use super::stdlib::{int_arg, list_arg, str_arg};
use super::{traversal_cost, FunctionDecl, Overload};
use crate::types::CelType;
use crate::value::{Fault, Value};

pub fn functions() -> Vec<FunctionDecl> {
    use CelType::{Int, String as Str};

    vec![
        FunctionDecl::new("charAt").overload(Overload::member(
            "string_char_at_int",
            vec![Str, Int],
            Str,
            char_at,
        )),
        FunctionDecl::new("indexOf")
            .overload(
                Overload::member(
                    "string_index_of_string",
                    vec![Str, Str],
                    Int,
                    index_of,
                )
                .with_cost(search_cost),
            )
            .overload(
                Overload::member(
                    "string_index_of_string_int",
                    vec![Str, Str, Int],
                    Int,
                    index_of,
                )
                .with_cost(search_cost),
            ),
        FunctionDecl::new("lastIndexOf")
            .overload(
                Overload::member(
                    "string_last_index_of_string",
                    vec![Str, Str],
                    Int,
                    last_index_of,
                )
                .with_cost(search_cost),
            )
            .overload(
                Overload::member(
                    "string_last_index_of_string_int",
                    vec![Str, Str, Int],
                    Int,
                    last_index_of,
                )
                .with_cost(search_cost),
            ),
        FunctionDecl::new("lowerAscii").overload(Overload::member(
            "string_lower_ascii",
            vec![Str],
            Str,
            |args| Ok(Value::String(str_arg(args, 0)?.to_ascii_lowercase())),
        )),
        FunctionDecl::new("upperAscii").overload(Overload::member(
            "string_upper_ascii",
            vec![Str],
            Str,
            |args| Ok(Value::String(str_arg(args, 0)?.to_ascii_uppercase())),
        )),
        FunctionDecl::new("replace")
            .overload(
                Overload::member(
                    "string_replace_string_string",
                    vec![Str, Str, Str],
                    Str,
                    replace,
                )
                .with_cost(replace_cost),
            )
            .overload(
                Overload::member(
                    "string_replace_string_string_int",
                    vec![Str, Str, Str, Int],
                    Str,
                    replace,
                )
                .with_cost(replace_cost),
            ),
        FunctionDecl::new("split")
            .overload(Overload::member(
                "string_split_string",
                vec![Str, Str],
                CelType::list(Str),
                split,
            ))
            .overload(Overload::member(
                "string_split_string_int",
                vec![Str, Str, Int],
                CelType::list(Str),
                split,
            )),
        FunctionDecl::new("substring")
            .overload(Overload::member(
                "string_substring_int",
                vec![Str, Int],
                Str,
                substring,
            ))
            .overload(Overload::member(
                "string_substring_int_int",
                vec![Str, Int, Int],
                Str,
                substring,
            )),
        FunctionDecl::new("trim").overload(Overload::member(
            "string_trim",
            vec![Str],
            Str,
            |args| Ok(Value::string(str_arg(args, 0)?.trim())),
        )),
        FunctionDecl::new("join")
            .overload(
                Overload::member(
                    "list_join",
                    vec![CelType::list(Str)],
                    Str,
                    join,
                )
                .with_cost(join_cost),
            )
            .overload(
                Overload::member(
                    "list_join_string",
                    vec![CelType::list(Str), Str],
                    Str,
                    join,
                )
                .with_cost(join_cost),
            ),
        FunctionDecl::new("strings.quote").overload(Overload::global(
            "strings_quote",
            vec![Str],
            Str,
            |args| Ok(Value::String(quote(str_arg(args, 0)?))),
        )),
    ]
}

fn code_point_index(index: i64, len: usize) -> Result<usize, Fault> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i <= len)
        .ok_or_else(|| Fault::runtime(format!("index out of range: {}", index)))
}

fn char_at(args: &[Value]) -> Result<Value, Fault> {
    let chars: Vec<char> = str_arg(args, 0)?.chars().collect();
    let index = code_point_index(int_arg(args, 1)?, chars.len())?;
    Ok(Value::String(
        chars.get(index).map(|c| c.to_string()).unwrap_or_default(),
    ))
}

fn find_from(haystack: &[char], needle: &[char], start: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(start);
    }
    (start..haystack.len())
        .find(|&i| haystack[i..].starts_with(needle))
}

fn index_of(args: &[Value]) -> Result<Value, Fault> {
    let haystack: Vec<char> = str_arg(args, 0)?.chars().collect();
    let needle: Vec<char> = str_arg(args, 1)?.chars().collect();
    let start = match args.get(2) {
        Some(_) => code_point_index(int_arg(args, 2)?, haystack.len())?,
        None => 0,
    };
    Ok(Value::Int(
        find_from(&haystack, &needle, start).map_or(-1, |i| i as i64),
    ))
}

fn last_index_of(args: &[Value]) -> Result<Value, Fault> {
    let haystack: Vec<char> = str_arg(args, 0)?.chars().collect();
    let needle: Vec<char> = str_arg(args, 1)?.chars().collect();
    let end = match args.get(2) {
        Some(_) => code_point_index(int_arg(args, 2)?, haystack.len())?,
        None => haystack.len(),
    };
    if needle.is_empty() {
        return Ok(Value::Int(end as i64));
    }
    let found = (0..=end.min(haystack.len().saturating_sub(needle.len())))
        .rev()
        .find(|&i| haystack[i..].starts_with(&needle));
    Ok(Value::Int(found.map_or(-1, |i| i as i64)))
}

/// Substring search compares the needle at every position.
fn search_cost(args: &[Value]) -> u64 {
    let haystack = args.first().map_or(0, traversal_cost);
    let needle = args.get(1).map_or(0, traversal_cost);
    haystack.saturating_mul(needle.max(1))
}

/// Proportional to the length of the replaced text.
fn replace_cost(args: &[Value]) -> u64 {
    let (Some(text), Some(from), Some(to)) = (
        args.first().and_then(Value::as_str),
        args.get(1).and_then(Value::as_str),
        args.get(2).and_then(Value::as_str),
    ) else {
        return 0;
    };
    let mut occurrences = if from.is_empty() {
        text.chars().count() + 1
    } else {
        text.matches(from).count()
    };
    if let Some(Value::Int(limit)) = args.get(3) {
        if let Ok(limit) = usize::try_from(*limit) {
            occurrences = occurrences.min(limit);
        }
    }
    let output = text.len().saturating_add(occurrences.saturating_mul(to.len()));
    output.div_ceil(10) as u64
}

fn replace(args: &[Value]) -> Result<Value, Fault> {
    let text = str_arg(args, 0)?;
    let from = str_arg(args, 1)?;
    let to = str_arg(args, 2)?;
    let replaced = match args.get(3) {
        Some(_) => match usize::try_from(int_arg(args, 3)?) {
            Ok(limit) => text.replacen(from, to, limit),
            Err(_) => text.replace(from, to),
        },
        None => text.replace(from, to),
    };
    Ok(Value::String(replaced))
}

fn split(args: &[Value]) -> Result<Value, Fault> {
    let text = str_arg(args, 0)?;
    let separator = str_arg(args, 1)?;
    let parts: Vec<Value> = match args.get(2) {
        Some(_) => match int_arg(args, 2)? {
            0 => Vec::new(),
            n if n < 0 => text.split(separator).map(Value::string).collect(),
            n => text
                .splitn(usize::try_from(n).unwrap_or(usize::MAX), separator)
                .map(Value::string)
                .collect(),
        },
        None => text.split(separator).map(Value::string).collect(),
    };
    Ok(Value::list(parts))
}

fn substring(args: &[Value]) -> Result<Value, Fault> {
    let chars: Vec<char> = str_arg(args, 0)?.chars().collect();
    let start = code_point_index(int_arg(args, 1)?, chars.len())?;
    let end = match args.get(2) {
        Some(_) => code_point_index(int_arg(args, 2)?, chars.len())?,
        None => chars.len(),
    };
    if start > end {
        return Err(Fault::runtime(format!(
            "invalid substring range. start: {}, end: {}",
            start, end
        )));
    }
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn join_cost(args: &[Value]) -> u64 {
    let Some(Value::List(items)) = args.first() else {
        return 0;
    };
    let separator = args.get(1).and_then(Value::as_str).map_or(0, str::len);
    let text: usize = items
        .iter()
        .map(|item| item.as_str().map_or(0, str::len))
        .fold(0, usize::saturating_add);
    let output = text.saturating_add(separator.saturating_mul(items.len()));
    (items.len() as u64).saturating_add(output.div_ceil(10) as u64)
}

fn join(args: &[Value]) -> Result<Value, Fault> {
    let items = list_arg(args, 0)?;
    let separator = match args.get(1) {
        Some(_) => str_arg(args, 1)?,
        None => "",
    };
    let parts = items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| Fault::type_error("join() requires a list of strings"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::String(parts.join(separator)))
}

/// Renders `text` as a double-quoted string literal.
pub fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '\u{7}' => quoted.push_str("\\a"),
            '\u{8}' => quoted.push_str("\\b"),
            '\u{c}' => quoted.push_str("\\f"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{b}' => quoted.push_str("\\v"),
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
