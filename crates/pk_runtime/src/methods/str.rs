use std::rc::Rc;

use crate::builtins::{arg_int, arg_str, check_argc, check_self, expected_type};
use crate::core::{Args, ObjPayload, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

pub(super) fn register(vm: &mut Vm) {
    vm.def_method(tp::STR, "upper", 1, str_upper);
    vm.def_method(tp::STR, "lower", 1, str_lower);
    vm.def_method(tp::STR, "capitalize", 1, str_capitalize);
    vm.def_method(tp::STR, "strip", -1, str_strip);
    vm.def_method(tp::STR, "lstrip", -1, str_lstrip);
    vm.def_method(tp::STR, "rstrip", -1, str_rstrip);
    vm.def_method(tp::STR, "split", -1, str_split);
    vm.def_method(tp::STR, "join", 2, str_join);
    vm.def_method(tp::STR, "replace", 3, str_replace);
    vm.def_method(tp::STR, "startswith", 2, str_startswith);
    vm.def_method(tp::STR, "endswith", 2, str_endswith);
    vm.def_method(tp::STR, "find", 2, str_find);
    vm.def_method(tp::STR, "index", 2, str_index);
    vm.def_method(tp::STR, "count", 2, str_count);
    vm.def_method(tp::STR, "isdigit", 1, str_isdigit);
    vm.def_method(tp::STR, "isalpha", 1, str_isalpha);
    vm.def_method(tp::STR, "isspace", 1, str_isspace);
    vm.def_method(tp::STR, "encode", 1, str_encode);
    vm.def_method_kw(tp::STR, "format", str_format);
    vm.def_method(tp::BYTES, "decode", 1, bytes_decode);
}

fn this_str(vm: &mut Vm, args: &Args, method: &str) -> PyResult<Rc<str>> {
    let this = check_self(vm, args, tp::STR, method)?;
    Ok(vm.str_value(this).unwrap_or_else(|| Rc::from("")))
}

fn str_upper(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "upper")?;
    Ok(vm.new_str(&s.to_uppercase()))
}

fn str_lower(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "lower")?;
    Ok(vm.new_str(&s.to_lowercase()))
}

fn str_capitalize(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "capitalize")?;
    let mut chars = s.chars();
    let out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    };
    Ok(vm.new_str(&out))
}

#[derive(Clone, Copy)]
enum Side {
    Both,
    Left,
    Right,
}

fn strip(vm: &mut Vm, args: &Args, side: Side, method: &str) -> PyResult<Value> {
    check_argc(vm, args, 1, 2, method)?;
    let s = this_str(vm, args, method)?;
    let chars: Option<Rc<str>> = match args.get(1) {
        Some(v) if !v.is_none() => Some(arg_str(vm, v)?),
        _ => None,
    };
    let matches = |c: char| match &chars {
        Some(set) => set.contains(c),
        None => c.is_whitespace(),
    };
    let out = match side {
        Side::Both => s.trim_matches(matches),
        Side::Left => s.trim_start_matches(matches),
        Side::Right => s.trim_end_matches(matches),
    };
    Ok(vm.new_str(out))
}

fn str_strip(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    strip(vm, args, Side::Both, "strip")
}

fn str_lstrip(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    strip(vm, args, Side::Left, "lstrip")
}

fn str_rstrip(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    strip(vm, args, Side::Right, "rstrip")
}

/// `split(sep=None, maxsplit=-1)`. Without a separator, runs of whitespace split and empty
/// pieces are dropped.
fn str_split(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 3, "split")?;
    let s = this_str(vm, args, "split")?;
    let sep = match args.get(1) {
        Some(v) if !v.is_none() => Some(arg_str(vm, v)?),
        _ => None,
    };
    let maxsplit = match args.get(2) {
        Some(v) => arg_int(vm, v)?,
        None => -1,
    };
    let pieces: Vec<String> = match &sep {
        Some(sep) if sep.is_empty() => return Err(vm.value_error("empty separator")),
        Some(sep) if maxsplit >= 0 => s.splitn(maxsplit as usize + 1, &**sep).map(String::from).collect(),
        Some(sep) => s.split(&**sep).map(String::from).collect(),
        None => {
            let mut pieces: Vec<String> = Vec::new();
            let mut rest = s.trim_start();
            while !rest.is_empty() {
                if maxsplit >= 0 && pieces.len() as i64 == maxsplit {
                    pieces.push(rest.to_string());
                    break;
                }
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                pieces.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            pieces
        }
    };
    let items: Vec<Value> = pieces.iter().map(|p| vm.new_str(p)).collect();
    Ok(vm.new_list(items))
}

fn str_join(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let sep = this_str(vm, args, "join")?;
    let items = vm.collect_values(args.at(1))?;
    let mut out = String::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push_str(&sep);
        }
        match vm.str_value(item) {
            Some(s) => out.push_str(&s),
            None => {
                let tn = vm.type_name(item);
                return Err(vm.type_error(format!(
                    "sequence item {i}: expected str instance, {tn} found"
                )));
            }
        }
    }
    Ok(vm.new_str(&out))
}

fn str_replace(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "replace")?;
    let old = arg_str(vm, args.at(1))?;
    let new = arg_str(vm, args.at(2))?;
    Ok(vm.new_str(&s.replace(&*old, &new)))
}

/// The affix argument of `startswith` / `endswith`: a str or a tuple of them.
fn affixes(vm: &mut Vm, v: Value) -> PyResult<Vec<Rc<str>>> {
    if let Some(s) = vm.str_value(v) {
        return Ok(vec![s]);
    }
    let Some(items) = vm.seq_items(v).filter(|_| v.ty() == tp::TUPLE) else {
        return Err(expected_type(vm, "str", v));
    };
    items.into_iter().map(|item| arg_str(vm, item)).collect()
}

fn str_startswith(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "startswith")?;
    let prefixes = affixes(vm, args.at(1))?;
    Ok(Value::bool(prefixes.iter().any(|p| s.starts_with(&**p))))
}

fn str_endswith(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "endswith")?;
    let suffixes = affixes(vm, args.at(1))?;
    Ok(Value::bool(suffixes.iter().any(|p| s.ends_with(&**p))))
}

/// Character (not byte) position of the first occurrence.
fn char_position(s: &str, sub: &str) -> Option<usize> {
    s.find(sub).map(|b| s[..b].chars().count())
}

fn str_find(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "find")?;
    let sub = arg_str(vm, args.at(1))?;
    Ok(Value::int(char_position(&s, &sub).map_or(-1, |i| i as i64)))
}

fn str_index(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "index")?;
    let sub = arg_str(vm, args.at(1))?;
    match char_position(&s, &sub) {
        Some(i) => Ok(Value::int(i as i64)),
        None => Err(vm.value_error("substring not found")),
    }
}

fn str_count(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "count")?;
    let sub = arg_str(vm, args.at(1))?;
    let n = if sub.is_empty() {
        s.chars().count() + 1
    } else {
        s.matches(&*sub).count()
    };
    Ok(Value::int(n as i64))
}

fn str_isdigit(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "isdigit")?;
    Ok(Value::bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())))
}

fn str_isalpha(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "isalpha")?;
    Ok(Value::bool(!s.is_empty() && s.chars().all(char::is_alphabetic)))
}

fn str_isspace(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "isspace")?;
    Ok(Value::bool(!s.is_empty() && s.chars().all(char::is_whitespace)))
}

fn str_encode(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "encode")?;
    Ok(vm.new_bytes(s.as_bytes()))
}

fn bytes_decode(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::BYTES, "decode")?;
    let bytes = match vm.payload(this) {
        Some(ObjPayload::Bytes(b)) => b.clone(),
        _ => Rc::from(&[][..]),
    };
    match std::str::from_utf8(&bytes) {
        Ok(s) => Ok(vm.new_str(s)),
        Err(e) => Err(vm.value_error(format!("'utf-8' codec can't decode bytes: {e}"))),
    }
}

/// `"{} {name} {0:>4}".format(...)`: auto-numbered, positional and keyword fields, each with an
/// optional format spec; `{{` and `}}` are literal braces.
fn str_format(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = this_str(vm, args, "format")?;
    let mut out = String::new();
    let mut auto = 0usize;
    let mut rest: &str = &s;
    while let Some(i) = rest.find(['{', '}']) {
        out.push_str(&rest[..i]);
        let brace = rest.as_bytes()[i];
        let after = &rest[i + 1..];
        if brace == b'}' {
            if let Some(tail) = after.strip_prefix('}') {
                out.push('}');
                rest = tail;
                continue;
            }
            return Err(vm.value_error("Single '}' encountered in format string"));
        }
        if let Some(tail) = after.strip_prefix('{') {
            out.push('{');
            rest = tail;
            continue;
        }
        let Some(end) = after.find('}') else {
            return Err(vm.value_error("expected '}' before end of string"));
        };
        let field = &after[..end];
        let (name, spec) = field.split_once(':').unwrap_or((field, ""));
        let value = if name.is_empty() {
            auto += 1;
            args.get(auto)
        } else if let Ok(n) = name.parse::<usize>() {
            args.get(n + 1)
        } else {
            args.kwarg(name)
        };
        let Some(value) = value else {
            if name.is_empty() || name.parse::<usize>().is_ok() {
                return Err(vm.index_error(format!(
                    "Replacement index {} out of range for positional args tuple",
                    if name.is_empty() { auto - 1 } else { name.parse::<usize>().unwrap_or(0) }
                )));
            }
            let key = vm.new_str(name);
            return Err(vm.key_error(key));
        };
        out.push_str(&vm.format_value(value, spec)?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(vm.new_str(&out))
}

#[cfg(test)]
mod tests {
    use super::char_position;

    #[test]
    fn positions_count_characters() {
        assert_eq!(char_position("héllo", "l"), Some(2));
        assert_eq!(char_position("abc", "z"), None);
    }
}
