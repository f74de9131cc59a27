//! Constructors of the scalar types and character conversions.
use super::common::{arg_float, arg_int, arg_str, check_argc, kwargs_only};
use crate::core::{Args, ObjPayload, Value, tp};
use crate::errors::PyResult;
use crate::format;
use crate::vm::Vm;

pub(super) fn register(vm: &mut Vm) {
    vm.set_ctor(tp::INT, builtin_int);
    vm.set_ctor(tp::FLOAT, builtin_float);
    vm.set_ctor(tp::BOOL, builtin_bool);
    vm.set_ctor(tp::STR, builtin_str);
    vm.set_ctor(tp::BYTES, builtin_bytes);
    vm.set_ctor(tp::COMPLEX, builtin_complex);
    vm.def_builtin("chr", 1, builtin_chr);
    vm.def_builtin("ord", 1, builtin_ord);
}

/// Parses an integer literal with an optional sign and, for bases 2, 8 and 16, its prefix.
pub(crate) fn parse_int(text: &str, base: u32) -> Option<i64> {
    let t = text.trim();
    let (neg, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let prefix = match base {
        16 => Some(["0x", "0X"]),
        8 => Some(["0o", "0O"]),
        2 => Some(["0b", "0B"]),
        _ => None,
    };
    let digits = prefix
        .and_then(|[lower, upper]| digits.strip_prefix(lower).or_else(|| digits.strip_prefix(upper)))
        .unwrap_or(digits);
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let n = i64::from_str_radix(digits, base).ok()?;
    Some(if neg { n.wrapping_neg() } else { n })
}

fn builtin_int(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 2, "int")?;
    kwargs_only(vm, args, &[], "int")?;
    let Some(v) = args.get(0) else {
        return Ok(Value::int(0));
    };
    let base = match args.get(1) {
        Some(b) => {
            let b = arg_int(vm, b)?;
            if !(2..=36).contains(&b) {
                return Err(vm.value_error("int() base must be >= 2 and <= 36"));
            }
            b as u32
        }
        None => 10,
    };
    if args.len() == 2 && v.ty() != tp::STR {
        return Err(vm.type_error("int() can't convert non-string with explicit base"));
    }
    match v.ty() {
        tp::INT => return Ok(v),
        tp::BOOL => return Ok(Value::int(v.as_index().unwrap_or(0))),
        tp::FLOAT => {
            let f = v.as_float().unwrap_or(0.0);
            if !f.is_finite() {
                return Err(vm.value_error(format!(
                    "cannot convert float {} to integer",
                    format::float_repr(f)
                )));
            }
            return Ok(Value::int(f.trunc() as i64));
        }
        _ => {}
    }
    if let Some(s) = vm.str_value(v) {
        return match parse_int(&s, base) {
            Some(n) => Ok(Value::int(n)),
            None => Err(vm.value_error(format!(
                "invalid literal for int() with base {base}: {}",
                format::quote_str(&s)
            ))),
        };
    }
    let tn = vm.type_name(v);
    Err(vm.type_error(format!(
        "int() argument must be a string or a number, not '{tn}'"
    )))
}

fn builtin_float(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 1, "float")?;
    let Some(v) = args.get(0) else {
        return Ok(Value::float(0.0));
    };
    if let Some(x) = v.as_number() {
        return Ok(Value::float(x));
    }
    if let Some(s) = vm.str_value(v) {
        return match s.trim().parse::<f64>() {
            Ok(x) => Ok(Value::float(x)),
            Err(_) => Err(vm.value_error(format!(
                "could not convert string to float: {}",
                format::quote_str(&s)
            ))),
        };
    }
    let tn = vm.type_name(v);
    Err(vm.type_error(format!(
        "float() argument must be a string or a number, not '{tn}'"
    )))
}

fn builtin_bool(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 1, "bool")?;
    match args.get(0) {
        Some(v) => Ok(Value::bool(vm.py_bool(v)?)),
        None => Ok(Value::FALSE),
    }
}

fn builtin_str(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 1, "str")?;
    match args.get(0) {
        Some(v) if v.ty() == tp::STR => Ok(v),
        Some(v) => {
            let s = vm.py_str(v)?;
            Ok(vm.new_str_rc(s))
        }
        None => Ok(vm.new_str("")),
    }
}

fn builtin_bytes(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 1, "bytes")?;
    let Some(v) = args.get(0) else {
        return Ok(vm.new_bytes(&[]));
    };
    if let Some(n) = v.as_index() {
        if n < 0 {
            return Err(vm.value_error("negative count"));
        }
        return Ok(vm.new_bytes(&vec![0u8; n as usize]));
    }
    match vm.payload(v) {
        Some(ObjPayload::Bytes(_)) => return Ok(v),
        Some(ObjPayload::Str(s)) => {
            let s = s.clone();
            return Ok(vm.new_bytes(s.as_bytes()));
        }
        _ => {}
    }
    let items = vm.collect_values(v)?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item.as_index() {
            Some(b @ 0..=255) => out.push(b as u8),
            Some(_) => return Err(vm.value_error("bytes must be in range(0, 256)")),
            None => {
                let tn = vm.type_name(item);
                return Err(vm.type_error(format!(
                    "'{tn}' object cannot be interpreted as an integer"
                )));
            }
        }
    }
    Ok(vm.new_bytes(&out))
}

fn builtin_complex(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 2, "complex")?;
    let re = match args.get(0) {
        Some(v) => arg_float(vm, v)?,
        None => 0.0,
    };
    let im = match args.get(1) {
        Some(v) => arg_float(vm, v)?,
        None => 0.0,
    };
    Ok(vm.new_complex(re, im))
}

fn builtin_chr(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let i = arg_int(vm, args.at(0))?;
    match u32::try_from(i).ok().and_then(char::from_u32) {
        Some(c) => {
            let mut buf = [0u8; 4];
            Ok(vm.new_str(c.encode_utf8(&mut buf)))
        }
        None => Err(vm.value_error("chr() arg not in range(0x110000)")),
    }
}

fn builtin_ord(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = arg_str(vm, args.at(0))?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::int(c as i64)),
        _ => {
            let n = s.chars().count();
            Err(vm.type_error(format!(
                "ord() expected a character, but string of length {n} found"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_int;

    #[test]
    fn int_literals_accept_sign_and_prefix() {
        assert_eq!(parse_int(" 42 ", 10), Some(42));
        assert_eq!(parse_int("-17", 10), Some(-17));
        assert_eq!(parse_int("0xff", 16), Some(255));
        assert_eq!(parse_int("-0b101", 2), Some(-5));
        assert_eq!(parse_int("z", 36), Some(35));
        assert_eq!(parse_int("", 10), None);
        assert_eq!(parse_int("+-1", 10), None);
        assert_eq!(parse_int("1.5", 10), None);
    }
}
