//! Numeric builtins and the folding ones: `min`, `max`, `sum`.
use pk_ir::Magic;

use super::common::{arg_int, check_argc, kwargs_only};
use crate::core::{Args, ObjPayload, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

pub(super) fn register(vm: &mut Vm) {
    vm.def_builtin("abs", 1, builtin_abs);
    vm.def_builtin_kw("min", builtin_min);
    vm.def_builtin_kw("max", builtin_max);
    vm.def_builtin("sum", -1, builtin_sum);
    vm.def_builtin("round", -1, builtin_round);
    vm.def_builtin("divmod", 2, builtin_divmod);
    vm.def_builtin("pow", 2, builtin_pow);
}

fn builtin_abs(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let v = args.at(0);
    match v.ty() {
        tp::INT | tp::BOOL => return Ok(Value::int(v.as_index().unwrap_or(0).wrapping_abs())),
        tp::FLOAT => return Ok(Value::float(v.as_float().unwrap_or(0.0).abs())),
        _ => {}
    }
    if let Some(&ObjPayload::Complex { re, im }) = vm.payload(v) {
        return Ok(Value::float(re.hypot(im)));
    }
    match vm.call_magic(v, "__abs__", &[])? {
        Some(r) => Ok(r),
        None => {
            let tn = vm.type_name(v);
            Err(vm.type_error(format!("bad operand type for abs(): '{tn}'")))
        }
    }
}

/// `min` / `max` over one iterable or several arguments, with optional `key` and `default`.
fn extremum(vm: &mut Vm, args: &Args, name: &str, want_max: bool) -> PyResult<Value> {
    kwargs_only(vm, args, &["key", "default"], name)?;
    check_argc(vm, args, 1, usize::MAX, name)?;
    let key = args.kwarg("key").filter(|k| !k.is_none());
    // keys computed by `key` live only in Rust locals
    vm.with_gc_locked(|vm| {
        let items = if args.len() == 1 {
            vm.collect_values(args.at(0))?
        } else {
            args.pos.to_vec()
        };
        let mut best: Option<(Value, Value)> = None;
        for item in items {
            let k = match key {
                Some(f) => vm.call(f, &[item])?,
                None => item,
            };
            best = match best {
                None => Some((item, k)),
                Some((b, bk)) => {
                    let better = if want_max { vm.py_lt(bk, k)? } else { vm.py_lt(k, bk)? };
                    Some(if better { (item, k) } else { (b, bk) })
                }
            };
        }
        match (best, args.kwarg("default")) {
            (Some((v, _)), _) => Ok(v),
            (None, Some(d)) => Ok(d),
            (None, None) => Err(vm.value_error(format!("{name}() arg is an empty sequence"))),
        }
    })
}

fn builtin_min(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    extremum(vm, args, "min", false)
}

fn builtin_max(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    extremum(vm, args, "max", true)
}

fn builtin_sum(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 2, "sum")?;
    let start = args.get(1).unwrap_or(Value::int(0));
    vm.with_gc_locked(|vm| {
        let items = vm.collect_values(args.at(0))?;
        let mut acc = start;
        for item in items {
            acc = vm.binary_op(Magic::Add, Magic::Radd, acc, item)?;
        }
        Ok(acc)
    })
}

/// Rounds half to even.
fn builtin_round(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 2, "round")?;
    let v = args.at(0);
    let ndigits = match args.get(1) {
        Some(n) if !n.is_none() => Some(arg_int(vm, n)?),
        _ => None,
    };
    if let Some(i) = v.as_index() {
        return Ok(Value::int(i));
    }
    let Some(x) = v.as_float() else {
        let tn = vm.type_name(v);
        return Err(vm.type_error(format!("type {tn} doesn't define __round__ method")));
    };
    match ndigits {
        None => {
            if !x.is_finite() {
                return Err(vm.value_error("cannot round a non-finite float to an integer"));
            }
            Ok(Value::int(x.round_ties_even() as i64))
        }
        Some(n) => {
            let scale = 10f64.powi(n.clamp(-308, 308) as i32);
            Ok(Value::float((x * scale).round_ties_even() / scale))
        }
    }
}

fn builtin_divmod(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let (a, b) = (args.at(0), args.at(1));
    let q = vm.binary_op(Magic::Floordiv, Magic::Rfloordiv, a, b)?;
    vm.stack.push(q);
    let r = vm.binary_op(Magic::Mod, Magic::Rmod, a, b);
    vm.stack.pop();
    let r = r?;
    Ok(vm.new_tuple(vec![q, r]))
}

fn builtin_pow(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    vm.binary_op(Magic::Pow, Magic::Rpow, args.at(0), args.at(1))
}
