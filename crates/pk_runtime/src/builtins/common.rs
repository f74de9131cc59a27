//! Argument checks shared by builtins and methods.
use std::rc::Rc;

use crate::core::{Args, TypeId, Value};
use crate::errors::{PyResult, Unwind};
use crate::vm::Vm;

/// Checks the positional count of a variadic native.
pub(crate) fn check_argc(vm: &mut Vm, args: &Args, min: usize, max: usize, name: &str) -> PyResult<()> {
    let n = args.len();
    if n >= min && n <= max {
        return Ok(());
    }
    let expected = if min == max {
        format!("exactly {min}")
    } else if max == usize::MAX {
        format!("at least {min}")
    } else {
        format!("from {min} to {max}")
    };
    Err(vm.type_error(format!("{name}() takes {expected} argument(s) ({n} given)")))
}

pub(crate) fn expected_type(vm: &mut Vm, what: &str, v: Value) -> Unwind {
    let tn = vm.type_name(v);
    vm.type_error(format!("expected '{what}', got '{tn}'"))
}

pub(crate) fn arg_str(vm: &mut Vm, v: Value) -> PyResult<Rc<str>> {
    match vm.str_value(v) {
        Some(s) => Ok(s),
        None => Err(expected_type(vm, "str", v)),
    }
}

pub(crate) fn arg_int(vm: &mut Vm, v: Value) -> PyResult<i64> {
    match v.as_index() {
        Some(i) => Ok(i),
        None => Err(expected_type(vm, "int", v)),
    }
}

pub(crate) fn arg_float(vm: &mut Vm, v: Value) -> PyResult<f64> {
    match v.as_number() {
        Some(x) => Ok(x),
        None => Err(expected_type(vm, "float", v)),
    }
}

/// The receiver of a native method, which must be an instance of `tid`.
pub(crate) fn check_self(vm: &mut Vm, args: &Args, tid: TypeId, method: &str) -> PyResult<Value> {
    let v = args.at(0);
    if vm.isinstance(v, tid) {
        return Ok(v);
    }
    let expected = vm.type_info(tid).name.clone();
    let tn = vm.type_name(v);
    Err(vm.type_error(format!(
        "descriptor '{method}' requires a '{expected}' object but received '{tn}'"
    )))
}

/// Rejects keyword arguments outside `allowed`.
pub(crate) fn kwargs_only(vm: &mut Vm, args: &Args, allowed: &[&str], name: &str) -> PyResult<()> {
    for (k, _) in &args.kw {
        if !allowed.contains(&&**k) {
            return Err(vm.type_error(format!(
                "{name}() got an unexpected keyword argument '{k}'"
            )));
        }
    }
    Ok(())
}
