use std::rc::Rc;

use crate::builtins::check_self;
use crate::core::{Args, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

pub(super) fn register(vm: &mut Vm) {
    vm.def_method(tp::BASE_EXCEPTION, "__init__", -1, exception_init);
    vm.def_method(tp::BASE_EXCEPTION, "__str__", 1, exception_str);
    vm.def_method(tp::BASE_EXCEPTION, "__repr__", 1, exception_repr);
}

/// Stores every positional argument in `args`.
fn exception_init(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::BASE_EXCEPTION, "__init__")?;
    let rest = args.pos[1..].to_vec();
    let tuple = vm.new_tuple(rest);
    vm.setattr(this, Rc::from("args"), tuple)?;
    Ok(Value::NONE)
}

fn exception_str(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::BASE_EXCEPTION, "__str__")?;
    let msg = vm.exception_message(this);
    Ok(vm.new_str(&msg))
}

/// `ValueError('bad')`: the type name followed by the repr of `args`, without the trailing
/// comma of a one-item tuple.
fn exception_repr(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::BASE_EXCEPTION, "__repr__")?;
    let tn = vm.type_name(this);
    let exc_args = vm
        .heap_obj(this)
        .and_then(|o| o.attr_dict())
        .and_then(|d| d.get("args").copied());
    let items = exc_args.and_then(|a| vm.seq_items(a)).unwrap_or_default();
    let inner = match items.as_slice() {
        [] => String::new(),
        [one] => vm.py_repr(*one)?.to_string(),
        _ => {
            let mut parts = Vec::with_capacity(items.len());
            for &item in &items {
                parts.push(vm.py_repr(item)?.to_string());
            }
            parts.join(", ")
        }
    };
    Ok(vm.new_str(&format!("{tn}({inner})")))
}
