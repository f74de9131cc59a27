//! Output, introspection, attribute access and dynamic evaluation.
use std::rc::Rc;

use pk_ir::CompileMode;

use super::common::{arg_str, check_argc, kwargs_only};
use crate::core::object::slot;
use crate::core::{Args, ObjPayload, ObjectLayout, TypeId, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

pub(super) fn register(vm: &mut Vm) {
    vm.def_builtin_kw("print", builtin_print);
    vm.def_builtin("repr", 1, builtin_repr);
    vm.def_builtin("hash", 1, builtin_hash);
    vm.def_builtin("id", 1, builtin_id);
    vm.def_builtin("len", 1, builtin_len);
    vm.def_builtin("iter", 1, builtin_iter);
    vm.def_builtin("next", -1, builtin_next);
    vm.def_builtin("isinstance", 2, builtin_isinstance);
    vm.def_builtin("issubclass", 2, builtin_issubclass);
    vm.def_builtin("callable", 1, builtin_callable);
    vm.def_builtin("hasattr", 2, builtin_hasattr);
    vm.def_builtin("getattr", -1, builtin_getattr);
    vm.def_builtin("setattr", 3, builtin_setattr);
    vm.def_builtin("delattr", 2, builtin_delattr);
    vm.def_builtin("gc_collect", 0, builtin_gc_collect);
    vm.def_builtin("eval", 1, builtin_eval);
    vm.def_builtin("exec", 1, builtin_exec);
    vm.def_builtin("__import__", 1, builtin_import);
    vm.set_ctor(tp::TYPE, builtin_type);
    vm.set_ctor(tp::SUPER, builtin_super);
}

fn builtin_print(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    kwargs_only(vm, args, &["sep", "end"], "print")?;
    let sep = match args.kwarg("sep") {
        Some(v) if !v.is_none() => arg_str(vm, v)?,
        _ => Rc::from(" "),
    };
    let end = match args.kwarg("end") {
        Some(v) if !v.is_none() => arg_str(vm, v)?,
        _ => Rc::from("\n"),
    };
    let mut out = String::new();
    for (i, &v) in args.pos.iter().enumerate() {
        if i > 0 {
            out.push_str(&sep);
        }
        out.push_str(&vm.py_str(v)?);
    }
    out.push_str(&end);
    vm.write_out(&out);
    Ok(Value::NONE)
}

fn builtin_repr(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let s = vm.py_repr(args.at(0))?;
    Ok(vm.new_str_rc(s))
}

fn builtin_hash(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    Ok(Value::int(vm.py_hash(args.at(0))?))
}

/// Heap objects are identified by their slot; scalars by value, which matches `is`.
fn builtin_id(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let v = args.at(0);
    match v.obj_id() {
        Some(id) => Ok(Value::int(id.0 as i64)),
        None => Ok(Value::int(vm.py_hash(v)?)),
    }
}

fn builtin_len(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    Ok(Value::int(vm.py_len(args.at(0))? as i64))
}

fn builtin_iter(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    vm.get_iter(args.at(0))
}

fn builtin_next(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 2, "next")?;
    match vm.next_value(args.at(0))? {
        Some(v) => Ok(v),
        None => match args.get(1) {
            Some(default) => Ok(default),
            None => {
                let exc = vm.new_exception(tp::STOP_ITERATION, &[]);
                Err(vm.raise(exc))
            }
        },
    }
}

/// A type, or a tuple of types, as accepted by `isinstance` and `issubclass`.
fn type_list(vm: &mut Vm, v: Value, name: &str) -> PyResult<Vec<TypeId>> {
    if let Some(t) = vm.as_type(v) {
        return Ok(vec![t]);
    }
    let items = if v.ty() == tp::TUPLE { vm.seq_items(v) } else { None };
    let types: Option<Vec<TypeId>> =
        items.and_then(|items| items.into_iter().map(|t| vm.as_type(t)).collect());
    match types {
        Some(types) => Ok(types),
        None => Err(vm.type_error(format!(
            "{name}() arg 2 must be a type or tuple of types"
        ))),
    }
}

fn builtin_isinstance(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let types = type_list(vm, args.at(1), "isinstance")?;
    let v = args.at(0);
    Ok(Value::bool(types.iter().any(|&t| vm.isinstance(v, t))))
}

fn builtin_issubclass(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let Some(t) = vm.as_type(args.at(0)) else {
        return Err(vm.type_error("issubclass() arg 1 must be a class"));
    };
    let types = type_list(vm, args.at(1), "issubclass")?;
    Ok(Value::bool(types.iter().any(|&b| vm.is_subtype(t, b))))
}

fn builtin_callable(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let v = args.at(0);
    let callable = matches!(
        v.ty(),
        tp::FUNCTION | tp::NATIVE_FUNC | tp::BOUND_METHOD | tp::TYPE
    ) || vm.find_type_attr(v.ty(), "__call__").is_some();
    Ok(Value::bool(callable))
}

/// `getattr` with attribute errors from `__getattr__` reported as a miss.
fn lookup_attr(vm: &mut Vm, obj: Value, name: &str) -> PyResult<Option<Value>> {
    match vm.getattr_opt(obj, name) {
        Ok(v) => Ok(v),
        Err(_) if vm.pending_is(tp::ATTRIBUTE_ERROR) => {
            vm.clear_pending();
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn builtin_hasattr(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let name = arg_str(vm, args.at(1))?;
    Ok(Value::bool(lookup_attr(vm, args.at(0), &name)?.is_some()))
}

fn builtin_getattr(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 2, 3, "getattr")?;
    let name = arg_str(vm, args.at(1))?;
    match args.get(2) {
        None => vm.getattr(args.at(0), &name),
        Some(default) => Ok(lookup_attr(vm, args.at(0), &name)?.unwrap_or(default)),
    }
}

fn builtin_setattr(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let name = arg_str(vm, args.at(1))?;
    vm.setattr(args.at(0), name, args.at(2))?;
    Ok(Value::NONE)
}

fn builtin_delattr(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let name = arg_str(vm, args.at(1))?;
    vm.delattr(args.at(0), &name)?;
    Ok(Value::NONE)
}

fn builtin_gc_collect(vm: &mut Vm, _args: &Args) -> PyResult<Value> {
    Ok(Value::int(vm.gc_collect() as i64))
}

/// Runs source text against the calling frame: its module for globals, its locals for names.
fn run_source(vm: &mut Vm, args: &Args, mode: CompileMode, filename: &str) -> PyResult<Value> {
    let src = arg_str(vm, args.at(0))?;
    let co = vm.compile_dynamic(&src, filename, mode)?;
    let caller = vm.frames.len().checked_sub(1);
    let module = caller.map_or(vm.main, |fi| vm.frames[fi].module);
    let locals_of = caller.map(|fi| vm.frames[fi].locals_of.unwrap_or(fi));
    vm.run_nested(co, module, locals_of)
}

fn builtin_eval(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    run_source(vm, args, CompileMode::Eval, "<eval>")
}

fn builtin_exec(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    run_source(vm, args, CompileMode::Exec, "<exec>")?;
    Ok(Value::NONE)
}

fn builtin_import(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let name = arg_str(vm, args.at(0))?;
    vm.import_module(&name)
}

fn builtin_type(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    if args.len() != 1 || !args.kw.is_empty() {
        return Err(vm.type_error("type() takes 1 argument"));
    }
    Ok(vm.type_object(args.at(0).ty()))
}

/// Zero-argument `super()` reads the enclosing method's class and first argument; the explicit
/// form is `super(Class, obj)`.
fn builtin_super(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 2, "super")?;
    let (start, receiver) = if args.len() == 2 {
        match vm.as_type(args.at(0)) {
            Some(t) => (t, args.at(1)),
            None => return Err(vm.type_error("super() argument 1 must be a type")),
        }
    } else {
        let (function, locals_base) = match vm.frames.last() {
            Some(frame) => (frame.function, frame.locals_base),
            None => (Value::NIL, 0),
        };
        let found = match vm.payload(function) {
            Some(ObjPayload::Function(f)) => f.owner.zip(f.decl.args.first().copied()),
            _ => None,
        };
        let Some((owner, self_slot)) = found else {
            return Err(vm.runtime_error("super(): no arguments"));
        };
        (owner, vm.stack[locals_base + self_slot as usize])
    };
    let sup = vm.alloc(tp::SUPER, ObjectLayout::Slots(2), ObjPayload::Empty);
    let start = vm.type_object(start);
    vm.set_slot(sup, slot::SUPER_SELF, receiver);
    vm.set_slot(sup, slot::SUPER_TYPE, start);
    Ok(sup)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::Vm;

    fn run(src: &str) -> String {
        let out = Rc::new(RefCell::new(String::new()));
        let mut vm = Vm::new(Rc::new(pk_driver::Driver::new()));
        let sink = out.clone();
        vm.set_stdout(move |s| sink.borrow_mut().push_str(s));
        vm.exec(src, "<test>").unwrap();
        let text = out.borrow().clone();
        text
    }

    #[test]
    fn print_honours_sep_and_end() {
        assert_eq!(run("print(1, 'a', None, sep='-', end='!')"), "1-a-None!");
    }

    #[test]
    fn getattr_default_covers_missing_names() {
        let src = "class A:\n    x = 1\nprint(getattr(A(), 'x'), getattr(A(), 'y', 5), hasattr(A(), 'y'))\n";
        assert_eq!(run(src), "1 5 False\n");
    }

    #[test]
    fn eval_sees_function_locals() {
        let src = "def f(a):\n    b = 2\n    return eval('a * b')\nprint(f(21))\n";
        assert_eq!(run(src), "42\n");
    }

    #[test]
    fn eval_text_is_not_retained() {
        let mut vm = Vm::new(Rc::new(pk_driver::Driver::new()));
        vm.set_stdout(|_| {});
        let src = "t = 0\nfor i in range(300):\n    t += eval(str(i))\nx = 5\nfor i in range(3):\n    s = f'{x + i}'\nprint(t, s)\n";
        vm.exec(src, "<test>").unwrap();
        assert_eq!(vm.fstring_cache.len(), 1);
        assert_eq!(vm.get_global("t").and_then(crate::Value::as_int), Some(44850));
    }
}
