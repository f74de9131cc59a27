mod common;

use common::capture_vm;
use pk_runtime::{Args, ObjectLayout, PyResult, Value, Vm, VmConfig, tp};

fn native_scale(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let (Some(x), Some(k)) = (args.at(0).as_int(), args.at(1).as_int()) else {
        return Err(vm.type_error("scale() expects two ints"));
    };
    Ok(Value::int(x * k))
}

#[test]
fn natives_are_callable_from_scripts() {
    let (mut vm, out) = capture_vm(VmConfig::default());
    vm.def_builtin("scale", 2, native_scale);
    vm.exec("print(scale(6, 7))\n", "main.py").unwrap();
    assert_eq!(*out.borrow(), "42\n");

    let err = vm.exec("scale('a', 1)\n", "main.py").unwrap_err();
    let exc = err.exception().unwrap();
    assert_eq!(exc.summary(), "TypeError: scale() expects two ints");

    let err = vm.exec("scale(1)\n", "main.py").unwrap_err();
    assert_eq!(err.exception().unwrap().type_name, "TypeError");
}

#[test]
fn vectorcall_leaves_the_stack_as_it_found_it() {
    let (mut vm, _) = capture_vm(VmConfig::default());
    vm.exec("def add(a, b=10):\n    return a + b\n", "main.py").unwrap();
    let add = vm.get_global("add").unwrap();

    let before = vm.stack_len();
    vm.push(add);
    vm.push(Value::NIL);
    vm.push(Value::int(1));
    let b = vm.new_str("b");
    vm.push(b);
    vm.push(Value::int(2));
    let r = vm.vectorcall(1, 1);
    let r = vm.finish(r).unwrap();
    assert_eq!(r.as_int(), Some(3));
    assert_eq!(vm.stack_len(), before);

    let r = vm.call(add, &[Value::int(5)]);
    assert_eq!(vm.finish(r).unwrap().as_int(), Some(15));
}

#[test]
fn globals_cross_the_boundary() {
    let (mut vm, out) = capture_vm(VmConfig::default());
    vm.set_global("answer", Value::int(41));
    vm.exec("answer += 1\nlabel = 'n=' + str(answer)\n", "main.py").unwrap();
    assert_eq!(vm.get_global("answer").and_then(Value::as_int), Some(42));
    let label = vm.get_global("label").unwrap();
    assert_eq!(vm.str_value(label).as_deref(), Some("n=42"));
    let v = vm.eval("answer * 2").unwrap();
    assert_eq!(v.as_int(), Some(84));
    assert_eq!(*out.borrow(), "");
}

#[test]
fn objects_with_slots_and_dicts() {
    let (mut vm, _) = capture_vm(VmConfig::default());
    let point = vm.new_type("Point", tp::OBJECT);

    let p = vm.new_object(point, ObjectLayout::Slots(2));
    assert!(vm.set_slot(p, 0, Value::int(3)));
    assert!(vm.set_slot(p, 1, Value::int(4)));
    assert!(!vm.set_slot(p, 2, Value::int(5)));
    assert_eq!(vm.slot(p, 1).and_then(Value::as_int), Some(4));

    let q = vm.new_object(point, ObjectLayout::Dict);
    let r = vm.setattr(q, "x".into(), Value::float(1.5));
    vm.finish(r).unwrap();
    let r = vm.getattr(q, "x");
    assert_eq!(vm.finish(r).unwrap().as_float(), Some(1.5));
    assert_eq!(&*vm.type_name(q), "Point");

    vm.set_global("q", q);
    let v = vm.eval("q.x * 2").unwrap();
    assert_eq!(v.as_float(), Some(3.0));
}

#[test]
fn single_mode_echoes_expression_statements() {
    let (mut vm, out) = capture_vm(VmConfig::default());
    vm.exec_mode("1 + 1\n", "<stdin>", pk_ir::CompileMode::Single).unwrap();
    vm.exec_mode("x = 5\n", "<stdin>", pk_ir::CompileMode::Single).unwrap();
    vm.exec_mode("None\n", "<stdin>", pk_ir::CompileMode::Single).unwrap();
    vm.exec_mode("'s'\n", "<stdin>", pk_ir::CompileMode::Single).unwrap();
    assert_eq!(*out.borrow(), "2\n's'\n");
}
