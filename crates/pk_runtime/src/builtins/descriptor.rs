//! `property`, `staticmethod` and `classmethod`: class attributes that change how an attribute
//! load binds them. The binding itself lives in `Vm::bind_class_attr`.
use crate::core::object::slot;
use crate::core::{Args, ObjPayload, ObjectLayout, TypeId, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

use super::{check_argc, check_self};

pub(super) fn register(vm: &mut Vm) {
    vm.set_ctor(tp::PROPERTY, builtin_property);
    vm.set_ctor(tp::STATICMETHOD, builtin_staticmethod);
    vm.set_ctor(tp::CLASSMETHOD, builtin_classmethod);
    vm.def_method(tp::PROPERTY, "setter", 2, property_setter);
}

fn new_property(vm: &mut Vm, getter: Value, setter: Value) -> Value {
    let p = vm.alloc(tp::PROPERTY, ObjectLayout::Slots(2), ObjPayload::Empty);
    vm.set_slot(p, slot::PROP_GET, getter);
    vm.set_slot(p, slot::PROP_SET, setter);
    p
}

fn wrap(vm: &mut Vm, tid: TypeId, args: &Args, name: &str) -> PyResult<Value> {
    check_argc(vm, args, 1, 1, name)?;
    let w = vm.alloc(tid, ObjectLayout::Slots(1), ObjPayload::Empty);
    vm.set_slot(w, slot::WRAPPED, args.at(0));
    Ok(w)
}

fn builtin_property(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 2, "property")?;
    Ok(new_property(vm, args.at(0), args.at(1)))
}

fn builtin_staticmethod(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    wrap(vm, tp::STATICMETHOD, args, "staticmethod")
}

fn builtin_classmethod(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    wrap(vm, tp::CLASSMETHOD, args, "classmethod")
}

/// `@prop.setter`: a copy of the property with `fset` replaced.
fn property_setter(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let p = check_self(vm, args, tp::PROPERTY, "setter")?;
    let getter = vm.slot(p, slot::PROP_GET).unwrap_or(Value::NONE);
    Ok(new_property(vm, getter, args.at(1)))
}
