//! The `builtins` module: type objects, exception classes and free functions.
mod collection;
mod common;
mod conversion;
mod core;
mod descriptor;
mod math;

use std::rc::Rc;

use crate::core::{NativeFn, NativeFunc, ObjPayload, ObjectLayout, TypeId, Value, tp};
use crate::vm::Vm;

pub(crate) use common::*;

/// Types reachable by name from scripts. The rest (iterators, bound methods...) are internal.
const EXPOSED_TYPES: &[TypeId] = &[
    tp::OBJECT,
    tp::TYPE,
    tp::INT,
    tp::FLOAT,
    tp::BOOL,
    tp::STR,
    tp::LIST,
    tp::TUPLE,
    tp::DICT,
    tp::SET,
    tp::RANGE,
    tp::SLICE,
    tp::BYTES,
    tp::COMPLEX,
    tp::SUPER,
    tp::PROPERTY,
    tp::STATICMETHOD,
    tp::CLASSMETHOD,
];

impl Vm {
    /// Allocates a permanent native function object.
    pub fn new_native(&mut self, name: &str, argc: i16, takes_kwargs: bool, f: NativeFn) -> Value {
        let native = NativeFunc {
            name: Rc::from(name),
            argc,
            takes_kwargs,
            f,
        };
        self.alloc_permanent(tp::NATIVE_FUNC, ObjectLayout::Plain, ObjPayload::Native(native))
    }

    /// Defines a function in `builtins`. `argc` is the exact positional count, or -1.
    pub fn def_builtin(&mut self, name: &str, argc: i16, f: NativeFn) {
        let v = self.new_native(name, argc, false, f);
        self.module_set(self.builtins, Rc::from(name), v);
    }

    pub(crate) fn def_builtin_kw(&mut self, name: &str, f: NativeFn) {
        let v = self.new_native(name, -1, true, f);
        self.module_set(self.builtins, Rc::from(name), v);
    }

    /// Defines a method on a type. `argc` counts `self`.
    pub fn def_method(&mut self, tid: TypeId, name: &str, argc: i16, f: NativeFn) {
        let v = self.new_native(name, argc, false, f);
        let obj = self.types[tid.index()].obj;
        self.module_set(obj, Rc::from(name), v);
    }

    pub(crate) fn def_method_kw(&mut self, tid: TypeId, name: &str, f: NativeFn) {
        let v = self.new_native(name, -1, true, f);
        let obj = self.types[tid.index()].obj;
        self.module_set(obj, Rc::from(name), v);
    }
}

pub(crate) fn register(vm: &mut Vm) {
    let builtins = vm.builtins;
    let mut exposed: Vec<TypeId> = EXPOSED_TYPES.to_vec();
    exposed.extend((tp::BASE_EXCEPTION.0..=tp::MEMORY_ERROR.0).map(TypeId));
    for tid in exposed {
        let name = vm.types[tid.index()].name.clone();
        let obj = vm.type_object(tid);
        vm.module_set(builtins, name, obj);
    }
    vm.module_set(builtins, Rc::from("NotImplemented"), Value::NOT_IMPLEMENTED);
    vm.module_set(builtins, Rc::from("Ellipsis"), Value::ELLIPSIS);

    self::core::register(vm);
    conversion::register(vm);
    descriptor::register(vm);
    math::register(vm);
    collection::register(vm);
    tracing::debug!(target: "pk::vm", types = vm.types.len(), "builtins registered");
}
