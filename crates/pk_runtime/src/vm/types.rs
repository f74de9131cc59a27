//! The type table.
use std::rc::Rc;

use crate::core::{NativeFn, ObjPayload, ObjectId, ObjectLayout, TypeId, Value, tp};

use super::Vm;

pub struct TypeInfo {
    pub name: Rc<str>,
    pub base: Option<TypeId>,
    /// The type object; its attribute dictionary is the class namespace.
    pub obj: ObjectId,
    /// Names annotated in the class body, in order.
    pub annotations: Vec<Rc<str>>,
    /// Native constructor; types without one build a plain instance and call `__init__`.
    pub ctor: Option<NativeFn>,
    /// Whether scripted classes may derive from it.
    pub subclassable: bool,
}

/// Bootstrap table, in `tp` order.
const BOOTSTRAP: &[(&str, Option<TypeId>, bool)] = &[
    ("<nil>", None, false),
    ("object", None, true),
    ("type", Some(tp::OBJECT), false),
    ("int", Some(tp::OBJECT), false),
    ("float", Some(tp::OBJECT), false),
    ("bool", Some(tp::INT), false),
    ("str", Some(tp::OBJECT), false),
    ("list", Some(tp::OBJECT), false),
    ("tuple", Some(tp::OBJECT), false),
    ("dict", Some(tp::OBJECT), false),
    ("set", Some(tp::OBJECT), false),
    ("range", Some(tp::OBJECT), false),
    ("slice", Some(tp::OBJECT), false),
    ("function", Some(tp::OBJECT), false),
    ("builtin_function_or_method", Some(tp::OBJECT), false),
    ("method", Some(tp::OBJECT), false),
    ("module", Some(tp::OBJECT), false),
    ("NoneType", Some(tp::OBJECT), false),
    ("NotImplementedType", Some(tp::OBJECT), false),
    ("ellipsis", Some(tp::OBJECT), false),
    ("iterator", Some(tp::OBJECT), false),
    ("generator", Some(tp::OBJECT), false),
    ("_star_wrapper", Some(tp::OBJECT), false),
    ("super", Some(tp::OBJECT), false),
    ("bytes", Some(tp::OBJECT), false),
    ("complex", Some(tp::OBJECT), false),
    ("BaseException", Some(tp::OBJECT), true),
    ("Exception", Some(tp::BASE_EXCEPTION), true),
    ("TypeError", Some(tp::EXCEPTION), true),
    ("ValueError", Some(tp::EXCEPTION), true),
    ("IndexError", Some(tp::EXCEPTION), true),
    ("KeyError", Some(tp::EXCEPTION), true),
    ("NameError", Some(tp::EXCEPTION), true),
    ("UnboundLocalError", Some(tp::NAME_ERROR), true),
    ("ZeroDivisionError", Some(tp::EXCEPTION), true),
    ("AttributeError", Some(tp::EXCEPTION), true),
    ("RuntimeError", Some(tp::EXCEPTION), true),
    ("StopIteration", Some(tp::EXCEPTION), true),
    ("AssertionError", Some(tp::EXCEPTION), true),
    ("ImportError", Some(tp::EXCEPTION), true),
    ("RecursionError", Some(tp::RUNTIME_ERROR), true),
    ("NotImplementedError", Some(tp::RUNTIME_ERROR), true),
    ("SyntaxError", Some(tp::EXCEPTION), true),
    ("MemoryError", Some(tp::EXCEPTION), true),
    ("property", Some(tp::OBJECT), false),
    ("staticmethod", Some(tp::OBJECT), false),
    ("classmethod", Some(tp::OBJECT), false),
];

impl Vm {
    pub(super) fn init_types(&mut self) {
        for &(name, base, subclassable) in BOOTSTRAP {
            self.add_type(name, base, subclassable);
        }
        debug_assert_eq!(self.types.len(), tp::BUILTIN_COUNT as usize);
    }

    fn add_type(&mut self, name: &str, base: Option<TypeId>, subclassable: bool) -> TypeId {
        let tid = TypeId(self.types.len() as u16);
        let obj = self.alloc_permanent(tp::TYPE, ObjectLayout::Dict, ObjPayload::Type(tid));
        self.types.push(TypeInfo {
            name: Rc::from(name),
            base,
            obj: obj.obj_id().unwrap_or(ObjectId(0)),
            annotations: Vec::new(),
            ctor: None,
            subclassable,
        });
        tid
    }

    /// Registers a new class deriving from `base`. Type objects are permanent.
    pub fn new_type(&mut self, name: &str, base: TypeId) -> TypeId {
        self.add_type(name, Some(base), true)
    }

    pub(crate) fn set_ctor(&mut self, tid: TypeId, ctor: NativeFn) {
        self.types[tid.index()].ctor = Some(ctor);
    }

    pub fn type_info(&self, tid: TypeId) -> &TypeInfo {
        &self.types[tid.index()]
    }

    pub fn type_object(&self, tid: TypeId) -> Value {
        Value::obj(tp::TYPE, self.types[tid.index()].obj)
    }

    /// Name of the value's type, as shown in error messages.
    pub fn type_name(&self, v: Value) -> Rc<str> {
        self.types[v.ty().index()].name.clone()
    }

    pub(crate) fn as_type(&self, v: Value) -> Option<TypeId> {
        if v.ty() != tp::TYPE {
            return None;
        }
        match self.heap_obj(v)?.payload {
            ObjPayload::Type(tid) => Some(tid),
            _ => None,
        }
    }

    pub fn is_subtype(&self, mut t: TypeId, base: TypeId) -> bool {
        loop {
            if t == base {
                return true;
            }
            match self.types[t.index()].base {
                Some(b) => t = b,
                None => return false,
            }
        }
    }

    pub fn isinstance(&self, v: Value, base: TypeId) -> bool {
        self.is_subtype(v.ty(), base)
    }

    /// Looks `name` up in the class namespaces along the base chain of `tid`.
    pub(crate) fn find_type_attr(&self, tid: TypeId, name: &str) -> Option<Value> {
        let mut t = Some(tid);
        while let Some(cur) = t {
            let info = &self.types[cur.index()];
            if let Some(v) = self.heap.get(info.obj).attr_dict().and_then(|d| d.get(name)) {
                return Some(*v);
            }
            t = info.base;
        }
        None
    }

    /// Like `find_type_attr`, but skips `tid` itself.
    pub(crate) fn find_base_attr(&self, tid: TypeId, name: &str) -> Option<Value> {
        let base = self.types[tid.index()].base?;
        self.find_type_attr(base, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_table_matches_type_ids() {
        let names: Vec<&str> = BOOTSTRAP.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(names[tp::INT.index()], "int");
        assert_eq!(names[tp::BOOL.index()], "bool");
        assert_eq!(names[tp::BASE_EXCEPTION.index()], "BaseException");
        assert_eq!(names[tp::NOT_IMPLEMENTED_ERROR.index()], "NotImplementedError");
        assert_eq!(names[tp::SYNTAX_ERROR.index()], "SyntaxError");
        assert_eq!(names[tp::MEMORY_ERROR.index()], "MemoryError");
        assert_eq!(names[tp::CLASSMETHOD.index()], "classmethod");
        assert_eq!(BOOTSTRAP.len(), tp::BUILTIN_COUNT as usize);
    }
}
