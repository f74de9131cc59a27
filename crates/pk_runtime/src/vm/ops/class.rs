//! Class bodies: BEGIN_CLASS opens a namespace, STORE_CLASS_ATTR fills it.
use std::rc::Rc;

use crate::core::object::slot;
use crate::core::{ObjPayload, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

impl Vm {
    pub(crate) fn begin_class(&mut self, fi: usize, name: &str, base: Value) -> PyResult<()> {
        let base_tid = if base.is_none() {
            tp::OBJECT
        } else {
            match self.as_type(base) {
                Some(t) => t,
                None => {
                    let tn = self.type_name(base);
                    return Err(self.type_error(format!(
                        "base class must be a type, not '{tn}'"
                    )));
                }
            }
        };
        if !self.types[base_tid.index()].subclassable {
            let bn = self.types[base_tid.index()].name.clone();
            return Err(self.type_error(format!("type '{bn}' is not an acceptable base type")));
        }
        let tid = self.new_type(name, base_tid);
        let module_name = match self.payload(Value::obj(tp::MODULE, self.frames[fi].module)) {
            Some(ObjPayload::Module(m)) => Some(m.name.clone()),
            _ => None,
        };
        if let Some(m) = module_name {
            let m = self.new_str_rc(m);
            let obj = self.types[tid.index()].obj;
            self.module_set(obj, Rc::from("__module__"), m);
        }
        tracing::trace!(target: "pk::vm", class = name, base = %self.types[base_tid.index()].name, "begin class");
        self.frames[fi].class = Some(tid);
        Ok(())
    }

    pub(crate) fn store_class_attr(&mut self, fi: usize, name: Rc<str>, v: Value) -> PyResult<()> {
        let Some(tid) = self.frames[fi].class else {
            return Err(self.runtime_error("STORE_CLASS_ATTR outside a class body"));
        };
        let func = match v.ty() {
            tp::STATICMETHOD | tp::CLASSMETHOD => self.slot(v, slot::WRAPPED).unwrap_or(v),
            tp::PROPERTY => self.slot(v, slot::PROP_GET).unwrap_or(v),
            _ => v,
        };
        if let Some(ObjPayload::Function(f)) = self.payload_mut(func) {
            if f.owner.is_none() {
                f.owner = Some(tid);
            }
        }
        let obj = self.types[tid.index()].obj;
        self.module_set(obj, name, v);
        Ok(())
    }
}
