//! Name resolution: module globals, builtins, closures and the dynamic-scope opcodes used by
//! `eval`, `exec` and f-string fields.
use std::rc::Rc;

use pk_ir::{CodeObject, CompileMode};

use crate::core::dict::new_name_dict;
use crate::core::{Function, ObjPayload, ObjectId, ObjectLayout, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

const FSTRING_CACHE_LIMIT: usize = 512;

impl Vm {
    pub(crate) fn module_get(&self, module: ObjectId, name: &str) -> Option<Value> {
        self.heap.get(module).attr_dict()?.get(name).copied()
    }

    pub(crate) fn module_set(&mut self, module: ObjectId, name: Rc<str>, v: Value) {
        if let Some(d) = self.heap.get_mut(module).attr_dict_mut() {
            d.insert(name, v);
        }
    }

    pub(crate) fn builtin_get(&self, name: &str) -> Option<Value> {
        self.module_get(self.builtins, name)
    }

    fn closure_get(&self, function: Value, name: &str) -> Option<Value> {
        match self.payload(function)? {
            ObjPayload::Function(f) => f.closure.as_ref()?.get(name).copied(),
            _ => None,
        }
    }

    pub(crate) fn load_global(&mut self, fi: usize, name: &str) -> PyResult<Value> {
        let module = self.frames[fi].module;
        match self.module_get(module, name).or_else(|| self.builtin_get(name)) {
            Some(v) => Ok(v),
            None => Err(self.name_error(name)),
        }
    }

    /// A free name inside a nested function: the closure snapshot, then globals.
    pub(crate) fn load_nonlocal(&mut self, fi: usize, name: &str) -> PyResult<Value> {
        if let Some(v) = self.closure_get(self.frames[fi].function, name) {
            return Ok(v);
        }
        self.load_global(fi, name)
    }

    /// Class bodies see names they already defined before module globals.
    pub(crate) fn load_class_global(&mut self, fi: usize, name: &str) -> PyResult<Value> {
        if let Some(tid) = self.frames[fi].class {
            let obj = self.types[tid.index()].obj;
            if let Some(v) = self.module_get(obj, name) {
                return Ok(v);
            }
        }
        self.load_global(fi, name)
    }

    /// Slot of `name` among the fast locals of the frame a dynamic scope borrows.
    fn borrowed_local(&self, fi: usize, name: &str) -> Option<usize> {
        let target = self.frames[fi].locals_of?;
        let frame = self.frames.get(target)?;
        let i = frame.co.varname_index(name)?;
        Some(frame.locals_base + i as usize)
    }

    pub(crate) fn load_name(&mut self, fi: usize, name: &str) -> PyResult<Value> {
        if let Some(at) = self.borrowed_local(fi, name) {
            let v = self.stack[at];
            if !v.is_nil() {
                return Ok(v);
            }
        }
        if let Some(target) = self.frames[fi].locals_of {
            if let Some(v) = self.closure_get(self.frames[target].function, name) {
                return Ok(v);
            }
        }
        self.load_global(fi, name)
    }

    pub(crate) fn store_name(&mut self, fi: usize, name: Rc<str>, v: Value) {
        match self.borrowed_local(fi, &name) {
            Some(at) => self.stack[at] = v,
            None => {
                let module = self.frames[fi].module;
                self.module_set(module, name, v);
            }
        }
    }

    pub(crate) fn delete_name(&mut self, fi: usize, name: &str) -> PyResult<()> {
        if let Some(at) = self.borrowed_local(fi, name) {
            if !self.stack[at].is_nil() {
                self.stack[at] = Value::NIL;
                return Ok(());
            }
        }
        let module = self.frames[fi].module;
        let removed = self
            .heap
            .get_mut(module)
            .attr_dict_mut()
            .and_then(|d| d.shift_remove(name));
        match removed {
            Some(_) => Ok(()),
            None => Err(self.name_error(name)),
        }
    }

    /// LOAD_FUNCTION. Nested functions capture the defining frame's bound locals and its own
    /// closure, plus themselves so they can recurse.
    pub(crate) fn make_function(&mut self, fi: usize, index: u16) -> PyResult<Value> {
        let Some(decl) = self.frames[fi].co.func_decls.get(index as usize).cloned() else {
            return Err(self.runtime_error(format!("no function declaration #{index}")));
        };
        let frame = &self.frames[fi];
        let module = frame.module;
        let closure = if decl.nested {
            let mut captured = match self.payload(frame.function) {
                Some(ObjPayload::Function(f)) => f.closure.clone().unwrap_or_else(new_name_dict),
                _ => new_name_dict(),
            };
            for (i, name) in frame.co.varnames.iter().enumerate() {
                let v = self.stack[frame.locals_base + i];
                if !v.is_nil() {
                    captured.insert(name.clone(), v);
                }
            }
            Some(captured)
        } else {
            None
        };
        let name = decl.name().clone();
        let nested = decl.nested;
        let f = self.alloc(
            tp::FUNCTION,
            ObjectLayout::Plain,
            ObjPayload::Function(Function {
                decl,
                module,
                closure,
                owner: None,
            }),
        );
        if nested {
            if let Some(ObjPayload::Function(func)) = self.payload_mut(f) {
                if let Some(c) = func.closure.as_mut() {
                    c.entry(name).or_insert(f);
                }
            }
        }
        Ok(f)
    }

    /// Compiles `eval`/`exec` text against an unknown global scope. Never cached: the text is
    /// arbitrary runtime data.
    pub(crate) fn compile_dynamic(
        &mut self,
        source: &str,
        filename: &str,
        mode: CompileMode,
    ) -> PyResult<Rc<CodeObject>> {
        match self.frontend.compile_dynamic(source, filename, mode) {
            Ok(co) => Ok(co),
            Err(e) => Err(self.syntax_error(&e)),
        }
    }

    /// F-string fields come from code constants, so their texts repeat; the cache is still
    /// capped for code built with `exec`.
    fn compile_fstring_field(&mut self, source: &str) -> PyResult<Rc<CodeObject>> {
        if let Some(co) = self.fstring_cache.get(source) {
            return Ok(co.clone());
        }
        let co = self.compile_dynamic(source, "<fstring>", CompileMode::Eval)?;
        if self.fstring_cache.len() >= FSTRING_CACHE_LIMIT {
            self.fstring_cache.clear();
        }
        self.fstring_cache.insert(Rc::from(source), co.clone());
        Ok(co)
    }

    /// FSTRING_EVAL: evaluates a field against the locals of the frame that owns the f-string.
    pub(crate) fn fstring_eval(&mut self, fi: usize, source: &str) -> PyResult<Value> {
        let target = self.frames[fi].locals_of.unwrap_or(fi);
        let co = self.compile_fstring_field(source)?;
        let module = self.frames[fi].module;
        self.run_nested(co, module, Some(target))
    }
}
