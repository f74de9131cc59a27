//! The calling convention.
//!
//! A call site lays out `[callable, self_or_nil, args..., kwname, kwvalue, ...]` on the value
//! stack. Scripted functions bind their arguments into fast locals and get a frame in place of
//! that region; natives see an `Args` copy while the originals stay on the stack.
use std::rc::Rc;

use pk_ir::FuncDecl;
use smallvec::{SmallVec, smallvec};

use crate::core::object::{GenState, Generator, slot};
use crate::core::{Args, Dict, DictKey, ObjPayload, ObjectLayout, Value, tp};
use crate::errors::PyResult;

use super::{Frame, Vm};

/// Outcome of starting a call from the step loop.
pub(crate) enum Called {
    /// Finished synchronously; the stack is back at its pre-call height.
    Value(Value),
    /// A frame was pushed; its RETURN_VALUE delivers the result.
    Frame,
}

impl Vm {
    /// Calls the callable laid out on top of the stack and runs it to completion. The stack is
    /// restored to its pre-call height and the result is also left in the return register.
    pub fn vectorcall(&mut self, argc: usize, kwargc: usize) -> PyResult<Value> {
        let p0 = self.stack.len() - 2 - argc - 2 * kwargc;
        let result = match self.vectorcall_op(argc, kwargc) {
            Ok(Called::Value(v)) => Ok(v),
            Ok(Called::Frame) => {
                let base = self.frames.len();
                self.run_frames(base)
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(v) => {
                self.ret = v;
                Ok(v)
            }
            Err(e) => {
                self.stack.truncate(p0);
                Err(e)
            }
        }
    }

    pub fn call(&mut self, callable: Value, args: &[Value]) -> PyResult<Value> {
        self.stack.push(callable);
        self.stack.push(Value::NIL);
        self.stack.extend_from_slice(args);
        self.vectorcall(args.len(), 0)
    }

    /// Calls an attribute found on `receiver`'s class. Functions get `receiver` as `self`.
    pub(crate) fn call_method(
        &mut self,
        f: Value,
        receiver: Value,
        args: &[Value],
    ) -> PyResult<Value> {
        let bind = matches!(f.ty(), tp::FUNCTION | tp::NATIVE_FUNC);
        self.stack.push(f);
        self.stack.push(if bind { receiver } else { Value::NIL });
        self.stack.extend_from_slice(args);
        self.vectorcall(args.len(), 0)
    }

    /// Calls the magic method `name` of `receiver` if its class defines one.
    pub(crate) fn call_magic(
        &mut self,
        receiver: Value,
        name: &str,
        args: &[Value],
    ) -> PyResult<Option<Value>> {
        match self.find_type_attr(receiver.ty(), name) {
            Some(f) => self.call_method(f, receiver, args).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn vectorcall_op(&mut self, argc: usize, kwargc: usize) -> PyResult<Called> {
        let p0 = self.stack.len() - 2 - argc - 2 * kwargc;
        let callable = self.stack[p0];
        match callable.ty() {
            tp::BOUND_METHOD => {
                let (receiver, func) = match self.heap_obj(callable) {
                    Some(o) => (o.slots()[slot::SELF], o.slots()[slot::FUNC]),
                    None => (Value::NIL, Value::NIL),
                };
                self.stack[p0] = func;
                self.stack[p0 + 1] = receiver;
                self.vectorcall_op(argc, kwargc)
            }
            tp::FUNCTION => self.call_function(p0, argc, kwargc),
            tp::NATIVE_FUNC => self.call_native(p0, argc, kwargc).map(Called::Value),
            tp::TYPE => self.call_type(p0, argc, kwargc).map(Called::Value),
            _ => {
                if let Some(f) = self.find_type_attr(callable.ty(), "__call__") {
                    self.stack[p0] = f;
                    self.stack[p0 + 1] = callable;
                    return self.vectorcall_op(argc, kwargc);
                }
                let name = self.type_name(callable);
                Err(self.type_error(format!("'{name}' object is not callable")))
            }
        }
    }

    fn call_function(&mut self, p0: usize, argc: usize, kwargc: usize) -> PyResult<Called> {
        let callable = self.stack[p0];
        let (decl, module) = match self.heap_obj(callable).map(|o| &o.payload) {
            Some(ObjPayload::Function(f)) => (f.decl.clone(), f.module),
            _ => return Err(self.type_error("'function' object is corrupted")),
        };
        let locals = self.bind_args(&decl, p0, argc, kwargc)?;
        self.stack.truncate(p0);
        let co = decl.code.clone();
        if decl.is_generator() {
            let generator = Generator {
                frame: Some(Frame::new(co, 0, callable, module)),
                values: locals.into_vec(),
                state: GenState::Suspended,
            };
            let gen_obj = self.alloc(
                tp::GENERATOR,
                ObjectLayout::Plain,
                ObjPayload::Generator(Box::new(generator)),
            );
            return Ok(Called::Value(gen_obj));
        }
        self.stack.extend_from_slice(&locals);
        // the callable stays alive through `Frame::function`
        self.push_frame(Frame::new(co, p0, callable, module))?;
        Ok(Called::Frame)
    }

    /// Binds call-site arguments to the declaration's fast-local slots.
    fn bind_args(
        &mut self,
        decl: &FuncDecl,
        p0: usize,
        argc: usize,
        kwargc: usize,
    ) -> PyResult<SmallVec<[Value; 16]>> {
        let co = decl.code.clone();
        let name = decl.name().clone();
        let mut locals: SmallVec<[Value; 16]> = smallvec![Value::NIL; co.nlocals()];

        let receiver = self.stack[p0 + 1];
        let mut pos: SmallVec<[Value; 8]> = SmallVec::new();
        if !receiver.is_nil() {
            pos.push(receiver);
        }
        pos.extend_from_slice(&self.stack[p0 + 2..p0 + 2 + argc]);

        let nargs = decl.args.len();
        for (&slot, &v) in decl.args.iter().zip(pos.iter()) {
            locals[slot as usize] = v;
        }
        for kw in &decl.kwargs {
            locals[kw.index as usize] = self.const_value(&kw.value);
        }
        let extra: SmallVec<[Value; 8]> = pos.iter().skip(nargs).copied().collect();
        match decl.starred_arg {
            Some(slot) => locals[slot as usize] = self.new_tuple(extra.to_vec()),
            None => {
                if extra.len() > decl.kwargs.len() {
                    return Err(self.type_error(format!(
                        "{name}() takes {} positional arguments but {} were given",
                        nargs + decl.kwargs.len(),
                        pos.len()
                    )));
                }
                for (kw, &v) in decl.kwargs.iter().zip(extra.iter()) {
                    locals[kw.index as usize] = v;
                }
            }
        }

        let mut extra_kw = decl.starred_kwarg.map(|_| Dict::new());
        let kw_start = p0 + 2 + argc;
        for i in 0..kwargc {
            let key_v = self.stack[kw_start + 2 * i];
            let v = self.stack[kw_start + 2 * i + 1];
            let Some(key) = self.str_value(key_v) else {
                return Err(self.type_error("keywords must be strings"));
            };
            let positional = decl
                .args
                .iter()
                .position(|&s| co.varname(s).is_some_and(|n| **n == *key));
            if let Some(pi) = positional {
                if pi < pos.len() {
                    return Err(self.type_error(format!(
                        "{name}() got multiple values for argument '{key}'"
                    )));
                }
                locals[decl.args[pi] as usize] = v;
            } else if let Some(ki) = decl.kwargs.iter().position(|k| *k.key == *key) {
                if decl.starred_arg.is_none() && ki < extra.len() {
                    return Err(self.type_error(format!(
                        "{name}() got multiple values for argument '{key}'"
                    )));
                }
                locals[decl.kwargs[ki].index as usize] = v;
            } else if let Some(d) = extra_kw.as_mut() {
                d.insert(DictKey::Str(key), key_v, v);
            } else {
                return Err(self.type_error(format!(
                    "{name}() got an unexpected keyword argument '{key}'"
                )));
            }
        }
        if let Some(slot) = decl.starred_kwarg {
            let d = extra_kw.take().unwrap_or_default();
            locals[slot as usize] = self.new_dict(d);
        }
        for &slot in &decl.args {
            if locals[slot as usize].is_nil() {
                let arg = co.varname(slot).cloned().unwrap_or_else(|| Rc::from("?"));
                return Err(self.type_error(format!(
                    "{name}() missing required positional argument '{arg}'"
                )));
            }
        }
        Ok(locals)
    }

    /// Copies the call-site arguments into an `Args`.
    fn collect_args(&mut self, p0: usize, argc: usize, kwargc: usize) -> PyResult<Args> {
        let mut args = Args::default();
        let receiver = self.stack[p0 + 1];
        if !receiver.is_nil() {
            args.pos.push(receiver);
        }
        args.pos.extend_from_slice(&self.stack[p0 + 2..p0 + 2 + argc]);
        let kw_start = p0 + 2 + argc;
        for i in 0..kwargc {
            let key_v = self.stack[kw_start + 2 * i];
            let Some(key) = self.str_value(key_v) else {
                return Err(self.type_error("keywords must be strings"));
            };
            args.kw.push((key, self.stack[kw_start + 2 * i + 1]));
        }
        Ok(args)
    }

    fn call_native(&mut self, p0: usize, argc: usize, kwargc: usize) -> PyResult<Value> {
        let callable = self.stack[p0];
        let (name, expected, takes_kwargs, f) = match self.heap_obj(callable).map(|o| &o.payload) {
            Some(ObjPayload::Native(n)) => (n.name.clone(), n.argc, n.takes_kwargs, n.f),
            _ => return Err(self.type_error("native function is corrupted")),
        };
        let args = self.collect_args(p0, argc, kwargc)?;
        if !takes_kwargs && !args.kw.is_empty() {
            return Err(self.type_error(format!("{name}() takes no keyword arguments")));
        }
        if expected >= 0 && args.len() != expected as usize {
            return Err(self.type_error(format!(
                "{name}() takes exactly {expected} argument(s) ({} given)",
                args.len()
            )));
        }
        let r = f(self, &args)?;
        self.stack.truncate(p0);
        Ok(r)
    }

    fn call_type(&mut self, p0: usize, argc: usize, kwargc: usize) -> PyResult<Value> {
        let callable = self.stack[p0];
        let Some(tid) = self.as_type(callable) else {
            return Err(self.type_error("'type' object is corrupted"));
        };
        if let Some(ctor) = self.types[tid.index()].ctor {
            let args = self.collect_args(p0, argc, kwargc)?;
            let r = ctor(self, &args)?;
            self.stack.truncate(p0);
            return Ok(r);
        }
        if !self.types[tid.index()].subclassable {
            let name = self.types[tid.index()].name.clone();
            return Err(self.type_error(format!("cannot create '{name}' instances")));
        }
        let instance = self.alloc(tid, ObjectLayout::Dict, ObjPayload::Empty);
        match self.find_type_attr(tid, "__init__") {
            Some(init) => {
                self.stack[p0] = init;
                self.stack[p0 + 1] = instance;
                let r = self.vectorcall(argc, kwargc)?;
                if !r.is_none() {
                    let name = self.type_name(r);
                    return Err(self.type_error(format!(
                        "__init__() should return None, not '{name}'"
                    )));
                }
            }
            None => {
                if argc + kwargc > 0 {
                    let name = self.types[tid.index()].name.clone();
                    return Err(self.type_error(format!("{name}() takes no arguments")));
                }
                self.stack.truncate(p0);
            }
        }
        Ok(instance)
    }

    /// CALL_VARGS: spreads `[callable, self, args_tuple, kwargs_dict?]` into a plain call layout
    /// and returns `(argc, kwargc)`.
    pub(crate) fn spread_vargs(&mut self, has_kwargs: bool) -> PyResult<(usize, usize)> {
        let kwargs = if has_kwargs { Some(self.pop()) } else { None };
        let args = self.pop();
        let items = self.seq_items(args).unwrap_or_default();
        let argc = items.len();
        self.stack.extend(items);
        let mut kwargc = 0;
        if let Some(d) = kwargs {
            let pairs: Vec<(Value, Value)> = match self.heap_obj(d).map(|o| &o.payload) {
                Some(ObjPayload::Dict(d)) => d.items().collect(),
                _ => Vec::new(),
            };
            for (k, v) in pairs {
                if k.ty() != tp::STR {
                    return Err(self.type_error("keywords must be strings"));
                }
                self.stack.push(k);
                self.stack.push(v);
                kwargc += 1;
            }
        }
        Ok((argc, kwargc))
    }
}
