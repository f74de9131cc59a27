//! Raising and reporting exceptions.
use std::rc::Rc;

use crate::core::{ObjPayload, ObjectLayout, TypeId, Value, tp};
use crate::errors::{PyException, RuntimeError, TraceEntry, Unwind, messages};

use super::{Frame, Vm};

impl Vm {
    /// Builds an exception instance whose `args` is `args`.
    pub(crate) fn new_exception(&mut self, tid: TypeId, args: &[Value]) -> Value {
        let args = self.new_tuple(args.to_vec());
        let exc = self.alloc(tid, ObjectLayout::Dict, ObjPayload::Empty);
        if let Some(d) = exc.obj_id().and_then(|id| self.heap.get_mut(id).attr_dict_mut()) {
            d.insert(Rc::from("args"), args);
        }
        exc
    }

    /// Makes `exc` the pending exception and starts a fresh traceback.
    pub(crate) fn raise(&mut self, exc: Value) -> Unwind {
        self.pending = Some(exc);
        self.traceback.clear();
        Unwind
    }

    /// Raises a fresh instance of `tid` with `msg` as its only argument.
    pub fn raise_new(&mut self, tid: TypeId, msg: impl AsRef<str>) -> Unwind {
        let msg = self.new_str(msg.as_ref());
        let exc = self.new_exception(tid, &[msg]);
        self.raise(exc)
    }

    /// `raise X`: instantiates classes, raises instances as they are.
    pub(crate) fn raise_value(&mut self, v: Value) -> Unwind {
        if let Some(tid) = self.as_type(v) {
            if self.is_subtype(tid, tp::BASE_EXCEPTION) {
                return match self.call(v, &[]) {
                    Ok(exc) => self.raise(exc),
                    Err(e) => e,
                };
            }
        } else if self.isinstance(v, tp::BASE_EXCEPTION) {
            return self.raise(v);
        }
        self.type_error(messages::BAD_EXCEPTION)
    }

    pub fn type_error(&mut self, msg: impl AsRef<str>) -> Unwind {
        self.raise_new(tp::TYPE_ERROR, msg)
    }

    pub fn value_error(&mut self, msg: impl AsRef<str>) -> Unwind {
        self.raise_new(tp::VALUE_ERROR, msg)
    }

    pub(crate) fn index_error(&mut self, msg: impl AsRef<str>) -> Unwind {
        self.raise_new(tp::INDEX_ERROR, msg)
    }

    pub(crate) fn key_error(&mut self, key: Value) -> Unwind {
        let exc = self.new_exception(tp::KEY_ERROR, &[key]);
        self.raise(exc)
    }

    pub(crate) fn name_error(&mut self, name: &str) -> Unwind {
        self.raise_new(tp::NAME_ERROR, format!("name '{name}' is not defined"))
    }

    pub(crate) fn attribute_error(&mut self, msg: impl AsRef<str>) -> Unwind {
        self.raise_new(tp::ATTRIBUTE_ERROR, msg)
    }

    pub(crate) fn runtime_error(&mut self, msg: impl AsRef<str>) -> Unwind {
        self.raise_new(tp::RUNTIME_ERROR, msg)
    }

    pub(crate) fn zero_division(&mut self) -> Unwind {
        self.raise_new(tp::ZERO_DIVISION_ERROR, messages::DIVISION_BY_ZERO)
    }

    pub(crate) fn syntax_error(&mut self, err: &pk_syntax::CompileError) -> Unwind {
        self.raise_new(
            tp::SYNTAX_ERROR,
            format!("{} (\"{}\", line {})", err.message, err.filename, err.line),
        )
    }

    /// True when the pending exception is an instance of `tid`.
    pub(crate) fn pending_is(&self, tid: TypeId) -> bool {
        self.pending.is_some_and(|e| self.isinstance(e, tid))
    }

    pub(crate) fn clear_pending(&mut self) {
        self.pending = None;
        self.traceback.clear();
    }

    pub(crate) fn record_trace(&mut self, frame: &Frame) {
        let function = if frame.function.is_nil() {
            frame.co.name.to_string()
        } else {
            match self.heap_obj(frame.function).map(|o| &o.payload) {
                Some(ObjPayload::Function(f)) => f.decl.name().to_string(),
                _ => frame.co.name.to_string(),
            }
        };
        self.traceback.push(TraceEntry {
            filename: frame.co.filename.to_string(),
            line: frame.current_line(),
            function,
        });
    }

    /// `str(exc)`: the single argument, nothing for none, the args tuple otherwise. Key errors
    /// show the key's repr.
    pub(crate) fn exception_message(&mut self, exc: Value) -> String {
        let args = self
            .heap_obj(exc)
            .and_then(|o| o.attr_dict())
            .and_then(|d| d.get("args").copied());
        let Some(args) = args else {
            return String::new();
        };
        let items = self.seq_items(args).unwrap_or_default();
        let text = match items.as_slice() {
            [] => Ok(Rc::from("")),
            [one] if self.isinstance(exc, tp::KEY_ERROR) => self.py_repr(*one),
            [one] => self.py_str(*one),
            _ => self.py_repr(args),
        };
        match text {
            Ok(s) => s.to_string(),
            Err(_) => {
                self.clear_pending();
                String::from("<exception str() failed>")
            }
        }
    }

    /// Takes the pending exception for the embedder.
    pub fn take_error(&mut self) -> RuntimeError {
        let traceback = std::mem::take(&mut self.traceback);
        let Some(exc) = self.pending.take() else {
            return RuntimeError::Exception(PyException {
                type_name: "RuntimeError".into(),
                message: "no exception is pending".into(),
                traceback,
            });
        };
        // rooted on the stack while a user __str__ runs
        self.stack.push(exc);
        let message = self.exception_message(exc);
        self.stack.pop();
        RuntimeError::Exception(PyException {
            type_name: self.type_name(exc).to_string(),
            message,
            traceback,
        })
    }
}
