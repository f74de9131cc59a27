//! Heap object layout.
//!
//! Every object starts with the same header (type, mark bit, attribute layout) followed by a
//! type-specific payload. Attributes are either a fixed row of slots, an attribute dictionary,
//! or absent.
use std::rc::Rc;

use pk_ir::FuncDecl;

use super::dict::{Dict, NameDict, Set};
use super::heap::ObjectId;
use super::value::{TypeId, Value, tp};
use crate::errors::PyResult;
use crate::vm::{Frame, Vm};

pub struct HeapObject {
    pub ty: TypeId,
    pub(crate) gc_marked: bool,
    pub attrs: Attrs,
    pub payload: ObjPayload,
}

impl HeapObject {
    pub fn new(ty: TypeId, layout: ObjectLayout, payload: ObjPayload) -> Self {
        let attrs = match layout {
            ObjectLayout::Plain => Attrs::None,
            ObjectLayout::Slots(n) => Attrs::Slots(vec![Value::NIL; n].into_boxed_slice()),
            ObjectLayout::Dict => Attrs::Dict(super::dict::new_name_dict()),
        };
        Self {
            ty,
            gc_marked: false,
            attrs,
            payload,
        }
    }

    pub fn attr_dict(&self) -> Option<&NameDict> {
        match &self.attrs {
            Attrs::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn attr_dict_mut(&mut self) -> Option<&mut NameDict> {
        match &mut self.attrs {
            Attrs::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn slots(&self) -> &[Value] {
        match &self.attrs {
            Attrs::Slots(s) => s,
            _ => &[],
        }
    }

    pub fn slots_mut(&mut self) -> &mut [Value] {
        match &mut self.attrs {
            Attrs::Slots(s) => s,
            _ => &mut [],
        }
    }

    /// Pushes every heap object this one references.
    pub(crate) fn trace(&self, out: &mut Vec<ObjectId>) {
        let mut push = |v: Value| {
            if let Some(id) = v.obj_id() {
                out.push(id);
            }
        };
        match &self.attrs {
            Attrs::None => {}
            Attrs::Slots(slots) => slots.iter().copied().for_each(&mut push),
            Attrs::Dict(d) => d.values().copied().for_each(&mut push),
        }
        match &self.payload {
            ObjPayload::List(items) => items.iter().copied().for_each(&mut push),
            ObjPayload::Tuple(items) => items.iter().copied().for_each(&mut push),
            ObjPayload::Dict(d) => {
                for (k, v) in d.items() {
                    push(k);
                    push(v);
                }
            }
            ObjPayload::Set(s) => s.values().for_each(&mut push),
            ObjPayload::Function(f) => {
                push(Value::obj(tp::MODULE, f.module));
                if let Some(closure) = &f.closure {
                    closure.values().copied().for_each(push);
                }
            }
            ObjPayload::Iter(state) => state.trace(&mut push),
            ObjPayload::Generator(g) => {
                g.values.iter().copied().for_each(&mut push);
                if let Some(frame) = &g.frame {
                    push(frame.function);
                    push(Value::obj(tp::MODULE, frame.module));
                }
            }
            ObjPayload::Empty
            | ObjPayload::Str(_)
            | ObjPayload::Bytes(_)
            | ObjPayload::Complex { .. }
            | ObjPayload::Range(_)
            | ObjPayload::Native(_)
            | ObjPayload::Type(_)
            | ObjPayload::Module(_) => {}
        }
    }
}

/// Requested attribute storage for `Vm::new_object`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectLayout {
    Plain,
    /// N value slots, initialised to nil.
    Slots(usize),
    Dict,
}

pub enum Attrs {
    None,
    Slots(Box<[Value]>),
    Dict(NameDict),
}

pub enum ObjPayload {
    Empty,
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Complex { re: f64, im: f64 },
    List(Vec<Value>),
    Tuple(Box<[Value]>),
    Dict(Dict),
    Set(Set),
    Range(RangeObj),
    Function(Function),
    Native(NativeFunc),
    Type(TypeId),
    Module(ModuleInfo),
    Iter(IterState),
    Generator(Box<Generator>),
}

/// Slot indices of the built-in objects that use `ObjectLayout::Slots`.
pub mod slot {
    /// bound method: [self, func]
    pub const SELF: usize = 0;
    pub const FUNC: usize = 1;
    /// slice: [start, stop, step]
    pub const START: usize = 0;
    pub const STOP: usize = 1;
    pub const STEP: usize = 2;
    /// star wrapper: [value, level]
    pub const STAR_VALUE: usize = 0;
    pub const STAR_LEVEL: usize = 1;
    /// super: [self, type the lookup starts above]
    pub const SUPER_SELF: usize = 0;
    pub const SUPER_TYPE: usize = 1;
    /// property: [getter, setter]
    pub const PROP_GET: usize = 0;
    pub const PROP_SET: usize = 1;
    /// staticmethod, classmethod: [function]
    pub const WRAPPED: usize = 0;
}

/// A scripted function: a shared declaration bound to the module it was defined in.
#[derive(Clone)]
pub struct Function {
    pub decl: Rc<FuncDecl>,
    pub module: ObjectId,
    /// Snapshot of the enclosing scope; only nested functions get one.
    pub closure: Option<NameDict>,
    /// Class whose body defined this function; `super()` starts above it.
    pub owner: Option<TypeId>,
}

pub type NativeFn = fn(&mut Vm, &Args) -> PyResult<Value>;

#[derive(Clone)]
pub struct NativeFunc {
    pub name: Rc<str>,
    /// Expected positional count including `self` for methods; -1 for variadic.
    pub argc: i16,
    pub takes_kwargs: bool,
    pub f: NativeFn,
}

/// Arguments handed to a native function. The originals stay on the value stack for the
/// duration of the call.
#[derive(Clone, Debug, Default)]
pub struct Args {
    pub pos: smallvec::SmallVec<[Value; 8]>,
    pub kw: smallvec::SmallVec<[(Rc<str>, Value); 2]>,
}

impl Args {
    pub fn len(&self) -> usize {
        self.pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<Value> {
        self.pos.get(i).copied()
    }

    /// Positional argument `i`, or `Value::NONE` when absent.
    pub fn at(&self, i: usize) -> Value {
        self.get(i).unwrap_or(Value::NONE)
    }

    pub fn kwarg(&self, name: &str) -> Option<Value> {
        self.kw.iter().find(|(k, _)| &**k == name).map(|(_, v)| *v)
    }
}

#[derive(Clone, Debug)]
pub struct ModuleInfo {
    pub name: Rc<str>,
    /// Package that relative imports resolve against.
    pub package: Rc<str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeObj {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeObj {
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            self.stop.saturating_sub(self.start)
        } else {
            self.start.saturating_sub(self.stop)
        };
        if span <= 0 {
            return 0;
        }
        let step = self.step.unsigned_abs() as i64;
        ((span + step - 1) / step) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, v: i64) -> bool {
        let in_bounds = if self.step > 0 {
            self.start <= v && v < self.stop
        } else {
            self.stop < v && v <= self.start
        };
        in_bounds && (v - self.start) % self.step == 0
    }
}

pub enum IterState {
    Range { cur: i64, stop: i64, step: i64 },
    /// list / tuple / bytes by item index, str by byte offset.
    Seq { seq: Value, index: usize },
    /// Snapshot taken when iteration began (dict keys, sets, `reversed`).
    Values { items: Vec<Value>, index: usize },
    Enumerate { inner: Value, count: i64 },
    Zip { inners: Box<[Value]> },
}

impl IterState {
    fn trace(&self, push: &mut impl FnMut(Value)) {
        match self {
            IterState::Range { .. } => {}
            IterState::Seq { seq, .. } => push(*seq),
            IterState::Values { items, .. } => items.iter().copied().for_each(push),
            IterState::Enumerate { inner, .. } => push(*inner),
            IterState::Zip { inners } => inners.iter().copied().for_each(push),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenState {
    Suspended,
    Running,
    Finished,
}

/// A suspended generator frame. Its locals and operand stack are parked in `values` and moved
/// back onto the value stack on resume.
pub struct Generator {
    pub(crate) frame: Option<Frame>,
    pub(crate) values: Vec<Value>,
    pub(crate) state: GenState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_length_and_membership() {
        let r = RangeObj {
            start: 0,
            stop: 10,
            step: 3,
        };
        assert_eq!(r.len(), 4);
        assert!(r.contains(9));
        assert!(!r.contains(10));
        let down = RangeObj {
            start: 5,
            stop: 0,
            step: -2,
        };
        assert_eq!(down.len(), 3);
        assert!(down.contains(1));
        assert!(!down.contains(0));
        assert!(RangeObj { start: 3, stop: 3, step: 1 }.is_empty());
    }

    #[test]
    fn slots_start_nil() {
        let obj = HeapObject::new(TypeId(1), ObjectLayout::Slots(2), ObjPayload::Empty);
        assert_eq!(obj.slots().len(), 2);
        assert!(obj.slots().iter().all(|v| v.is_nil()));
        assert!(obj.attr_dict().is_none());
    }
}
