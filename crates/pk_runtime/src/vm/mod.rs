//! Bytecode virtual machine.
//!
//! One value stack is shared by every frame; the frame stack is explicit and the step loop in
//! `dispatch` never recurses on the host stack for a scripted call. Natives that call back into
//! scripted code (constructors, magic methods, generator resumption, `eval`) run a nested step
//! loop over the frames they pushed.
mod call;
mod dispatch;
mod exception;
mod frame;
mod gc;
pub(crate) mod ops;
mod types;

use std::rc::Rc;

use hashbrown::HashMap;
use pk_core::{FixedPool, PoolBox};
use pk_ir::{CodeObject, CompileMode, Frontend};

use crate::config::VmConfig;
use crate::core::{HeapObject, ManagedHeap, ObjPayload, ObjectId, ObjectLayout, Value};
use crate::errors::{PyResult, RuntimeError, TraceEntry};
use crate::modules::ModuleLoader;

pub(crate) use call::Called;
pub use frame::Frame;
pub use types::TypeInfo;

/// Receives everything `print` and the interactive echo write.
pub type OutputSink = Box<dyn FnMut(&str)>;

pub struct Vm {
    pub(crate) heap: ManagedHeap,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<PoolBox<Frame>>,
    frame_pool: FixedPool<Frame>,
    pub(crate) types: Vec<TypeInfo>,
    pub(crate) builtins: ObjectId,
    pub(crate) main: ObjectId,
    pub(crate) modules: HashMap<Rc<str>, ObjectId>,
    pub(crate) frontend: Rc<dyn Frontend>,
    pub(crate) loader: Option<Box<dyn ModuleLoader>>,
    pub(crate) config: VmConfig,
    /// The exception being propagated, if any.
    pub(crate) pending: Option<Value>,
    pub(crate) traceback: Vec<TraceEntry>,
    /// Return register: the value of the last finished call.
    pub(crate) ret: Value,
    stdout: OutputSink,
    /// Interned string constants, shared by every code object that mentions them.
    pub(crate) str_consts: HashMap<Rc<str>, ObjectId>,
    /// Compiled f-string fields by source text.
    pub(crate) fstring_cache: HashMap<Rc<str>, Rc<CodeObject>>,
    /// Containers whose repr is being built; breaks cycles.
    pub(crate) repr_guard: Vec<ObjectId>,
    /// Step loops currently running on the host stack.
    pub(crate) nested_loops: usize,
}

impl Vm {
    pub fn new(frontend: Rc<dyn Frontend>) -> Self {
        Self::with_config(frontend, VmConfig::default())
    }

    pub fn with_config(frontend: Rc<dyn Frontend>, config: VmConfig) -> Self {
        let mut vm = Vm {
            heap: ManagedHeap::new(config.gc_min_threshold),
            stack: Vec::with_capacity(1024),
            frames: Vec::with_capacity(64),
            frame_pool: FixedPool::new(config.frame_pool_blocks),
            types: Vec::with_capacity(64),
            builtins: ObjectId(0),
            main: ObjectId(0),
            modules: HashMap::new(),
            frontend,
            loader: None,
            config,
            pending: None,
            traceback: Vec::new(),
            ret: Value::NONE,
            stdout: Box::new(|s| print!("{s}")),
            str_consts: HashMap::new(),
            fstring_cache: HashMap::new(),
            repr_guard: Vec::new(),
            nested_loops: 0,
        };
        vm.init_types();
        vm.builtins = vm.new_module_object("builtins", "");
        vm.main = vm.new_module_object("__main__", "");
        crate::builtins::register(&mut vm);
        crate::methods::register(&mut vm);
        vm
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn set_stdout(&mut self, sink: impl FnMut(&str) + 'static) {
        self.stdout = Box::new(sink);
    }

    pub fn set_loader(&mut self, loader: impl ModuleLoader + 'static) {
        self.loader = Some(Box::new(loader));
    }

    pub(crate) fn write_out(&mut self, s: &str) {
        (self.stdout)(s);
    }

    /// Compiles `source` as a module body and runs it in `__main__`.
    pub fn exec(&mut self, source: &str, filename: &str) -> Result<Value, RuntimeError> {
        self.exec_mode(source, filename, CompileMode::Exec)
    }

    /// Evaluates a single expression in `__main__`.
    pub fn eval(&mut self, source: &str) -> Result<Value, RuntimeError> {
        self.exec_mode(source, "<eval>", CompileMode::Eval)
    }

    pub fn exec_mode(
        &mut self,
        source: &str,
        filename: &str,
        mode: CompileMode,
    ) -> Result<Value, RuntimeError> {
        let co = self.frontend.compile(source, filename, mode)?;
        self.run_code(co)
    }

    /// Runs an already compiled unit in `__main__`.
    pub fn run_code(&mut self, co: Rc<CodeObject>) -> Result<Value, RuntimeError> {
        let main = self.main;
        let result = self.run_nested(co, main, None);
        self.finish(result)
    }

    /// Converts an internal result at the embedding boundary.
    pub fn finish<T>(&mut self, result: PyResult<T>) -> Result<T, RuntimeError> {
        result.map_err(|_| self.take_error())
    }

    pub fn main_module(&self) -> Value {
        Value::obj(crate::core::tp::MODULE, self.main)
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.heap.get(self.main).attr_dict()?.get(name).copied()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        if let Some(d) = self.heap.get_mut(self.main).attr_dict_mut() {
            d.insert(Rc::from(name), value);
        }
    }

    /// Pushes one value for a following `vectorcall`.
    pub fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn live_objects(&self) -> usize {
        self.heap.live_objects()
    }

    pub fn gc_collections(&self) -> usize {
        self.heap.collections()
    }

    pub(crate) fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::NIL)
    }

    pub(crate) fn top(&self) -> Value {
        self.stack.last().copied().unwrap_or(Value::NIL)
    }

    /// Value `n` below the top; `peek(0)` is the top.
    pub(crate) fn peek(&self, n: usize) -> Value {
        self.stack[self.stack.len() - 1 - n]
    }

    /// Drops the `n` operands an instruction consumed and pushes its result.
    pub(crate) fn replace_top(&mut self, n: usize, v: Value) {
        let len = self.stack.len();
        self.stack.truncate(len - n);
        self.stack.push(v);
    }

    pub(crate) fn alloc(&mut self, ty: crate::TypeId, layout: ObjectLayout, payload: ObjPayload) -> Value {
        let id = self.heap.alloc(HeapObject::new(ty, layout, payload), false);
        Value::obj(ty, id)
    }

    /// Allocates an object the collector never frees.
    pub(crate) fn alloc_permanent(
        &mut self,
        ty: crate::TypeId,
        layout: ObjectLayout,
        payload: ObjPayload,
    ) -> Value {
        let id = self.heap.alloc(HeapObject::new(ty, layout, payload), true);
        Value::obj(ty, id)
    }

    pub(crate) fn heap_obj(&self, v: Value) -> Option<&HeapObject> {
        v.obj_id().map(|id| self.heap.get(id))
    }

    /// Creates an object of `ty` with the requested attribute storage.
    pub fn new_object(&mut self, ty: crate::TypeId, layout: ObjectLayout) -> Value {
        self.alloc(ty, layout, ObjPayload::Empty)
    }

    pub fn slot(&self, obj: Value, index: usize) -> Option<Value> {
        self.heap_obj(obj)?.slots().get(index).copied()
    }

    /// Returns false when `obj` has no such slot.
    pub fn set_slot(&mut self, obj: Value, index: usize, v: Value) -> bool {
        let Some(id) = obj.obj_id() else {
            return false;
        };
        match self.heap.get_mut(id).slots_mut().get_mut(index) {
            Some(slot) => {
                *slot = v;
                true
            }
            None => false,
        }
    }

    fn push_frame(&mut self, frame: Frame) -> PyResult<()> {
        if self.frames.len() >= self.config.max_recursion_depth {
            return Err(self.raise_new(
                crate::core::tp::RECURSION_ERROR,
                crate::errors::messages::RECURSION_LIMIT,
            ));
        }
        self.frames.push(self.frame_pool.alloc(frame));
        Ok(())
    }

    /// Runs `co` in a fresh frame on top of the current stack and returns its value.
    pub(crate) fn run_nested(
        &mut self,
        co: Rc<CodeObject>,
        module: ObjectId,
        locals_of: Option<usize>,
    ) -> PyResult<Value> {
        let p0 = self.stack.len();
        self.stack.resize(p0 + co.nlocals(), Value::NIL);
        let mut frame = Frame::new(co, p0, Value::NIL, module);
        frame.locals_of = locals_of;
        if let Err(e) = self.push_frame(frame) {
            self.stack.truncate(p0);
            return Err(e);
        }
        let base = self.frames.len();
        self.run_frames(base)
    }
}
