use std::rc::Rc;

use pk_ir::CodeObject;

use crate::core::{ObjectId, TypeId, Value};

/// One activation record. Locals and the operand stack of a frame both live on the VM's shared
/// value stack: `p0` is where the frame's region starts (and where the stack is truncated to on
/// return), fast locals start at `locals_base` and operands at `stack_base`.
pub struct Frame {
    pub(crate) co: Rc<CodeObject>,
    /// Next instruction to execute.
    pub(crate) ip: usize,
    pub(crate) p0: usize,
    pub(crate) locals_base: usize,
    pub(crate) stack_base: usize,
    /// The function object being executed; nil for module and class bodies.
    pub(crate) function: Value,
    pub(crate) module: ObjectId,
    /// Frame whose fast locals LOAD_NAME / STORE_NAME see (eval, exec and f-string fields).
    pub(crate) locals_of: Option<usize>,
    /// Class being defined by a BEGIN_CLASS ... END_CLASS run in this frame.
    pub(crate) class: Option<TypeId>,
}

impl Frame {
    pub(crate) fn new(co: Rc<CodeObject>, p0: usize, function: Value, module: ObjectId) -> Self {
        let stack_base = p0 + co.nlocals();
        Self {
            co,
            ip: 0,
            p0,
            locals_base: p0,
            stack_base,
            function,
            module,
            locals_of: None,
            class: None,
        }
    }

    /// Moves the frame's region to start at `p0`; used when a generator resumes.
    pub(crate) fn rebase(&mut self, p0: usize) {
        self.p0 = p0;
        self.locals_base = p0;
        self.stack_base = p0 + self.co.nlocals();
    }

    /// Line of the instruction that is executing (the one before `ip`).
    pub(crate) fn current_line(&self) -> u32 {
        self.co.line_at(self.ip.saturating_sub(1))
    }
}
