//! Per-scope emission state: the code object under construction, the block cursor and the
//! expression stack.
use std::rc::Rc;

use pk_ir::{
    Bytecode, BytecodeEx, CodeBlock, CodeBlockType, CodeObject, Constant, KwArg, NO_ARG,
    NO_BLOCK, Opcode,
};

use super::expr::{EmitResult, ExprBox};

/// Line operand meaning "same line as the previous instruction".
pub(crate) const KEEPLINE: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NameScope {
    Local,
    Global,
    /// Scope decided at run time (dynamic eval/exec).
    GlobalUnknown,
}

/// Parameter metadata gathered while compiling a `def` or `lambda` header.
#[derive(Debug, Default)]
pub(crate) struct FuncHeader {
    pub args: Vec<u16>,
    pub kwargs: Vec<KwArg>,
    pub starred_arg: Option<u16>,
    pub starred_kwarg: Option<u16>,
    pub nested: bool,
}

impl FuncHeader {
    pub fn has_param(&self, co: &CodeObject, name: &str) -> bool {
        let slot = co.varname_index(name);
        slot.is_some_and(|s| {
            self.args.contains(&s)
                || self.kwargs.iter().any(|k| k.index == s)
                || self.starred_arg == Some(s)
                || self.starred_kwarg == Some(s)
        })
    }
}

pub(crate) struct CodeEmitContext {
    pub co: CodeObject,
    pub func: Option<FuncHeader>,
    /// Nesting depth: 0 for the module, 1 for a top-level function.
    pub level: usize,
    pub curr_iblock: u16,
    pub is_compiling_class: bool,
    pub global_names: Vec<Rc<str>>,
    s_expr: Vec<ExprBox>,
}

impl CodeEmitContext {
    pub fn new(co: CodeObject, level: usize) -> Self {
        Self {
            co,
            func: None,
            level,
            curr_iblock: NO_BLOCK,
            is_compiling_class: false,
            global_names: Vec::new(),
            s_expr: Vec::new(),
        }
    }

    fn push_code(&mut self, op: Opcode, arg: u16, line: u32, is_virtual: bool) -> usize {
        let line = if line == KEEPLINE {
            self.co
                .codes_ex
                .last()
                .map(|ex| ex.line)
                .unwrap_or(self.co.start_line)
        } else {
            line
        };
        self.co.codes.push(Bytecode::new(op, arg));
        self.co.codes_ex.push(BytecodeEx {
            line,
            is_virtual,
            block: self.curr_iblock,
        });
        self.co.codes.len() - 1
    }

    pub fn emit(&mut self, op: Opcode, arg: u16, line: u32) -> usize {
        self.push_code(op, arg, line, false)
    }

    pub fn emit_virtual(&mut self, op: Opcode, arg: u16, line: u32) -> usize {
        self.push_code(op, arg, line, true)
    }

    pub fn revert_last_emit(&mut self) {
        self.co.codes.pop();
        self.co.codes_ex.pop();
    }

    pub fn last_code(&self) -> Option<Bytecode> {
        self.co.codes.last().copied()
    }

    /// True when some forward jump already lands on `index`.
    pub fn is_jump_target(&self, index: usize) -> bool {
        self.co
            .codes
            .iter()
            .enumerate()
            .any(|(i, bc)| bc.op.is_forward_jump() && bc.jump_target(i) == Some(index))
    }

    /// Small integers travel in the operand; anything wider goes through the constant pool.
    pub fn emit_int(&mut self, value: i64, line: u32) -> usize {
        match i16::try_from(value) {
            Ok(small) => self.emit(Opcode::LoadSmallInt, small as u16, line),
            Err(_) => {
                let index = self.add_const(Constant::Int(value));
                self.emit(Opcode::LoadConst, index, line)
            }
        }
    }

    /// Points the jump at `index` to the next instruction to be emitted.
    pub fn patch_jump(&mut self, index: usize) {
        let offset = self.co.codes.len() as isize - index as isize;
        if let Some(bc) = self.co.codes.get_mut(index) {
            bc.arg = offset as i16 as u16;
        }
    }

    pub fn enter_block(&mut self, ty: CodeBlockType) -> u16 {
        self.co.blocks.push(CodeBlock {
            ty,
            parent: self.curr_iblock,
            start: self.co.codes.len(),
            end: None,
            end2: None,
        });
        self.curr_iblock = (self.co.blocks.len() - 1) as u16;
        self.curr_iblock
    }

    pub fn exit_block(&mut self) {
        let end = self.co.codes.len();
        let block = &mut self.co.blocks[self.curr_iblock as usize];
        block.end = Some(end);
        self.curr_iblock = block.parent;
    }

    /// Innermost enclosing loop block, if any.
    pub fn get_loop(&self) -> Option<u16> {
        let mut index = self.curr_iblock;
        loop {
            let block = &self.co.blocks[index as usize];
            if block.ty.is_loop() {
                return Some(index);
            }
            if index == NO_BLOCK {
                return None;
            }
            index = block.parent;
        }
    }

    pub fn add_varname(&mut self, name: &str) -> u16 {
        if let Some(i) = self.co.varname_index(name) {
            return i;
        }
        self.co.varnames.insert_full(Rc::from(name)).0 as u16
    }

    pub fn add_name(&mut self, name: &str) -> u16 {
        self.co.add_name(name)
    }

    /// Table size is checked when the context is popped, so the operand may wrap until then.
    pub fn add_const(&mut self, value: Constant) -> u16 {
        self.co.add_const(value) as u16
    }

    pub fn add_const_str(&mut self, s: &str) -> u16 {
        self.add_const(Constant::Str(Rc::from(s)))
    }

    pub fn emit_store_name(&mut self, scope: NameScope, name: &str, line: u32) {
        match scope {
            NameScope::Local => {
                let i = self.add_varname(name);
                self.emit(Opcode::StoreFast, i, line);
            }
            NameScope::Global => {
                let i = self.add_name(name);
                self.emit(Opcode::StoreGlobal, i, line);
            }
            NameScope::GlobalUnknown => {
                let i = self.add_name(name);
                self.emit(Opcode::StoreName, i, line);
            }
        }
    }

    pub fn s_push(&mut self, e: ExprBox) {
        self.s_expr.push(e);
    }

    pub fn s_pop(&mut self) -> Option<ExprBox> {
        self.s_expr.pop()
    }

    pub fn s_top(&self) -> Option<&ExprBox> {
        self.s_expr.last()
    }

    /// Pops the top expression and emits its value.
    pub fn s_emit_top(&mut self) -> EmitResult {
        match self.s_expr.pop() {
            Some(e) => e.emit(self),
            None => Ok(()),
        }
    }

    /// Applies `count` decorators sitting on the expression stack to the value on top of the VM
    /// stack, innermost (last written) first.
    pub fn s_emit_decorators(&mut self, count: usize) -> EmitResult {
        for _ in 0..count {
            let Some(deco) = self.s_expr.pop() else {
                break;
            };
            let line = deco.line;
            deco.emit(self)?; // [obj, deco]
            self.emit(Opcode::RotTwo, NO_ARG, line); // [deco, obj]
            self.emit(Opcode::LoadNull, NO_ARG, line); // [deco, obj, NULL]
            self.emit(Opcode::RotTwo, NO_ARG, line); // [deco, NULL, obj]
            self.emit(Opcode::Call, 1, line);
        }
        Ok(())
    }

    pub fn s_clean(&mut self) {
        self.s_expr.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CodeEmitContext {
        CodeEmitContext::new(CodeObject::new(Rc::from("t.py"), "<module>"), 0)
    }

    #[test]
    fn small_ints_skip_the_constant_pool() {
        let mut c = ctx();
        c.emit_int(-5, 1);
        c.emit_int(1 << 20, 1);
        assert_eq!(c.co.codes[0], Bytecode::new(Opcode::LoadSmallInt, (-5i16) as u16));
        assert_eq!(c.co.codes[1].op, Opcode::LoadConst);
        assert_eq!(c.co.consts, vec![Constant::Int(1 << 20)]);
    }

    #[test]
    fn keepline_copies_previous_line() {
        let mut c = ctx();
        c.emit(Opcode::LoadNone, NO_ARG, 7);
        c.emit(Opcode::PopTop, NO_ARG, KEEPLINE);
        assert_eq!(c.co.codes_ex[1].line, 7);
    }

    #[test]
    fn blocks_nest_and_find_loops() {
        let mut c = ctx();
        assert_eq!(c.get_loop(), None);
        let outer = c.enter_block(CodeBlockType::WhileLoop);
        c.emit(Opcode::NoOp, NO_ARG, 1);
        c.enter_block(CodeBlockType::ContextManager);
        assert_eq!(c.get_loop(), Some(outer));
        c.exit_block();
        c.exit_block();
        assert_eq!(c.curr_iblock, NO_BLOCK);
        assert_eq!(c.co.blocks[outer as usize].end, Some(1));
    }

    #[test]
    fn patch_jump_targets_next_instruction() {
        let mut c = ctx();
        let j = c.emit(Opcode::JumpForward, NO_ARG, 1);
        c.emit(Opcode::LoadNone, NO_ARG, 1);
        c.emit(Opcode::PopTop, NO_ARG, 1);
        c.patch_jump(j);
        assert_eq!(c.co.codes[j].jump_target(j), Some(3));
    }
}
