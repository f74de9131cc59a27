use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::{Bytecode, BytecodeEx, FuncDecl, Opcode};

/// Upper bound on constants per code object; operands are 16-bit.
pub const MAX_CONSTS: usize = 65530;
/// Upper bound on fast locals per function.
pub const MAX_LOCALS: usize = 64;

/// Index of the implicit root block every code object starts with.
pub const NO_BLOCK: u16 = 0;

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Ellipsis,
    Tuple(Rc<[Constant]>),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => f.write_str("None"),
            Constant::Bool(true) => f.write_str("True"),
            Constant::Bool(false) => f.write_str("False"),
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v:?}"),
            Constant::Str(s) => write!(f, "{s:?}"),
            Constant::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Constant::Ellipsis => f.write_str("..."),
            Constant::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodeBlockType {
    NoBlock,
    ForLoop,
    WhileLoop,
    ContextManager,
}

impl CodeBlockType {
    pub fn is_loop(self) -> bool {
        matches!(self, CodeBlockType::ForLoop | CodeBlockType::WhileLoop)
    }
}

/// Lexical block record. `end2` is the end of a loop's `else` clause when there is one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeBlock {
    pub ty: CodeBlockType,
    pub parent: u16,
    pub start: usize,
    pub end: Option<usize>,
    pub end2: Option<usize>,
}

impl CodeBlock {
    /// Where `break` lands: past the `else` clause if the loop has one.
    pub fn break_target(&self) -> Option<usize> {
        self.end2.or(self.end)
    }

    pub fn contains(&self, index: usize) -> bool {
        match (self.ty, self.end) {
            (CodeBlockType::NoBlock, _) => true,
            (_, Some(end)) => self.start <= index && index < end,
            (_, None) => self.start <= index,
        }
    }
}

/// Compiled module body, function body or class body.
#[derive(Clone, Debug)]
pub struct CodeObject {
    pub name: Rc<str>,
    pub filename: Rc<str>,
    pub codes: Vec<Bytecode>,
    pub codes_ex: Vec<BytecodeEx>,
    pub consts: Vec<Constant>,
    /// Fast-local names; the set doubles as the name -> slot map.
    pub varnames: IndexSet<Rc<str>>,
    /// Names referenced by global/attribute/name opcodes.
    pub names: IndexSet<Rc<str>>,
    pub blocks: Vec<CodeBlock>,
    pub func_decls: Vec<Rc<FuncDecl>>,
    pub start_line: u32,
    pub end_line: u32,
}

impl CodeObject {
    pub fn new(filename: Rc<str>, name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            filename,
            codes: Vec::new(),
            codes_ex: Vec::new(),
            consts: Vec::new(),
            varnames: IndexSet::new(),
            names: IndexSet::new(),
            blocks: vec![CodeBlock {
                ty: CodeBlockType::NoBlock,
                parent: NO_BLOCK,
                start: 0,
                end: None,
                end2: None,
            }],
            func_decls: Vec::new(),
            start_line: 1,
            end_line: 1,
        }
    }

    pub fn nlocals(&self) -> usize {
        self.varnames.len()
    }

    pub fn varname(&self, index: u16) -> Option<&Rc<str>> {
        self.varnames.get_index(index as usize)
    }

    pub fn varname_index(&self, name: &str) -> Option<u16> {
        self.varnames.get_index_of(name).map(|i| i as u16)
    }

    pub fn name_at(&self, index: u16) -> Option<&Rc<str>> {
        self.names.get_index(index as usize)
    }

    /// Interns `name` in the name table and returns its operand.
    pub fn add_name(&mut self, name: &str) -> u16 {
        if let Some(i) = self.names.get_index_of(name) {
            return i as u16;
        }
        self.names.insert_full(Rc::from(name)).0 as u16
    }

    /// Appends a constant; string constants are deduplicated within this code object.
    pub fn add_const(&mut self, value: Constant) -> usize {
        if let Constant::Str(s) = &value {
            let existing = self
                .consts
                .iter()
                .position(|c| matches!(c, Constant::Str(t) if t == s));
            if let Some(i) = existing {
                return i;
            }
        }
        self.consts.push(value);
        self.consts.len() - 1
    }

    pub fn const_str(&self, index: u16) -> Option<&Rc<str>> {
        match self.consts.get(index as usize) {
            Some(Constant::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn line_at(&self, ip: usize) -> u32 {
        self.codes_ex.get(ip).map(|e| e.line).unwrap_or(self.start_line)
    }

    pub fn block_of(&self, ip: usize) -> u16 {
        self.codes_ex.get(ip).map(|e| e.block).unwrap_or(NO_BLOCK)
    }

    /// True when any instruction suspends the frame.
    pub fn has_yield(&self) -> bool {
        self.codes.iter().any(|bc| bc.op == Opcode::YieldValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_constants_are_deduplicated() {
        let mut co = CodeObject::new(Rc::from("m.py"), "<module>");
        let a = co.add_const(Constant::Str(Rc::from("x")));
        let b = co.add_const(Constant::Int(1));
        let c = co.add_const(Constant::Str(Rc::from("x")));
        let d = co.add_const(Constant::Int(1));
        assert_eq!(a, c);
        assert_ne!(b, d);
    }

    #[test]
    fn names_intern_once() {
        let mut co = CodeObject::new(Rc::from("m.py"), "<module>");
        assert_eq!(co.add_name("print"), 0);
        assert_eq!(co.add_name("x"), 1);
        assert_eq!(co.add_name("print"), 0);
        assert_eq!(co.name_at(1).map(|s| &**s), Some("x"));
    }

    #[test]
    fn constant_display() {
        let t = Constant::Tuple(Rc::from(vec![Constant::Int(1)]));
        assert_eq!(t.to_string(), "(1,)");
        assert_eq!(Constant::Float(2.0).to_string(), "2.0");
        assert_eq!(Constant::Str(Rc::from("a")).to_string(), "\"a\"");
    }
}
