use std::rc::Rc;

use smallvec::SmallVec;

use crate::{CodeObject, Constant};

/// Call-path classification picked by the compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FuncKind {
    /// Has defaults, `*args` or `**kwargs`.
    Normal,
    /// Positional parameters only.
    Simple,
    /// Simple, and the body is only the implicit `return None`.
    Empty,
    Generator,
}

/// A keyword parameter with its literal default.
#[derive(Clone, Debug, PartialEq)]
pub struct KwArg {
    /// Slot in the function's varnames.
    pub index: u16,
    pub key: Rc<str>,
    pub value: Constant,
}

/// Compile-time descriptor of one `def` or `lambda`, shared by every function object created
/// from it.
#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub code: Rc<CodeObject>,
    /// Varname slots of the positional parameters, in order.
    pub args: SmallVec<[u16; 8]>,
    pub kwargs: Vec<KwArg>,
    pub starred_arg: Option<u16>,
    pub starred_kwarg: Option<u16>,
    /// Defined inside another function; gets a closure at runtime.
    pub nested: bool,
    pub kind: FuncKind,
    pub docstring: Option<Rc<str>>,
}

impl FuncDecl {
    pub fn name(&self) -> &Rc<str> {
        &self.code.name
    }

    pub fn is_generator(&self) -> bool {
        self.kind == FuncKind::Generator
    }

    pub fn kwarg_index(&self, key: &str) -> Option<u16> {
        self.kwargs.iter().find(|k| &*k.key == key).map(|k| k.index)
    }

    /// Parameter list as written, for `repr` and error messages.
    pub fn signature(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        for &i in &self.args {
            if let Some(name) = self.code.varname(i) {
                parts.push(name.to_string());
            }
        }
        if let Some(name) = self.starred_arg.and_then(|i| self.code.varname(i)) {
            parts.push(format!("*{name}"));
        }
        for kw in &self.kwargs {
            parts.push(format!("{}={}", kw.key, kw.value));
        }
        if let Some(name) = self.starred_kwarg.and_then(|i| self.code.varname(i)) {
            parts.push(format!("**{name}"));
        }
        format!("{}({})", self.code.name, parts.join(", "))
    }
}
