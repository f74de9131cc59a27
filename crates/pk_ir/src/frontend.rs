use std::rc::Rc;

use pk_syntax::CompileError;

use crate::CodeObject;

/// What the top level of a compile unit may contain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompileMode {
    /// Module body.
    #[default]
    Exec,
    /// A single expression whose value is returned.
    Eval,
    /// Interactive input: top-level expression statements print their value.
    Single,
    /// Module re-execution; compiles like `Exec`.
    Reload,
}

/// The runtime's handle on the compiler, used by imports and dynamic evaluation.
pub trait Frontend {
    fn compile(
        &self,
        source: &str,
        filename: &str,
        mode: CompileMode,
    ) -> Result<Rc<CodeObject>, CompileError>;

    /// Compiles code whose names cannot be resolved statically (eval/exec in a running frame).
    fn compile_dynamic(
        &self,
        source: &str,
        filename: &str,
        mode: CompileMode,
    ) -> Result<Rc<CodeObject>, CompileError>;
}
