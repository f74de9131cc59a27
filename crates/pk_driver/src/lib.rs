//! Source-to-bytecode driver.
//!
//! `Driver` owns compile options and turns source text into `pk_ir::CodeObject`s with a
//! single-pass Pratt compiler. It implements `pk_ir::Frontend` so the runtime can compile
//! imported modules and `eval`/`exec` text without depending on this crate.
mod compiler;
mod frontend;

pub use frontend::{CompileOptions, Driver, LexedFile};
