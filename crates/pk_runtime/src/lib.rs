//! Bytecode virtual machine, object model and builtins of the pk interpreter.
//!
//! A `Vm` is created around a `pk_ir::Frontend` (the compiler lives in `pk_driver`); it compiles
//! and runs source text, imported modules and `eval`/`exec` strings through that seam.

#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_range_contains)]

mod builtins;
pub mod config;
pub mod core;
pub mod errors;
pub mod format;
mod methods;
mod modules;
pub mod vm;

pub use self::config::VmConfig;
pub use self::core::{Args, NativeFn, ObjectLayout, TypeId, Value, tp};
pub use self::errors::{PyException, PyResult, RuntimeError, TraceEntry, Unwind};
pub use self::modules::{FsModuleLoader, MemoryLoader, ModuleLoader, ModuleSource};
pub use self::vm::{OutputSink, TypeInfo, Vm};
