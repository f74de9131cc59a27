//! Module loading and the import system.
mod import;
mod loader;

pub use loader::{FsModuleLoader, MemoryLoader, ModuleLoader, ModuleSource};
