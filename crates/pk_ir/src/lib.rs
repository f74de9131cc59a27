//! Compiled-code model shared by the compiler and the VM.
//!
//! Opcodes, code objects, function declarations, the magic-name set, disassembly and the
//! `Frontend` seam through which the runtime reaches the compiler.
mod code;
mod dis;
mod frontend;
mod func;
mod magic;
mod opcode;

pub use code::*;
pub use dis::dis;
pub use frontend::*;
pub use func::*;
pub use magic::Magic;
pub use opcode::*;
