//! Shared syntax-level types: spans, source text, tokens, diagnostics and compile errors.
mod diagnostic;
mod error;
mod render;
mod source;
mod span;
mod token;
mod util;

pub use diagnostic::{Diagnostic, codes};
pub use error::{CompileError, CompileErrorKind};
pub use render::render_diagnostic;
pub use source::{SourceFile, SourceText};
pub use span::{ByteIndex, Span};
pub use token::{Token, TokenKind, TokenValue};
pub use util::{is_ident_continue, is_ident_start, is_identifier};
