use std::fmt;
use std::rc::Rc;

use crate::{Diagnostic, Span, codes};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileErrorKind {
    Lex,
    Syntax,
    Indentation,
}

impl CompileErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            CompileErrorKind::Lex => "LexError",
            CompileErrorKind::Syntax => "SyntaxError",
            CompileErrorKind::Indentation => "IndentationError",
        }
    }

    fn code(self) -> &'static str {
        match self {
            CompileErrorKind::Lex => codes::LEX_ERROR,
            CompileErrorKind::Syntax => codes::SYNTAX_ERROR,
            CompileErrorKind::Indentation => codes::INDENTATION_ERROR,
        }
    }
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fatal error for one compile unit. No partial code object survives it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message} (\"{filename}\", line {line})")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub filename: Rc<str>,
    /// 1-based.
    pub line: u32,
    pub span: Span,
    pub message: String,
}

impl CompileError {
    pub fn new(
        kind: CompileErrorKind,
        filename: Rc<str>,
        line: u32,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            filename,
            line,
            span,
            message: message.into(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.kind.name(), self.message.clone(), Some(self.span))
            .with_code(self.kind.code())
            .with_line(self.line)
    }
}
