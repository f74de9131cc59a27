//! Renderable diagnostics.
use crate::Span;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: &'static str,
    pub message: String,
    pub code: Option<&'static str>,
    pub span: Option<Span>,
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn error(kind: &'static str, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            span,
            line: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

pub mod codes {
    pub const LEX_ERROR: &str = "E0001";
    pub const SYNTAX_ERROR: &str = "E0002";
    pub const INDENTATION_ERROR: &str = "E0003";
}
