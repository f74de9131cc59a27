//! Runtime error plumbing.
//!
//! Inside the VM an exception is a value parked in `Vm::pending`; every fallible path returns
//! `PyResult`, whose error side only says "something is pending". At the embedding boundary the
//! pending exception is converted into a `RuntimeError`.
use std::fmt;

use pk_syntax::CompileError;

/// Common error message constants used throughout the runtime.
pub mod messages {
    pub const DIVISION_BY_ZERO: &str = "division by zero";
    pub const INDEX_OUT_OF_RANGE: &str = "index out of range";
    pub const RECURSION_LIMIT: &str = "maximum recursion depth exceeded";
    pub const NOT_ITERABLE: &str = "object is not iterable";
    pub const NOT_CALLABLE: &str = "object is not callable";
    pub const NOT_SUBSCRIPTABLE: &str = "object is not subscriptable";
    pub const UNHASHABLE: &str = "unhashable type";
    pub const BAD_EXCEPTION: &str = "exceptions must derive from BaseException";
    pub const INVALID_FORMAT_SPEC: &str = "invalid format specifer";
    pub const PRECISION_NOT_ALLOWED: &str = "precision not allowed in the format specifier";
    pub const EMPTY_SEQUENCE: &str = "empty sequence";
    pub const NO_LOADER: &str = "no module loader installed";
    pub const REPEAT_TOO_LARGE: &str = "repeated sequence is too large";
}

/// Marker for "an exception is pending on the VM". The exception value itself stays on the VM,
/// where the collector treats it as a root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Unwind;

pub type PyResult<T = crate::Value> = Result<T, Unwind>;

/// One traceback line, innermost first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    pub filename: String,
    pub line: u32,
    pub function: String,
}

/// An uncaught script exception as seen by the embedder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PyException {
    pub type_name: String,
    pub message: String,
    pub traceback: Vec<TraceEntry>,
}

impl PyException {
    /// `TypeError: message`, or just the type name when the message is empty.
    pub fn summary(&self) -> String {
        if self.message.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}: {}", self.type_name, self.message)
        }
    }
}

impl fmt::Display for PyException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.traceback.is_empty() {
            writeln!(f, "Traceback (most recent call last):")?;
            for entry in self.traceback.iter().rev() {
                writeln!(
                    f,
                    "  File \"{}\", line {}, in {}",
                    entry.filename, entry.line, entry.function
                )?;
            }
        }
        f.write_str(&self.summary())
    }
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("{0}")]
    Exception(PyException),
}

impl RuntimeError {
    pub fn exception(&self) -> Option<&PyException> {
        match self {
            RuntimeError::Exception(e) => Some(e),
            RuntimeError::Compile(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traceback_prints_outermost_first() {
        let e = PyException {
            type_name: "ValueError".into(),
            message: "bad".into(),
            traceback: vec![
                TraceEntry {
                    filename: "m.py".into(),
                    line: 2,
                    function: "f".into(),
                },
                TraceEntry {
                    filename: "m.py".into(),
                    line: 5,
                    function: "<module>".into(),
                },
            ],
        };
        let text = e.to_string();
        let module_at = text.find("<module>").unwrap();
        let f_at = text.find("in f").unwrap();
        assert!(module_at < f_at);
        assert!(text.ends_with("ValueError: bad"));
    }
}
