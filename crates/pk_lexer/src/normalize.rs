use std::rc::Rc;

use pk_syntax::{CompileError, CompileErrorKind, Span};

const BOM: char = '\u{feff}';

/// Strips a leading BOM, drops every `\r` and trims trailing whitespace.
pub fn normalize_source(input: &str) -> String {
    let input = input.strip_prefix(BOM).unwrap_or(input);
    let mut out = String::with_capacity(input.len());
    out.extend(input.chars().filter(|&c| c != '\r'));
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out
}

/// Validates raw bytes as UTF-8 before normalization.
pub fn decode_source(bytes: &[u8], filename: &str) -> Result<String, CompileError> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let at = e.valid_up_to();
            let line = bytes[..at].iter().filter(|&&b| b == b'\n').count() as u32 + 1;
            Err(CompileError::new(
                CompileErrorKind::Lex,
                Rc::from(filename),
                line,
                Span::new(at as u32, at as u32 + 1),
                "invalid utf-8 header",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bom_cr_and_trailing_space() {
        assert_eq!(normalize_source("\u{feff}a = 1\r\nb = 2  \r\n\n"), "a = 1\nb = 2");
    }

    #[test]
    fn bad_utf8_reports_line() {
        let err = decode_source(b"x = 1\ny = '\xff'", "m.py").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, CompileErrorKind::Lex);
    }
}
