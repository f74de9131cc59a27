use crate::{Diagnostic, SourceFile};

/// Renders a diagnostic as a Python-style error block:
///
/// ```text
///   File "main.py", line 3
///     z
///     ^
/// IndentationError: unindent does not match any outer indentation level
/// ```
pub fn render_diagnostic(source: &SourceFile, diag: &Diagnostic) -> String {
    let text = &source.text;
    let (line, col) = match (diag.span, diag.line) {
        (Some(span), line) => {
            let (l, c) = text.line_col(span.start.0);
            (line.unwrap_or(l + 1), Some(c))
        }
        (None, Some(line)) => (line, None),
        (None, None) => {
            return format!("{}: {}", diag.kind, diag.message);
        }
    };

    let mut out = format!("  File \"{}\", line {}\n", source.name, line);
    if let Some(line_text) = text.line_text(line) {
        let trimmed = line_text.trim_start();
        let indent = line_text.chars().count() - trimmed.chars().count();
        out.push_str("    ");
        out.push_str(trimmed);
        out.push('\n');
        if let Some(col) = col {
            out.push_str("    ");
            out.extend(std::iter::repeat_n(
                ' ',
                (col as usize).saturating_sub(indent),
            ));
            out.push_str("^\n");
        }
    }
    match diag.code {
        Some(code) => out.push_str(&format!("{} [{code}]: {}", diag.kind, diag.message)),
        None => out.push_str(&format!("{}: {}", diag.kind, diag.message)),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Span;

    #[test]
    fn caret_points_at_column() {
        let src = SourceFile::new("main.py", "x = 1\nif x:\n  y = $\n".to_string());
        let diag = Diagnostic::error("SyntaxError", "bad token", Some(Span::new(18, 19)));
        let out = render_diagnostic(&src, &diag);
        assert_eq!(
            out,
            "  File \"main.py\", line 3\n    y = $\n        ^\nSyntaxError: bad token"
        );
    }
}
