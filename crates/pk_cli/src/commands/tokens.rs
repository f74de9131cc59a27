use std::fmt::Write;

use pk_driver::Driver;

use crate::args::CliArgs;
use crate::commands::{emit_compile_error, load_input, write_stdout};

pub(crate) fn run(args: &CliArgs, driver: &Driver) -> i32 {
    let source = match load_input(args, driver) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let lexed = match driver.lex_source(&source) {
        Ok(v) => v,
        Err(e) => {
            emit_compile_error(&source, &e);
            return 1;
        }
    };
    let mut out = String::new();
    for t in &lexed.tokens {
        let text = source.text.slice(t.span);
        let _ = writeln!(
            out,
            "{}\t{:?}\t{}..{}\t{}",
            t.line,
            t.kind,
            t.span.start.0,
            t.span.end.0,
            escape_visible(text)
        );
    }
    write_stdout(&out)
}

fn escape_visible(s: &str) -> String {
    let mut out = String::new();
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_visible;

    #[test]
    fn layout_characters_are_escaped() {
        assert_eq!(escape_visible("a\tb\n"), "a\\tb\\n");
    }
}
