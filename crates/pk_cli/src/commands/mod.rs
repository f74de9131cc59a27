use std::io::Write;

use pk_driver::Driver;
use pk_syntax::{CompileError, SourceFile, render_diagnostic};

use crate::args::CliArgs;

pub(crate) mod dis;
pub(crate) mod run;
pub(crate) mod tokens;

/// The single `<file>` argument, loaded and normalized. Prints the problem and yields the exit
/// code on failure.
pub(crate) fn load_input(args: &CliArgs, driver: &Driver) -> Result<SourceFile, i32> {
    let Some(path) = args.positional.first() else {
        eprintln!("Missing <file>");
        return Err(2);
    };
    driver.load_file(path).map_err(|e| {
        eprintln!("{e}");
        2
    })
}

pub(crate) fn emit_compile_error(source: &SourceFile, err: &CompileError) {
    eprintln!("{}", render_diagnostic(source, &err.to_diagnostic()));
}

/// Writes to stdout; a closed pipe is not an error.
pub(crate) fn write_stdout(text: &str) -> i32 {
    let mut out = std::io::stdout().lock();
    match out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
        Ok(()) => 0,
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => 0,
        Err(e) => {
            eprintln!("stdout error: {e}");
            2
        }
    }
}
