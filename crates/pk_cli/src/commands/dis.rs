use pk_driver::Driver;
use pk_ir::CompileMode;

use crate::args::CliArgs;
use crate::commands::{emit_compile_error, load_input, write_stdout};

pub(crate) fn run(args: &CliArgs, driver: &Driver) -> i32 {
    let source = match load_input(args, driver) {
        Ok(v) => v,
        Err(code) => return code,
    };
    match driver.compile_source(&source, CompileMode::Exec) {
        Ok(co) => write_stdout(&pk_ir::dis(&co)),
        Err(e) => {
            emit_compile_error(&source, &e);
            1
        }
    }
}
