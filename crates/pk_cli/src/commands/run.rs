use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use pk_driver::Driver;
use pk_ir::CompileMode;
use pk_runtime::{FsModuleLoader, Vm, VmConfig};

use crate::args::CliArgs;
use crate::commands::{emit_compile_error, load_input};

pub(crate) fn run(args: &CliArgs, driver: &Driver) -> i32 {
    let source = match load_input(args, driver) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let co = match driver.compile_source(&source, CompileMode::Exec) {
        Ok(co) => co,
        Err(e) => {
            emit_compile_error(&source, &e);
            return 1;
        }
    };

    let mut config = VmConfig {
        gc_enabled: !args.no_gc,
        trace_steps: args.trace_steps,
        ..VmConfig::default()
    };
    if let Some(n) = args.recursion_limit {
        config.max_recursion_depth = n;
    }
    let mut vm = Vm::with_config(Rc::new(Driver::with_options(driver.options().clone())), config);
    vm.set_stdout(|s| {
        let _ = std::io::stdout().lock().write_all(s.as_bytes());
    });
    // imports resolve next to the script
    let root = Path::new(&*source.name)
        .parent()
        .map(Path::to_path_buf)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| ".".into());
    vm.set_loader(FsModuleLoader::new([root]));
    let file = vm.new_str(&source.name);
    vm.set_global("__file__", file);

    let result = vm.run_code(Rc::new(co));
    let _ = std::io::stdout().lock().flush();
    match result {
        Ok(_) => {
            tracing::debug!(
                target: "pk::cli",
                collections = vm.gc_collections(),
                live = vm.live_objects(),
                "finished"
            );
            0
        }
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}
