mod args;
mod commands;

use pk_driver::Driver;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    init_logging();
    let args = match args::parse_args(std::env::args().skip(1)) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    let driver = Driver::new();
    let code = match args.cmd.as_str() {
        "tokens" => commands::tokens::run(&args, &driver),
        "dis" => commands::dis::run(&args, &driver),
        "run" => commands::run::run(&args, &driver),
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!("{}", args::usage());
            2
        }
    };
    std::process::exit(code);
}

/// Log filter comes from `PK_LOG` (e.g. `PK_LOG=pk::gc=debug`); warnings only by default.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("PK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}
