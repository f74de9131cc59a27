#[derive(Debug)]
pub(crate) struct CliArgs {
    pub cmd: String,
    pub trace_steps: bool,
    pub no_gc: bool,
    pub recursion_limit: Option<usize>,
    pub positional: Vec<String>,
}

pub(crate) fn usage() -> &'static str {
    "Usage: pk <tokens|dis|run> [--trace-steps] [--no-gc] [--recursion-limit N] <file>"
}

pub(crate) fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut argv = argv.into_iter();
    let cmd = argv.next().ok_or_else(|| usage().to_string())?;

    let mut trace_steps = false;
    let mut no_gc = false;
    let mut recursion_limit = None;
    let mut positional: Vec<String> = Vec::new();

    while let Some(a) = argv.next() {
        match a.as_str() {
            "--trace-steps" => trace_steps = true,
            "--no-gc" => no_gc = true,
            "--recursion-limit" => {
                let n = argv
                    .next()
                    .ok_or_else(|| "--recursion-limit needs a value".to_string())?;
                let n = n
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid recursion limit: {n}"))?;
                recursion_limit = Some(n);
            }
            _ if a.starts_with("--") => return Err(format!("Unknown option: {a}")),
            _ => positional.push(a),
        }
    }

    Ok(CliArgs {
        cmd,
        trace_steps,
        no_gc,
        recursion_limit,
        positional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, String> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn flags_and_positionals() {
        let a = parse(&["run", "--no-gc", "main.py", "--recursion-limit", "50"]).unwrap();
        assert_eq!(a.cmd, "run");
        assert!(a.no_gc);
        assert!(!a.trace_steps);
        assert_eq!(a.recursion_limit, Some(50));
        assert_eq!(a.positional, vec!["main.py".to_string()]);
    }

    #[test]
    fn bad_input() {
        assert!(parse(&[]).unwrap_err().starts_with("Usage: pk"));
        assert_eq!(parse(&["run", "--fast"]).unwrap_err(), "Unknown option: --fast");
        assert!(parse(&["run", "--recursion-limit"]).is_err());
        assert!(parse(&["run", "--recursion-limit", "x"]).is_err());
    }
}
