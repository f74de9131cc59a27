use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

fn pk(args: &[&str]) -> std::process::Output {
    Command::cargo_bin("pk").unwrap().args(args).output().unwrap()
}

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn usage_without_args() {
    let out = pk(&[]);
    assert_eq!(out.status.code(), Some(2));
    assert!(text(&out.stderr).contains("Usage: pk"));
}

#[test]
fn unknown_command_and_missing_file() {
    let out = pk(&["frobnicate", "x.py"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(text(&out.stderr).contains("Unknown command: frobnicate"));

    let out = pk(&["run"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(text(&out.stderr).contains("Missing <file>"));

    let out = pk(&["run", "definitely/not/here.py"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(text(&out.stderr).contains("Failed to read file"));
}

#[test]
fn run_prints_program_output() {
    let dir = TempDir::new().unwrap();
    let main = write(&dir, "main.py", "def f(x):\n    return x * 2\nprint(f(21))\n");
    Command::cargo_bin("pk")
        .unwrap()
        .args(["run", &main])
        .assert()
        .success()
        .stdout("42\n");
}

#[test]
fn run_imports_modules_next_to_the_script() {
    let dir = TempDir::new().unwrap();
    write(&dir, "helpers.py", "def greet(n):\n    return 'hello ' + n\n");
    write(&dir, "pkg/__init__.py", "from .inner import VALUE\n");
    write(&dir, "pkg/inner.py", "VALUE = 7\n");
    let main = write(
        &dir,
        "main.py",
        "import helpers\nfrom pkg import VALUE\nprint(helpers.greet('pk'), VALUE)\n",
    );
    let out = pk(&["run", &main]);
    assert!(out.status.success(), "{}", text(&out.stderr));
    assert_eq!(text(&out.stdout), "hello pk 7\n");
}

#[test]
fn runtime_errors_print_a_traceback_and_exit_1() {
    let dir = TempDir::new().unwrap();
    let main = write(
        &dir,
        "main.py",
        "print('start')\ndef boom():\n    return 1 / 0\nboom()\n",
    );
    let out = pk(&["run", &main]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(text(&out.stdout), "start\n");
    let stderr = text(&out.stderr);
    assert!(stderr.contains("Traceback (most recent call last):"), "{stderr}");
    assert!(stderr.contains("line 3, in boom"), "{stderr}");
    assert!(stderr.contains("ZeroDivisionError: division by zero"), "{stderr}");
}

#[test]
fn recursion_limit_flag_is_honoured() {
    let dir = TempDir::new().unwrap();
    let main = write(&dir, "main.py", "def f(n):\n    return f(n + 1)\nf(0)\n");
    let out = pk(&["run", "--recursion-limit", "40", &main]);
    assert_eq!(out.status.code(), Some(1));
    assert!(text(&out.stderr).contains("RecursionError"));
}

#[test]
fn compile_errors_are_rendered_with_a_caret() {
    let dir = TempDir::new().unwrap();
    let main = write(&dir, "bad.py", "if True:\n    x = 1\n  y = 2\n");
    let out = pk(&["run", &main]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = text(&out.stderr);
    assert!(stderr.contains("IndentationError"), "{stderr}");
    assert!(stderr.contains('^'), "{stderr}");
    assert!(stderr.contains("line 3"), "{stderr}");
}

#[test]
fn tokens_lists_one_token_per_line() {
    let dir = TempDir::new().unwrap();
    let main = write(&dir, "t.py", "x = 1\n");
    let out = pk(&["tokens", &main]);
    assert!(out.status.success());
    let stdout = text(&out.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines.iter().any(|l| l.contains("Id") && l.ends_with("\tx")), "{stdout}");
    assert!(lines.iter().any(|l| l.contains("Assign")), "{stdout}");
    assert!(lines.last().is_some_and(|l| l.contains("Eof")), "{stdout}");
}

#[test]
fn dis_prints_every_function() {
    let dir = TempDir::new().unwrap();
    let main = write(&dir, "d.py", "def f():\n    return 1\nprint(f())\n");
    let out = pk(&["dis", &main]);
    assert!(out.status.success());
    let stdout = text(&out.stdout);
    assert!(stdout.contains("LOAD_FUNCTION"), "{stdout}");
    assert!(stdout.contains("Disassembly of f:"), "{stdout}");
    assert!(stdout.contains("RETURN_VALUE"), "{stdout}");
    assert!(Path::new(&main).exists());
}
