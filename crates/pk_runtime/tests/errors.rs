mod common;

use common::{exception, run_err, run_err_with};
use pk_runtime::{RuntimeError, VmConfig};

#[test]
fn traceback_lists_every_frame() {
    let (out, err) = run_err(
        r#"print("before")
def inner():
    raise ValueError("bad value")
def outer():
    inner()
outer()
"#,
    );
    assert_eq!(out, "before\n");
    let exc = exception(&err);
    assert_eq!(exc.type_name, "ValueError");
    assert_eq!(exc.message, "bad value");
    let frames: Vec<(&str, u32)> = exc
        .traceback
        .iter()
        .map(|t| (t.function.as_str(), t.line))
        .collect();
    assert_eq!(frames, vec![("inner", 3), ("outer", 5), ("<module>", 6)]);
    let text = err.to_string();
    assert!(text.starts_with("Traceback (most recent call last):"), "{text}");
    assert!(text.contains("File \"main.py\", line 6, in <module>"), "{text}");
    assert!(text.ends_with("ValueError: bad value"), "{text}");
}

#[test]
fn builtin_errors_carry_their_messages() {
    let cases = [
        ("1 / 0\n", "ZeroDivisionError", "division by zero"),
        ("print(missing)\n", "NameError", "name 'missing' is not defined"),
        ("[1, 2][5]\n", "IndexError", "list index out of range"),
        ("{'a': 1}['b']\n", "KeyError", "'b'"),
        ("1 + 'a'\n", "TypeError", "unsupported operand type(s) for '+': 'int' and 'str'"),
        ("int('x')\n", "ValueError", "invalid literal for int() with base 10: 'x'"),
        ("assert 1 == 2, 'nope'\n", "AssertionError", "nope"),
        ("a, b = [1, 2, 3]\n", "ValueError", "too many values to unpack (expected 2)"),
        ("[0] * 4611686018427387904\n", "MemoryError", "repeated sequence is too large"),
        ("x = [1]\nx *= 2 ** 62\n", "MemoryError", "repeated sequence is too large"),
        ("'ab' * (2 ** 62)\n", "MemoryError", "repeated sequence is too large"),
    ];
    for (src, ty, msg) in cases {
        let (_, err) = run_err(src);
        let exc = exception(&err);
        assert_eq!((exc.type_name.as_str(), exc.message.as_str()), (ty, msg), "{src}");
    }
}

#[test]
fn user_exception_classes_keep_their_name() {
    let (_, err) = run_err(
        r#"
class AppError(Exception):
    pass
raise AppError("boom", 2)
"#,
    );
    let exc = exception(&err);
    assert_eq!(exc.type_name, "AppError");
    assert_eq!(exc.message, "('boom', 2)");
}

#[test]
fn runaway_recursion_is_a_recursion_error() {
    let config = VmConfig {
        max_recursion_depth: 64,
        ..VmConfig::default()
    };
    let (_, err) = run_err_with("def f(n):\n    return f(n + 1)\nf(0)\n", config);
    let exc = exception(&err);
    assert_eq!(exc.type_name, "RecursionError");
    assert!(exc.traceback.len() >= 60, "{}", exc.traceback.len());
}

#[test]
fn recursion_through_constructors_and_magic_methods_is_bounded() {
    let cases = [
        "class N:\n    def __init__(self, n):\n        self.c = N(n - 1) if n > 0 else None\nN(2000)\n",
        "class R:\n    def __repr__(self):\n        return repr(self)\nrepr(R())\n",
        "class A:\n    def __add__(self, o):\n        return self + o\nA() + 1\n",
    ];
    for src in cases {
        let (mut vm, _) = common::capture_vm(VmConfig::default());
        let err = vm.exec(src, "main.py").unwrap_err();
        assert_eq!(exception(&err).type_name, "RecursionError", "{src}");
        assert_eq!(vm.stack_len(), 0);
        vm.exec("class Leaf:\n    def __init__(self):\n        self.v = 1\nLeaf()\n", "main.py")
            .unwrap();
    }
}

#[test]
fn syntax_errors_surface_as_compile_errors() {
    let (_, err) = run_err("def f(:\n    pass\n");
    assert!(matches!(err, RuntimeError::Compile(_)), "{err}");
}

#[test]
fn the_vm_is_reusable_after_an_error() {
    let (mut vm, out) = common::capture_vm(VmConfig::default());
    assert!(vm.exec("x = 1\nundefined_call()\n", "main.py").is_err());
    vm.exec("print(x + 1)\n", "main.py").unwrap();
    assert_eq!(vm.stack_len(), 0);
    assert_eq!(*out.borrow(), "2\n");
}
