mod common;

use std::fs;

use common::{capture_vm, exception};
use pk_runtime::{FsModuleLoader, MemoryLoader, VmConfig};

fn library() -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    loader
        .add_module(
            "mathx",
            "print('loading mathx')\nPI = 3\n_hidden = 0\ndef double(x):\n    return x * 2\n",
        )
        .add_package("pkg", "from .util import helper\nNAME = 'pkg'\n")
        .add_module("pkg.util", "def helper():\n    return 'helped'\n")
        .add_module("pkg.deep", "from . import util\nfrom .util import helper as h\n")
        .add_module("circ_a", "import circ_b\nVALUE = 1\n")
        .add_module("circ_b", "import circ_a\ndef get():\n    return circ_a.VALUE\n")
        .add_module("exported", "__all__ = ['a']\na = 1\nb = 2\n")
        .add_module("broken", "x = 1\nundefined()\n");
    loader
}

fn run_with_library(src: &str) -> Result<String, pk_runtime::RuntimeError> {
    let (mut vm, out) = capture_vm(VmConfig::default());
    vm.set_loader(library());
    vm.exec(src, "main.py")?;
    let text = out.borrow().clone();
    Ok(text)
}

#[test]
fn modules_run_once_and_are_cached() {
    let out = run_with_library(
        "import mathx\nimport mathx\nfrom mathx import double\nprint(mathx.PI, double(4))\n",
    )
    .unwrap();
    assert_eq!(out, "loading mathx\n3 8\n");
}

#[test]
fn dotted_and_relative_imports() {
    let out = run_with_library(
        r#"
import pkg.util
from pkg import helper, NAME
import pkg.deep as deep
print(pkg.util.helper(), helper(), NAME)
print(deep.util.helper(), deep.h())
"#,
    )
    .unwrap();
    assert_eq!(out, "helped helped pkg\nhelped helped\n");
}

#[test]
fn star_imports_honour_all_and_privacy() {
    let out = run_with_library(
        r#"
from mathx import *
from exported import *
print(PI, double(1), a)
print(hasattr(__import__("__main__"), "_hidden"))
"#,
    )
    .unwrap();
    assert_eq!(out, "loading mathx\n3 2 1\nFalse\n");
    let err = run_with_library("from exported import *\nprint(b)\n").unwrap_err();
    assert_eq!(exception(&err).type_name, "NameError");
}

#[test]
fn circular_imports_see_partial_modules() {
    let out = run_with_library("import circ_a\nimport circ_b\nprint(circ_b.get())\n").unwrap();
    assert_eq!(out, "1\n");
}

#[test]
fn import_failures() {
    let err = run_with_library("import nope\n").unwrap_err();
    let exc = exception(&err);
    assert_eq!(exc.type_name, "ImportError");
    assert_eq!(exc.message, "No module named 'nope'");

    let err = run_with_library("from mathx import missing\n").unwrap_err();
    assert_eq!(exception(&err).type_name, "AttributeError");

    let err = run_with_library("from . import x\n").unwrap_err();
    assert_eq!(
        exception(&err).message,
        "attempted relative import with no known parent package"
    );

    // a module whose body fails is not left behind half-initialised
    let (mut vm, _) = capture_vm(VmConfig::default());
    vm.set_loader(library());
    let err = vm.exec("import broken\n", "main.py").unwrap_err();
    let exc = exception(&err);
    assert_eq!(exc.type_name, "NameError");
    assert!(exc.traceback.iter().any(|t| t.filename == "broken.py"));
    assert!(vm.exec("import broken\n", "main.py").is_err());
}

#[test]
fn imports_without_a_loader_fail_cleanly() {
    let (mut vm, _) = capture_vm(VmConfig::default());
    let err = vm.exec("import os\n", "main.py").unwrap_err();
    let exc = exception(&err);
    assert_eq!(exc.type_name, "ImportError");
    assert!(exc.message.contains("cannot import 'os'"), "{}", exc.message);
}

#[test]
fn filesystem_loader_reads_modules_and_packages() {
    let root = std::env::temp_dir().join(format!("pk_runtime_fs_imports_{}", std::process::id()));
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(root.join("shapes")).unwrap();
    fs::write(root.join("greet.py"), "def hi(n):\n    return 'hi ' + n\n").unwrap();
    fs::write(root.join("shapes").join("__init__.py"), "from .square import area\n").unwrap();
    fs::write(
        root.join("shapes").join("square.py"),
        "def area(s):\n    return s * s\n",
    )
    .unwrap();

    let (mut vm, out) = capture_vm(VmConfig::default());
    vm.set_loader(FsModuleLoader::new([root.clone()]));
    vm.exec(
        "import greet\nimport shapes\nprint(greet.hi('there'), shapes.area(3))\n",
        "main.py",
    )
    .unwrap();
    assert_eq!(*out.borrow(), "hi there 9\n");
    let _ = fs::remove_dir_all(&root);
}
