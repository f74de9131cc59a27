#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use pk_driver::Driver;
use pk_runtime::{PyException, RuntimeError, Vm, VmConfig};

/// A VM whose `print` output lands in the returned buffer.
pub fn capture_vm(config: VmConfig) -> (Vm, Rc<RefCell<String>>) {
    let out = Rc::new(RefCell::new(String::new()));
    let mut vm = Vm::with_config(Rc::new(Driver::new()), config);
    let sink = out.clone();
    vm.set_stdout(move |s| sink.borrow_mut().push_str(s));
    (vm, out)
}

pub fn run(src: &str) -> String {
    let (mut vm, out) = capture_vm(VmConfig::default());
    if let Err(e) = vm.exec(src, "main.py") {
        panic!("script failed: {e}\noutput so far:\n{}", out.borrow());
    }
    let text = out.borrow().clone();
    text
}

pub fn run_err(src: &str) -> (String, RuntimeError) {
    run_err_with(src, VmConfig::default())
}

pub fn run_err_with(src: &str, config: VmConfig) -> (String, RuntimeError) {
    let (mut vm, out) = capture_vm(config);
    let err = match vm.exec(src, "main.py") {
        Ok(_) => panic!("script succeeded:\n{}", out.borrow()),
        Err(e) => e,
    };
    let text = out.borrow().clone();
    (text, err)
}

pub fn exception(err: &RuntimeError) -> &PyException {
    err.exception()
        .unwrap_or_else(|| panic!("expected a script exception, got {err}"))
}
