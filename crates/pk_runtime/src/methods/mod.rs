//! Native methods of the built-in types.
mod dict;
mod exception;
mod list;
mod str;

use crate::vm::Vm;

pub(crate) fn register(vm: &mut Vm) {
    str::register(vm);
    list::register(vm);
    dict::register(vm);
    exception::register(vm);
}
