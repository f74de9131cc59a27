//! Object protocols the instructions and builtins are written against.
pub(crate) mod access;
pub(crate) mod binary;
pub(crate) mod class;
pub(crate) mod collection;
pub(crate) mod iter;
pub(crate) mod names;
pub(crate) mod string;
