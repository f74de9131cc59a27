//! Values, heap objects and the managed heap.
pub mod dict;
pub mod heap;
pub mod object;
pub mod value;

pub use dict::{Dict, DictKey, NameDict, Set};
pub use heap::{ManagedHeap, ObjectId};
pub use object::{
    Args, Function, HeapObject, IterState, NativeFn, NativeFunc, ObjPayload, ObjectLayout,
};
pub use value::{Payload, TypeId, Value, tp};
