//! The VM's value representation.
//!
//! A `Value` is a type id plus a payload. Scalars (ints, floats, bools) live inline; everything
//! else is a handle into the managed heap. The type travels with the value so that dispatch on
//! the common paths never touches the heap.
use std::fmt;

use super::heap::ObjectId;

/// Index into the VM's type table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u16);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Payload {
    /// Singletons such as `None`; the type alone identifies them.
    Unit,
    Int(i64),
    Float(f64),
    Bool(bool),
    Obj(ObjectId),
}

#[derive(Clone, Copy, PartialEq)]
pub struct Value {
    ty: TypeId,
    payload: Payload,
}

/// Built-in type ids. The VM registers its bootstrap types in exactly this order.
pub mod tp {
    use super::TypeId;

    pub const NIL: TypeId = TypeId(0);
    pub const OBJECT: TypeId = TypeId(1);
    pub const TYPE: TypeId = TypeId(2);
    pub const INT: TypeId = TypeId(3);
    pub const FLOAT: TypeId = TypeId(4);
    pub const BOOL: TypeId = TypeId(5);
    pub const STR: TypeId = TypeId(6);
    pub const LIST: TypeId = TypeId(7);
    pub const TUPLE: TypeId = TypeId(8);
    pub const DICT: TypeId = TypeId(9);
    pub const SET: TypeId = TypeId(10);
    pub const RANGE: TypeId = TypeId(11);
    pub const SLICE: TypeId = TypeId(12);
    pub const FUNCTION: TypeId = TypeId(13);
    pub const NATIVE_FUNC: TypeId = TypeId(14);
    pub const BOUND_METHOD: TypeId = TypeId(15);
    pub const MODULE: TypeId = TypeId(16);
    pub const NONE: TypeId = TypeId(17);
    pub const NOT_IMPLEMENTED: TypeId = TypeId(18);
    pub const ELLIPSIS: TypeId = TypeId(19);
    pub const ITERATOR: TypeId = TypeId(20);
    pub const GENERATOR: TypeId = TypeId(21);
    pub const STAR_WRAPPER: TypeId = TypeId(22);
    pub const SUPER: TypeId = TypeId(23);
    pub const BYTES: TypeId = TypeId(24);
    pub const COMPLEX: TypeId = TypeId(25);

    pub const BASE_EXCEPTION: TypeId = TypeId(26);
    pub const EXCEPTION: TypeId = TypeId(27);
    pub const TYPE_ERROR: TypeId = TypeId(28);
    pub const VALUE_ERROR: TypeId = TypeId(29);
    pub const INDEX_ERROR: TypeId = TypeId(30);
    pub const KEY_ERROR: TypeId = TypeId(31);
    pub const NAME_ERROR: TypeId = TypeId(32);
    pub const UNBOUND_LOCAL_ERROR: TypeId = TypeId(33);
    pub const ZERO_DIVISION_ERROR: TypeId = TypeId(34);
    pub const ATTRIBUTE_ERROR: TypeId = TypeId(35);
    pub const RUNTIME_ERROR: TypeId = TypeId(36);
    pub const STOP_ITERATION: TypeId = TypeId(37);
    pub const ASSERTION_ERROR: TypeId = TypeId(38);
    pub const IMPORT_ERROR: TypeId = TypeId(39);
    pub const RECURSION_ERROR: TypeId = TypeId(40);
    pub const NOT_IMPLEMENTED_ERROR: TypeId = TypeId(41);
    pub const SYNTAX_ERROR: TypeId = TypeId(42);
    pub const MEMORY_ERROR: TypeId = TypeId(43);

    pub const PROPERTY: TypeId = TypeId(44);
    pub const STATICMETHOD: TypeId = TypeId(45);
    pub const CLASSMETHOD: TypeId = TypeId(46);

    /// Number of bootstrap types; user classes start here.
    pub const BUILTIN_COUNT: u16 = 47;
}

impl Value {
    /// Reserved sentinel: unbound local slots and the empty "self" slot of a call.
    pub const NIL: Value = Value {
        ty: tp::NIL,
        payload: Payload::Unit,
    };
    pub const NONE: Value = Value {
        ty: tp::NONE,
        payload: Payload::Unit,
    };
    pub const NOT_IMPLEMENTED: Value = Value {
        ty: tp::NOT_IMPLEMENTED,
        payload: Payload::Unit,
    };
    pub const ELLIPSIS: Value = Value {
        ty: tp::ELLIPSIS,
        payload: Payload::Unit,
    };
    pub const TRUE: Value = Value {
        ty: tp::BOOL,
        payload: Payload::Bool(true),
    };
    pub const FALSE: Value = Value {
        ty: tp::BOOL,
        payload: Payload::Bool(false),
    };

    #[inline]
    pub fn int(v: i64) -> Value {
        Value {
            ty: tp::INT,
            payload: Payload::Int(v),
        }
    }

    #[inline]
    pub fn float(v: f64) -> Value {
        Value {
            ty: tp::FLOAT,
            payload: Payload::Float(v),
        }
    }

    #[inline]
    pub fn bool(v: bool) -> Value {
        if v { Value::TRUE } else { Value::FALSE }
    }

    /// A heap reference. `ty` must be the type recorded in the object's header.
    #[inline]
    pub(crate) fn obj(ty: TypeId, id: ObjectId) -> Value {
        Value {
            ty,
            payload: Payload::Obj(id),
        }
    }

    #[inline]
    pub fn ty(self) -> TypeId {
        self.ty
    }

    #[inline]
    pub fn payload(self) -> Payload {
        self.payload
    }

    #[inline]
    pub fn is_nil(self) -> bool {
        self.ty == tp::NIL
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.ty == tp::NONE
    }

    #[inline]
    pub fn is_not_implemented(self) -> bool {
        self.ty == tp::NOT_IMPLEMENTED
    }

    #[inline]
    pub fn as_int(self) -> Option<i64> {
        match self.payload {
            Payload::Int(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(self) -> Option<f64> {
        match self.payload {
            Payload::Float(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(self) -> Option<bool> {
        match self.payload {
            Payload::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Int or bool as an integer.
    #[inline]
    pub fn as_index(self) -> Option<i64> {
        match self.payload {
            Payload::Int(v) => Some(v),
            Payload::Bool(b) => Some(b as i64),
            _ => None,
        }
    }

    /// Int, bool or float widened to a float.
    #[inline]
    pub fn as_number(self) -> Option<f64> {
        match self.payload {
            Payload::Int(v) => Some(v as f64),
            Payload::Float(v) => Some(v),
            Payload::Bool(b) => Some(b as i64 as f64),
            _ => None,
        }
    }

    #[inline]
    pub fn obj_id(self) -> Option<ObjectId> {
        match self.payload {
            Payload::Obj(id) => Some(id),
            _ => None,
        }
    }

    /// `is` semantics: same type and same payload bits.
    pub fn is(self, other: Value) -> bool {
        if self.ty != other.ty {
            return false;
        }
        match (self.payload, other.payload) {
            (Payload::Float(a), Payload::Float(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload {
            Payload::Unit => write!(f, "<type {}>", self.ty.0),
            Payload::Int(v) => write!(f, "{v}"),
            Payload::Float(v) => write!(f, "{v:?}"),
            Payload::Bool(v) => write!(f, "{v}"),
            Payload::Obj(id) => write!(f, "<obj #{} type {}>", id.0, self.ty.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_carry_their_type() {
        assert_eq!(Value::int(3).ty(), tp::INT);
        assert_eq!(Value::float(1.5).ty(), tp::FLOAT);
        assert_eq!(Value::bool(true), Value::TRUE);
        assert!(Value::NIL.is_nil());
        assert!(!Value::NONE.is_nil());
    }

    #[test]
    fn identity_compares_float_bits() {
        assert!(Value::float(f64::NAN).is(Value::float(f64::NAN)));
        assert!(!Value::int(1).is(Value::TRUE));
        assert!(Value::int(7).is(Value::int(7)));
    }
}
