use strum::{EnumString, FromRepr, IntoStaticStr};

/// Interned magic-method names. The compiler packs them into `BINARY_OP` operands and native
/// types register their slots under them.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromRepr, EnumString, IntoStaticStr)]
pub enum Magic {
    #[strum(serialize = "__add__")]
    Add,
    #[strum(serialize = "__radd__")]
    Radd,
    #[strum(serialize = "__sub__")]
    Sub,
    #[strum(serialize = "__rsub__")]
    Rsub,
    #[strum(serialize = "__mul__")]
    Mul,
    #[strum(serialize = "__rmul__")]
    Rmul,
    #[strum(serialize = "__truediv__")]
    Truediv,
    #[strum(serialize = "__rtruediv__")]
    Rtruediv,
    #[strum(serialize = "__floordiv__")]
    Floordiv,
    #[strum(serialize = "__rfloordiv__")]
    Rfloordiv,
    #[strum(serialize = "__mod__")]
    Mod,
    #[strum(serialize = "__rmod__")]
    Rmod,
    #[strum(serialize = "__pow__")]
    Pow,
    #[strum(serialize = "__rpow__")]
    Rpow,
    #[strum(serialize = "__matmul__")]
    Matmul,
    #[strum(serialize = "__rmatmul__")]
    Rmatmul,
    #[strum(serialize = "__lshift__")]
    Lshift,
    #[strum(serialize = "__rlshift__")]
    Rlshift,
    #[strum(serialize = "__rshift__")]
    Rshift,
    #[strum(serialize = "__rrshift__")]
    Rrshift,
    #[strum(serialize = "__and__")]
    And,
    #[strum(serialize = "__rand__")]
    Rand,
    #[strum(serialize = "__or__")]
    Or,
    #[strum(serialize = "__ror__")]
    Ror,
    #[strum(serialize = "__xor__")]
    Xor,
    #[strum(serialize = "__rxor__")]
    Rxor,

    #[strum(serialize = "__lt__")]
    Lt,
    #[strum(serialize = "__le__")]
    Le,
    #[strum(serialize = "__gt__")]
    Gt,
    #[strum(serialize = "__ge__")]
    Ge,
    #[strum(serialize = "__eq__")]
    Eq,
    #[strum(serialize = "__ne__")]
    Ne,

    #[strum(serialize = "__neg__")]
    Neg,
    #[strum(serialize = "__invert__")]
    Invert,
    #[strum(serialize = "__bool__")]
    Bool,
    #[strum(serialize = "__len__")]
    Len,
    #[strum(serialize = "__iter__")]
    Iter,
    #[strum(serialize = "__next__")]
    Next,
    #[strum(serialize = "__getitem__")]
    Getitem,
    #[strum(serialize = "__setitem__")]
    Setitem,
    #[strum(serialize = "__delitem__")]
    Delitem,
    #[strum(serialize = "__contains__")]
    Contains,
    #[strum(serialize = "__repr__")]
    Repr,
    #[strum(serialize = "__str__")]
    Str,
    #[strum(serialize = "__hash__")]
    Hash,
    #[strum(serialize = "__init__")]
    Init,
    #[strum(serialize = "__new__")]
    New,
    #[strum(serialize = "__call__")]
    Call,
    #[strum(serialize = "__enter__")]
    Enter,
    #[strum(serialize = "__exit__")]
    Exit,
    #[strum(serialize = "__getattr__")]
    Getattr,
}

impl Magic {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn lookup(name: &str) -> Option<Magic> {
        name.parse().ok()
    }

    /// Reflected counterpart tried on the right operand, e.g. `__add__` -> `__radd__`,
    /// `__lt__` -> `__gt__`.
    pub fn reflected(self) -> Option<Magic> {
        use Magic::*;
        Some(match self {
            Add => Radd,
            Sub => Rsub,
            Mul => Rmul,
            Truediv => Rtruediv,
            Floordiv => Rfloordiv,
            Mod => Rmod,
            Pow => Rpow,
            Matmul => Rmatmul,
            Lshift => Rlshift,
            Rshift => Rrshift,
            And => Rand,
            Or => Ror,
            Xor => Rxor,
            Lt => Gt,
            Le => Ge,
            Gt => Lt,
            Ge => Le,
            Eq => Eq,
            Ne => Ne,
            _ => return None,
        })
    }

    /// Operator spelling used in "unsupported operand" messages.
    pub fn operator(self) -> &'static str {
        use Magic::*;
        match self {
            Add | Radd => "+",
            Sub | Rsub => "-",
            Mul | Rmul => "*",
            Truediv | Rtruediv => "/",
            Floordiv | Rfloordiv => "//",
            Mod | Rmod => "%",
            Pow | Rpow => "**",
            Matmul | Rmatmul => "@",
            Lshift | Rlshift => "<<",
            Rshift | Rrshift => ">>",
            And | Rand => "&",
            Or | Ror => "|",
            Xor | Rxor => "^",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Eq => "==",
            Ne => "!=",
            other => other.name(),
        }
    }

    /// `BINARY_OP` operand: forward magic in the low byte, reflected magic in the high byte.
    pub fn pack_binary(self) -> u16 {
        let rop = self.reflected().unwrap_or(self);
        (self as u16) | ((rop as u16) << 8)
    }

    pub fn unpack_binary(arg: u16) -> Option<(Magic, Magic)> {
        Some((
            Magic::from_repr((arg & 0xff) as u8)?,
            Magic::from_repr((arg >> 8) as u8)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_operand_packs_both_names() {
        let arg = Magic::Lt.pack_binary();
        assert_eq!(Magic::unpack_binary(arg), Some((Magic::Lt, Magic::Gt)));
        assert_eq!(Magic::lookup("__getitem__"), Some(Magic::Getitem));
        assert_eq!(Magic::Radd.name(), "__radd__");
    }
}
