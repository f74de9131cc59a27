use strum::IntoStaticStr;

/// One VM instruction kind. Jump opcodes occupy a contiguous range so that classifying a jump
/// never inspects its operand.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    NoOp,
    PopTop,
    DupTop,
    DupTopTwo,
    RotTwo,
    RotThree,
    PrintExpr,

    LoadConst,
    LoadNone,
    LoadTrue,
    LoadFalse,
    LoadSmallInt,
    LoadEllipsis,
    LoadFunction,
    LoadNull,

    LoadFast,
    LoadName,
    LoadNonlocal,
    LoadGlobal,
    LoadAttr,
    LoadClassGlobal,
    LoadMethod,
    LoadSubscr,

    StoreFast,
    StoreName,
    StoreGlobal,
    StoreAttr,
    StoreSubscr,

    DeleteFast,
    DeleteName,
    DeleteGlobal,
    DeleteAttr,
    DeleteSubscr,

    BuildImag,
    BuildBytes,
    BuildTuple,
    BuildList,
    BuildDict,
    BuildSet,
    BuildSlice,
    BuildString,
    BuildTupleUnpack,
    BuildListUnpack,
    BuildDictUnpack,
    BuildSetUnpack,

    BinaryOp,
    IsOp,
    ContainsOp,

    // Forward jumps. Operand is a signed offset relative to the instruction itself.
    JumpForward,
    PopJumpIfFalse,
    PopJumpIfTrue,
    JumpIfTrueOrPop,
    JumpIfFalseOrPop,
    ShortcutIfFalseOrPop,
    LoopBreak,
    // Backward jump.
    LoopContinue,

    Repr,
    Call,
    CallVargs,
    ReturnValue,
    YieldValue,

    ListAppend,
    DictAdd,
    SetAdd,

    UnaryNegative,
    UnaryNot,
    UnaryStar,
    UnaryInvert,

    GetIter,
    ForIter,

    ImportPath,
    PopImportStar,

    UnpackSequence,
    UnpackEx,

    BeginClass,
    EndClass,
    StoreClassAttr,
    AddClassAnnotation,

    WithEnter,
    WithExit,

    Raise,
    RaiseAssert,

    FstringEval,
    FormatString,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn is_jump(self) -> bool {
        (Opcode::JumpForward as u8..=Opcode::LoopContinue as u8).contains(&(self as u8))
    }

    pub fn is_forward_jump(self) -> bool {
        (Opcode::JumpForward as u8..=Opcode::LoopBreak as u8).contains(&(self as u8))
    }

    pub fn is_backward_jump(self) -> bool {
        self == Opcode::LoopContinue
    }
}

/// `arg` for instructions that take no operand.
pub const NO_ARG: u16 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bytecode {
    pub op: Opcode,
    pub arg: u16,
}

impl Bytecode {
    pub fn new(op: Opcode, arg: u16) -> Self {
        Self { op, arg }
    }

    /// The operand read as a signed relative offset.
    pub fn jump_offset(self) -> i16 {
        self.arg as i16
    }

    /// Absolute jump target for a jump at `index`.
    pub fn jump_target(self, index: usize) -> Option<usize> {
        if !self.op.is_jump() {
            return None;
        }
        let target = index as isize + self.jump_offset() as isize;
        usize::try_from(target).ok()
    }
}

/// Per-instruction metadata kept parallel to the bytecode array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BytecodeEx {
    /// 1-based source line.
    pub line: u32,
    /// Compiler-synthesized instruction with no source of its own.
    pub is_virtual: bool,
    /// Index of the innermost enclosing block.
    pub block: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_classification_is_by_opcode() {
        assert!(Opcode::JumpForward.is_forward_jump());
        assert!(Opcode::ShortcutIfFalseOrPop.is_forward_jump());
        assert!(Opcode::LoopBreak.is_forward_jump());
        assert!(Opcode::LoopContinue.is_backward_jump());
        assert!(!Opcode::LoopContinue.is_forward_jump());
        assert!(!Opcode::ForIter.is_jump());
        assert!(!Opcode::BinaryOp.is_jump());
    }

    #[test]
    fn names_are_screaming_snake() {
        assert_eq!(Opcode::LoadSmallInt.name(), "LOAD_SMALL_INT");
        assert_eq!(Opcode::ShortcutIfFalseOrPop.name(), "SHORTCUT_IF_FALSE_OR_POP");
    }

    #[test]
    fn negative_offsets() {
        let bc = Bytecode::new(Opcode::LoopContinue, (-3i16) as u16);
        assert_eq!(bc.jump_target(10), Some(7));
    }
}
