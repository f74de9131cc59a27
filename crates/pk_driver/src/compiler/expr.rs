//! Transient expression IR.
//!
//! Nodes live in a fixed-size pool for as long as the enclosing construct needs them. Each node
//! can push its value (`emit`), pop a value into itself as an assignment target (`emit_store`),
//! delete itself (`emit_del`), and take part in augmented assignment (`emit_inplace` loads while
//! keeping the target's sub-expressions on the stack, `emit_istore` stores through them).
use std::rc::Rc;

use pk_core::PoolBox;
use pk_ir::{Bytecode, CodeBlockType, Constant, Magic, NO_ARG, Opcode};
use pk_syntax::TokenKind;
use smallvec::SmallVec;

use super::context::{CodeEmitContext, KEEPLINE, NameScope};

pub(crate) type ExprBox = PoolBox<Expr>;

/// Emission failure; the compiler attaches the current location and turns it into a
/// `SyntaxError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EmitError(pub &'static str);

pub(crate) type EmitResult = Result<(), EmitError>;

const CANNOT_ASSIGN: EmitError = EmitError("cannot assign to this expression");
const CANNOT_DELETE: EmitError = EmitError("cannot delete this expression");

#[derive(Debug)]
pub(crate) enum Literal {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
}

#[derive(Debug)]
pub(crate) enum FStrValue {
    /// A plain name or `name.attr`, loaded directly.
    Load(ExprBox),
    /// Any other expression, compiled and evaluated by the VM from its source text.
    Eval(Rc<str>),
}

#[derive(Debug)]
pub(crate) enum FStrPart {
    Literal(Rc<str>),
    Field {
        value: FStrValue,
        repr: bool,
        spec: Option<Rc<str>>,
    },
}

#[derive(Debug)]
pub(crate) enum ExprKind {
    Name {
        name: Rc<str>,
        scope: NameScope,
    },
    Starred {
        child: ExprBox,
        level: u8,
    },
    Not(ExprBox),
    And {
        lhs: ExprBox,
        rhs: ExprBox,
    },
    Or {
        lhs: ExprBox,
        rhs: ExprBox,
    },
    /// `None`, `True`, `False`, `...`
    Literal0(TokenKind),
    Literal(Literal),
    Imag(f64),
    Bytes(Rc<str>),
    Negated(ExprBox),
    Invert(ExprBox),
    Slice {
        start: Option<ExprBox>,
        stop: Option<ExprBox>,
        step: Option<ExprBox>,
    },
    /// `key: value`, or `**mapping` when `key` is absent.
    DictItem {
        key: Option<ExprBox>,
        value: ExprBox,
    },
    Tuple(Vec<ExprBox>),
    List(Vec<ExprBox>),
    Dict(Vec<ExprBox>),
    Set(Vec<ExprBox>),
    Comp {
        /// Container constructor and per-item append opcode.
        op0: Opcode,
        op1: Opcode,
        expr: ExprBox,
        vars: ExprBox,
        iter: ExprBox,
        cond: Option<ExprBox>,
    },
    Lambda {
        decl_index: u16,
    },
    FString(Vec<FStrPart>),
    Subscr {
        lhs: ExprBox,
        rhs: ExprBox,
    },
    Attrib {
        child: ExprBox,
        name: Rc<str>,
    },
    Call {
        callee: ExprBox,
        args: Vec<ExprBox>,
        /// `**mapping` arguments are recorded with an empty key.
        kwargs: Vec<(Rc<str>, ExprBox)>,
    },
    Grouped(ExprBox),
    Binary {
        op: TokenKind,
        lhs: ExprBox,
        rhs: ExprBox,
        inplace: bool,
    },
    Ternary {
        cond: ExprBox,
        true_expr: ExprBox,
        false_expr: ExprBox,
    },
}

#[derive(Debug)]
pub(crate) struct Expr {
    pub line: u32,
    pub kind: ExprKind,
}

fn is_compare_op(op: TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        op,
        Lt | Le | Gt | Ge | EqEq | Ne | In | NotIn | Is | IsNot
    )
}

fn binary_magic(op: TokenKind) -> Option<Magic> {
    use TokenKind::*;
    Some(match op {
        Plus => Magic::Add,
        Minus => Magic::Sub,
        Star => Magic::Mul,
        Slash => Magic::Truediv,
        FloorDiv => Magic::Floordiv,
        Percent => Magic::Mod,
        DoubleStar => Magic::Pow,
        At => Magic::Matmul,
        LShift => Magic::Lshift,
        RShift => Magic::Rshift,
        Amp => Magic::And,
        Pipe => Magic::Or,
        Caret => Magic::Xor,
        Lt => Magic::Lt,
        Le => Magic::Le,
        Gt => Magic::Gt,
        Ge => Magic::Ge,
        EqEq => Magic::Eq,
        Ne => Magic::Ne,
        _ => return Option::None,
    })
}

/// Emits the instruction for a binary operator token. Operands are already on the stack.
pub(crate) fn emit_binary_op(ctx: &mut CodeEmitContext, op: TokenKind, line: u32) -> EmitResult {
    match op {
        TokenKind::In => ctx.emit(Opcode::ContainsOp, 0, line),
        TokenKind::NotIn => ctx.emit(Opcode::ContainsOp, 1, line),
        TokenKind::Is => ctx.emit(Opcode::IsOp, 0, line),
        TokenKind::IsNot => ctx.emit(Opcode::IsOp, 1, line),
        _ => {
            let magic = binary_magic(op).ok_or(EmitError("unknown binary operator"))?;
            ctx.emit(Opcode::BinaryOp, magic.pack_binary(), line)
        }
    };
    Ok(())
}

fn sequence_opcode(items: &[ExprBox], plain: Opcode, unpack: Opcode) -> Opcode {
    if items.iter().any(|e| e.is_starred()) {
        unpack
    } else {
        plain
    }
}

fn count_arg(n: usize) -> Result<u16, EmitError> {
    u16::try_from(n).map_err(|_| EmitError("too many items in display"))
}

impl Expr {
    pub fn new(line: u32, kind: ExprKind) -> Self {
        Self { line, kind }
    }

    pub fn star_level(&self) -> u8 {
        match &self.kind {
            ExprKind::Starred { level, .. } => *level,
            ExprKind::DictItem { value, .. } => value.star_level(),
            _ => 0,
        }
    }

    pub fn is_starred(&self) -> bool {
        self.star_level() > 0
    }

    pub fn is_name(&self) -> bool {
        matches!(self.kind, ExprKind::Name { .. })
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self.kind, ExprKind::Tuple(_))
    }

    pub fn is_compare(&self) -> bool {
        matches!(self.kind, ExprKind::Binary { op, inplace: false, .. } if is_compare_op(op))
    }

    pub fn name(&self) -> Option<&Rc<str>> {
        match &self.kind {
            ExprKind::Name { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn emit(&self, ctx: &mut CodeEmitContext) -> EmitResult {
        let line = self.line;
        match &self.kind {
            ExprKind::Name { name, scope } => {
                match (scope, ctx.co.varname_index(name)) {
                    (NameScope::Local, Some(i)) => {
                        ctx.emit(Opcode::LoadFast, i, line);
                    }
                    _ => {
                        let op = if ctx.is_compiling_class && *scope == NameScope::Global {
                            // Class bodies see their own attributes before globals.
                            Opcode::LoadClassGlobal
                        } else if *scope == NameScope::GlobalUnknown {
                            Opcode::LoadName
                        } else if ctx.level <= 1 {
                            Opcode::LoadGlobal
                        } else {
                            Opcode::LoadNonlocal
                        };
                        let i = ctx.add_name(name);
                        ctx.emit(op, i, line);
                    }
                }
            }
            ExprKind::Starred { child, level } => {
                child.emit(ctx)?;
                ctx.emit(Opcode::UnaryStar, *level as u16, line);
            }
            ExprKind::Not(child) => {
                child.emit(ctx)?;
                ctx.emit(Opcode::UnaryNot, NO_ARG, line);
            }
            ExprKind::And { lhs, rhs } => {
                lhs.emit(ctx)?;
                let patch = ctx.emit(Opcode::JumpIfFalseOrPop, NO_ARG, line);
                rhs.emit(ctx)?;
                ctx.patch_jump(patch);
            }
            ExprKind::Or { lhs, rhs } => {
                lhs.emit(ctx)?;
                let patch = ctx.emit(Opcode::JumpIfTrueOrPop, NO_ARG, line);
                rhs.emit(ctx)?;
                ctx.patch_jump(patch);
            }
            ExprKind::Literal0(kind) => {
                let op = match kind {
                    TokenKind::None => Opcode::LoadNone,
                    TokenKind::True => Opcode::LoadTrue,
                    TokenKind::False => Opcode::LoadFalse,
                    _ => Opcode::LoadEllipsis,
                };
                ctx.emit(op, NO_ARG, line);
            }
            ExprKind::Literal(lit) => match lit {
                Literal::Int(v) => {
                    ctx.emit_int(*v, line);
                }
                Literal::Float(v) => {
                    let i = ctx.add_const(Constant::Float(*v));
                    ctx.emit(Opcode::LoadConst, i, line);
                }
                Literal::Str(s) => {
                    let i = ctx.add_const_str(s);
                    ctx.emit(Opcode::LoadConst, i, line);
                }
            },
            ExprKind::Imag(v) => {
                let i = ctx.add_const(Constant::Float(*v));
                ctx.emit(Opcode::LoadConst, i, line);
                ctx.emit(Opcode::BuildImag, NO_ARG, line);
            }
            ExprKind::Bytes(s) => {
                let i = ctx.add_const_str(s);
                ctx.emit(Opcode::LoadConst, i, line);
                ctx.emit(Opcode::BuildBytes, NO_ARG, line);
            }
            ExprKind::Negated(child) => {
                // Fold negative numeric literals.
                match &child.kind {
                    ExprKind::Literal(Literal::Int(v)) => {
                        ctx.emit_int(v.wrapping_neg(), line);
                    }
                    ExprKind::Literal(Literal::Float(v)) => {
                        let i = ctx.add_const(Constant::Float(-*v));
                        ctx.emit(Opcode::LoadConst, i, line);
                    }
                    _ => {
                        child.emit(ctx)?;
                        ctx.emit(Opcode::UnaryNegative, NO_ARG, line);
                    }
                }
            }
            ExprKind::Invert(child) => {
                child.emit(ctx)?;
                ctx.emit(Opcode::UnaryInvert, NO_ARG, line);
            }
            ExprKind::Slice { start, stop, step } => {
                for part in [start, stop, step] {
                    match part {
                        Some(e) => e.emit(ctx)?,
                        None => {
                            ctx.emit(Opcode::LoadNone, NO_ARG, line);
                        }
                    }
                }
                ctx.emit(Opcode::BuildSlice, NO_ARG, line);
            }
            ExprKind::DictItem { key, value } => match key {
                Some(key) => {
                    key.emit(ctx)?;
                    value.emit(ctx)?;
                    ctx.emit(Opcode::BuildTuple, 2, line);
                }
                None => value.emit(ctx)?,
            },
            ExprKind::Tuple(items) => {
                self.emit_sequence(ctx, items, Opcode::BuildTuple, Opcode::BuildTupleUnpack)?
            }
            ExprKind::List(items) => {
                self.emit_sequence(ctx, items, Opcode::BuildList, Opcode::BuildListUnpack)?
            }
            ExprKind::Dict(items) => {
                self.emit_sequence(ctx, items, Opcode::BuildDict, Opcode::BuildDictUnpack)?
            }
            ExprKind::Set(items) => {
                self.emit_sequence(ctx, items, Opcode::BuildSet, Opcode::BuildSetUnpack)?
            }
            ExprKind::Comp {
                op0,
                op1,
                expr,
                vars,
                iter,
                cond,
            } => {
                ctx.emit(*op0, 0, line);
                iter.emit(ctx)?;
                ctx.emit(Opcode::GetIter, NO_ARG, KEEPLINE);
                let block = ctx.enter_block(CodeBlockType::ForLoop);
                ctx.emit(Opcode::ForIter, block, KEEPLINE);
                vars.emit_store(ctx)?;
                match cond {
                    Some(cond) => {
                        cond.emit(ctx)?;
                        let patch = ctx.emit(Opcode::PopJumpIfFalse, NO_ARG, KEEPLINE);
                        expr.emit(ctx)?;
                        ctx.emit(*op1, NO_ARG, KEEPLINE);
                        ctx.patch_jump(patch);
                    }
                    None => {
                        expr.emit(ctx)?;
                        ctx.emit(*op1, NO_ARG, KEEPLINE);
                    }
                }
                ctx.emit(Opcode::LoopContinue, block, KEEPLINE);
                ctx.exit_block();
            }
            ExprKind::Lambda { decl_index } => {
                ctx.emit(Opcode::LoadFunction, *decl_index, line);
            }
            ExprKind::FString(parts) => {
                let mut count = 0usize;
                for part in parts {
                    match part {
                        FStrPart::Literal(s) => {
                            let i = ctx.add_const_str(s);
                            ctx.emit(Opcode::LoadConst, i, line);
                        }
                        FStrPart::Field { value, repr, spec } => {
                            match value {
                                FStrValue::Load(e) => e.emit(ctx)?,
                                FStrValue::Eval(src) => {
                                    let i = ctx.add_const_str(src);
                                    ctx.emit(Opcode::FstringEval, i, line);
                                }
                            }
                            if *repr {
                                ctx.emit(Opcode::Repr, NO_ARG, line);
                            }
                            if let Some(spec) = spec {
                                let i = ctx.add_const_str(spec);
                                ctx.emit(Opcode::FormatString, i, line);
                            }
                        }
                    }
                    count += 1;
                }
                ctx.emit(Opcode::BuildString, count_arg(count)?, line);
            }
            ExprKind::Subscr { lhs, rhs } => {
                lhs.emit(ctx)?;
                rhs.emit(ctx)?;
                ctx.emit(Opcode::LoadSubscr, NO_ARG, line);
            }
            ExprKind::Attrib { child, name } => {
                child.emit(ctx)?;
                let i = ctx.add_name(name);
                ctx.emit(Opcode::LoadAttr, i, line);
            }
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => self.emit_call(ctx, callee, args, kwargs)?,
            ExprKind::Grouped(child) => child.emit(ctx)?,
            ExprKind::Binary {
                op,
                lhs,
                rhs,
                inplace,
            } => {
                let mut jmps: SmallVec<[usize; 8]> = SmallVec::new();
                if is_compare_op(*op) && lhs.is_compare() {
                    // (a < b) < c
                    lhs.emit_compare(ctx, &mut jmps)?;
                } else if *inplace {
                    lhs.emit_inplace(ctx)?;
                } else {
                    lhs.emit(ctx)?;
                }
                rhs.emit(ctx)?;
                emit_binary_op(ctx, *op, line)?;
                for j in jmps {
                    ctx.patch_jump(j);
                }
            }
            ExprKind::Ternary {
                cond,
                true_expr,
                false_expr,
            } => {
                cond.emit(ctx)?;
                let patch = ctx.emit(Opcode::PopJumpIfFalse, NO_ARG, cond.line);
                true_expr.emit(ctx)?;
                let patch2 = ctx.emit(Opcode::JumpForward, NO_ARG, true_expr.line);
                ctx.patch_jump(patch);
                false_expr.emit(ctx)?;
                ctx.patch_jump(patch2);
            }
        }
        Ok(())
    }

    fn emit_sequence(
        &self,
        ctx: &mut CodeEmitContext,
        items: &[ExprBox],
        plain: Opcode,
        unpack: Opcode,
    ) -> EmitResult {
        for item in items {
            item.emit(ctx)?;
        }
        let op = sequence_opcode(items, plain, unpack);
        ctx.emit(op, count_arg(items.len())?, self.line);
        Ok(())
    }

    /// One link of a comparison chain. Leaves `[rhs, result]` and records the bail-out jump.
    fn emit_compare(
        &self,
        ctx: &mut CodeEmitContext,
        jmps: &mut SmallVec<[usize; 8]>,
    ) -> EmitResult {
        let ExprKind::Binary { op, lhs, rhs, .. } = &self.kind else {
            return self.emit(ctx);
        };
        if lhs.is_compare() {
            lhs.emit_compare(ctx, jmps)?;
        } else {
            lhs.emit(ctx)?; // [a]
        }
        rhs.emit(ctx)?; // [a, b]
        ctx.emit(Opcode::DupTop, NO_ARG, self.line); // [a, b, b]
        ctx.emit(Opcode::RotThree, NO_ARG, self.line); // [b, a, b]
        emit_binary_op(ctx, *op, self.line)?; // [b, res]
        jmps.push(ctx.emit(Opcode::ShortcutIfFalseOrPop, NO_ARG, self.line));
        Ok(())
    }

    fn emit_call(
        &self,
        ctx: &mut CodeEmitContext,
        callee: &Expr,
        args: &[ExprBox],
        kwargs: &[(Rc<str>, ExprBox)],
    ) -> EmitResult {
        let line = self.line;
        let vargs = args.iter().any(|a| a.is_starred());
        let vkwargs = kwargs.iter().any(|(_, v)| v.is_starred());

        match &callee.kind {
            ExprKind::Attrib { child, name } => {
                child.emit(ctx)?;
                let i = ctx.add_name(name);
                ctx.emit(Opcode::LoadMethod, i, callee.line);
            }
            _ => {
                callee.emit(ctx)?;
                ctx.emit(Opcode::LoadNull, NO_ARG, KEEPLINE);
            }
        }

        if vargs || vkwargs {
            for arg in args {
                arg.emit(ctx)?;
            }
            ctx.emit(Opcode::BuildTupleUnpack, count_arg(args.len())?, line);
            if kwargs.is_empty() {
                ctx.emit(Opcode::CallVargs, 0, line);
                return Ok(());
            }
            for (key, value) in kwargs {
                if value.is_starred() {
                    value.emit(ctx)?;
                } else {
                    let i = ctx.add_const_str(key);
                    ctx.emit(Opcode::LoadConst, i, line);
                    value.emit(ctx)?;
                    ctx.emit(Opcode::BuildTuple, 2, line);
                }
            }
            ctx.emit(Opcode::BuildDictUnpack, count_arg(kwargs.len())?, line);
            ctx.emit(Opcode::CallVargs, 1, line);
            return Ok(());
        }

        if args.len() > 255 || kwargs.len() > 255 {
            return Err(EmitError("too many arguments in call"));
        }
        for arg in args {
            arg.emit(ctx)?;
        }
        for (key, value) in kwargs {
            let i = ctx.add_const_str(key);
            ctx.emit(Opcode::LoadConst, i, line);
            value.emit(ctx)?;
        }
        let arg = (args.len() as u16) | ((kwargs.len() as u16) << 8);
        ctx.emit(Opcode::Call, arg, line);
        Ok(())
    }

    pub fn emit_store(&self, ctx: &mut CodeEmitContext) -> EmitResult {
        let line = self.line;
        match &self.kind {
            ExprKind::Name { name, scope } => {
                if ctx.is_compiling_class {
                    let i = ctx.add_name(name);
                    ctx.emit(Opcode::StoreClassAttr, i, line);
                } else {
                    ctx.emit_store_name(*scope, name, line);
                }
                Ok(())
            }
            ExprKind::Starred { child, level: 1 } => child.emit_store(ctx),
            ExprKind::Tuple(items) | ExprKind::List(items) => self.emit_unpack_store(ctx, items),
            ExprKind::Subscr { lhs, rhs } => {
                lhs.emit(ctx)?;
                rhs.emit(ctx)?;
                ctx.emit(Opcode::StoreSubscr, NO_ARG, line);
                Ok(())
            }
            ExprKind::Attrib { child, name } => {
                child.emit(ctx)?;
                let i = ctx.add_name(name);
                ctx.emit(Opcode::StoreAttr, i, line);
                Ok(())
            }
            ExprKind::Grouped(child) => child.emit_store(ctx),
            _ => Err(CANNOT_ASSIGN),
        }
    }

    /// TOS is an iterable; unpacks it into each item, last item first.
    fn emit_unpack_store(&self, ctx: &mut CodeEmitContext, items: &[ExprBox]) -> EmitResult {
        let mut starred = None;
        for (i, item) in items.iter().enumerate() {
            if !item.is_starred() {
                continue;
            }
            if starred.is_some() {
                return Err(EmitError("multiple starred expressions in assignment"));
            }
            starred = Some(i);
        }
        let n = count_arg(items.len())?;
        match starred {
            None => {
                let prev = ctx.last_code();
                let here = ctx.co.codes.len();
                if prev == Some(Bytecode::new(Opcode::BuildTuple, n)) && !ctx.is_jump_target(here)
                {
                    // building a tuple only to unpack it again is a no-op
                    ctx.revert_last_emit();
                } else {
                    ctx.emit(Opcode::UnpackSequence, n, self.line);
                }
            }
            Some(i) => {
                if items.len() == 1 {
                    return Err(EmitError(
                        "starred assignment target must be in a list or tuple",
                    ));
                }
                if i != items.len() - 1 {
                    return Err(EmitError("starred assignment target must be the last one"));
                }
                // a, *b = [1, 2, 3]  ->  [1, [2, 3]]
                ctx.emit(Opcode::UnpackEx, n - 1, self.line);
            }
        }
        for item in items.iter().rev() {
            item.emit_store(ctx)?;
        }
        Ok(())
    }

    pub fn emit_del(&self, ctx: &mut CodeEmitContext) -> EmitResult {
        let line = self.line;
        match &self.kind {
            ExprKind::Name { name, scope } => {
                match scope {
                    NameScope::Local => {
                        let i = ctx.add_varname(name);
                        ctx.emit(Opcode::DeleteFast, i, line);
                    }
                    NameScope::Global => {
                        let i = ctx.add_name(name);
                        ctx.emit(Opcode::DeleteGlobal, i, line);
                    }
                    NameScope::GlobalUnknown => {
                        let i = ctx.add_name(name);
                        ctx.emit(Opcode::DeleteName, i, line);
                    }
                }
                Ok(())
            }
            ExprKind::Tuple(items) => {
                for item in items {
                    item.emit_del(ctx)?;
                }
                Ok(())
            }
            ExprKind::Subscr { lhs, rhs } => {
                lhs.emit(ctx)?;
                rhs.emit(ctx)?;
                ctx.emit(Opcode::DeleteSubscr, NO_ARG, line);
                Ok(())
            }
            ExprKind::Attrib { child, name } => {
                child.emit(ctx)?;
                let i = ctx.add_name(name);
                ctx.emit(Opcode::DeleteAttr, i, line);
                Ok(())
            }
            ExprKind::Grouped(child) => child.emit_del(ctx),
            _ => Err(CANNOT_DELETE),
        }
    }

    /// Loads the current value of an augmented-assignment target, leaving whatever
    /// `emit_istore` needs underneath it.
    pub fn emit_inplace(&self, ctx: &mut CodeEmitContext) -> EmitResult {
        let line = self.line;
        match &self.kind {
            ExprKind::Subscr { lhs, rhs } => {
                lhs.emit(ctx)?;
                rhs.emit(ctx)?;
                ctx.emit(Opcode::DupTopTwo, NO_ARG, line); // [a, b, a, b]
                ctx.emit(Opcode::LoadSubscr, NO_ARG, line); // [a, b, a[b]]
                Ok(())
            }
            ExprKind::Attrib { child, name } => {
                child.emit(ctx)?;
                ctx.emit(Opcode::DupTop, NO_ARG, line); // [a, a]
                let i = ctx.add_name(name);
                ctx.emit(Opcode::LoadAttr, i, line); // [a, a.x]
                Ok(())
            }
            _ => self.emit(ctx),
        }
    }

    pub fn emit_istore(&self, ctx: &mut CodeEmitContext) -> EmitResult {
        let line = self.line;
        match &self.kind {
            ExprKind::Subscr { .. } => {
                ctx.emit(Opcode::RotThree, NO_ARG, line); // [val, a, b]
                ctx.emit(Opcode::StoreSubscr, NO_ARG, line);
                Ok(())
            }
            ExprKind::Attrib { name, .. } => {
                ctx.emit(Opcode::RotTwo, NO_ARG, line); // [val, a]
                let i = ctx.add_name(name);
                ctx.emit(Opcode::StoreAttr, i, line);
                Ok(())
            }
            _ => self.emit_store(ctx),
        }
    }
}
