//! Pratt rule table: prefix handler, infix handler and binding power per token kind.
use pk_syntax::TokenKind;

use super::{CompileResult, Compiler};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Precedence {
    Lowest,
    Lambda,
    Ternary,
    Or,
    And,
    Not,
    /// `< > <= >= != == in is` and their negations.
    Comparison,
    BitOr,
    BitXor,
    BitAnd,
    Shift,
    Term,
    Factor,
    Unary,
    Exponent,
    Primary,
}

impl Precedence {
    pub fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            Lowest => Lambda,
            Lambda => Ternary,
            Ternary => Or,
            Or => And,
            And => Not,
            Not => Comparison,
            Comparison => BitOr,
            BitOr => BitXor,
            BitXor => BitAnd,
            BitAnd => Shift,
            Shift => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Exponent,
            Exponent | Primary => Primary,
        }
    }
}

pub(crate) type PrattFn = fn(&mut Compiler) -> CompileResult;

#[derive(Clone, Copy)]
pub(crate) struct PrattRule {
    pub prefix: Option<PrattFn>,
    pub infix: Option<PrattFn>,
    pub precedence: Precedence,
}

const fn prefix(f: PrattFn) -> PrattRule {
    PrattRule {
        prefix: Some(f),
        infix: None,
        precedence: Precedence::Lowest,
    }
}

const fn infix(f: PrattFn, precedence: Precedence) -> PrattRule {
    PrattRule {
        prefix: None,
        infix: Some(f),
        precedence,
    }
}

const fn both(p: PrattFn, i: PrattFn, precedence: Precedence) -> PrattRule {
    PrattRule {
        prefix: Some(p),
        infix: Some(i),
        precedence,
    }
}

const NONE: PrattRule = PrattRule {
    prefix: None,
    infix: None,
    precedence: Precedence::Lowest,
};

pub(crate) fn rule(kind: TokenKind) -> PrattRule {
    use Precedence as P;
    use TokenKind::*;
    match kind {
        LParen => both(Compiler::expr_group, Compiler::expr_call, P::Primary),
        LBracket => both(Compiler::expr_list, Compiler::expr_subscr, P::Primary),
        LBrace => prefix(Compiler::expr_map),
        Dot => infix(Compiler::expr_attrib, P::Primary),
        Colon => both(Compiler::expr_slice0, Compiler::expr_slice1, P::Primary),

        Plus => infix(Compiler::expr_binary, P::Term),
        Minus => both(Compiler::expr_unary, Compiler::expr_binary, P::Term),
        Star => both(Compiler::expr_unary, Compiler::expr_binary, P::Factor),
        Slash | FloorDiv | Percent | At => infix(Compiler::expr_binary, P::Factor),
        DoubleStar => both(Compiler::expr_unary, Compiler::expr_binary, P::Exponent),
        Tilde => prefix(Compiler::expr_unary),

        Lt | Le | Gt | Ge | EqEq | Ne | In | NotIn | Is | IsNot => {
            infix(Compiler::expr_binary, P::Comparison)
        }
        LShift | RShift => infix(Compiler::expr_binary, P::Shift),
        Amp => infix(Compiler::expr_binary, P::BitAnd),
        Caret => infix(Compiler::expr_binary, P::BitXor),
        Pipe => infix(Compiler::expr_binary, P::BitOr),

        If => infix(Compiler::expr_ternary, P::Ternary),
        Not => prefix(Compiler::expr_not),
        And => infix(Compiler::expr_and, P::And),
        Or => infix(Compiler::expr_or, P::Or),
        Lambda => prefix(Compiler::expr_lambda),

        Id => prefix(Compiler::expr_name),
        Num | Str => prefix(Compiler::expr_literal),
        FStrBegin => prefix(Compiler::expr_fstring),
        Bytes => prefix(Compiler::expr_bytes),
        Imag => prefix(Compiler::expr_imag),
        None | True | False | Ellipsis => prefix(Compiler::expr_literal0),
        _ => NONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_climbs_monotonically() {
        let mut p = Precedence::Lowest;
        while p != Precedence::Primary {
            assert!(p.next() > p);
            p = p.next();
        }
        assert!(rule(TokenKind::DoubleStar).precedence > rule(TokenKind::Star).precedence);
        assert!(rule(TokenKind::Eol).prefix.is_none());
    }
}
