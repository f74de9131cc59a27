//! Token definitions.
//!
//! Layout tokens (`Eol`, `Indent`, `Dedent`, `Sof`, `Eof`), literals, f-string pieces, operators
//! and keywords. Compound keywords (`not in`, `is not`, `yield from`) are single tokens.
use std::rc::Rc;

use crate::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Eol,
    Sof,
    Id,
    Num,
    Str,
    FStrBegin,
    FStrCpnt,
    FStrSpec,
    FStrEnd,
    Bytes,
    Imag,
    Indent,
    Dedent,
    IsNot,
    NotIn,
    YieldFrom,

    Plus,
    PlusEq,
    Minus,
    MinusEq,
    Star,
    StarEq,
    Slash,
    SlashEq,
    FloorDiv,
    FloorDivEq,
    Percent,
    PercentEq,
    Amp,
    AmpEq,
    Pipe,
    PipeEq,
    Caret,
    CaretEq,
    LShift,
    LShiftEq,
    RShift,
    RShiftEq,
    DoubleStar,
    Tilde,
    At,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    DotDot,
    Ellipsis,
    Comma,
    Colon,
    Semicolon,
    Arrow,
    Assign,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,

    False,
    None,
    True,
    And,
    As,
    Assert,
    Break,
    Class,
    Continue,
    Def,
    Del,
    Elif,
    Else,
    Except,
    Finally,
    For,
    From,
    Global,
    If,
    Import,
    In,
    Is,
    Lambda,
    Not,
    Or,
    Pass,
    Raise,
    Return,
    Try,
    While,
    With,
    Yield,
}

impl TokenKind {
    /// Source spelling, used in "expected X, got Y" messages.
    pub fn symbol(self) -> &'static str {
        use TokenKind::*;
        match self {
            Eof => "@eof",
            Eol => "@eol",
            Sof => "@sof",
            Id => "@id",
            Num => "@num",
            Str => "@str",
            FStrBegin => "@fstr-begin",
            FStrCpnt => "@fstr-cpnt",
            FStrSpec => "@fstr-spec",
            FStrEnd => "@fstr-end",
            Bytes => "@bytes",
            Imag => "@imag",
            Indent => "@indent",
            Dedent => "@dedent",
            IsNot => "is not",
            NotIn => "not in",
            YieldFrom => "yield from",
            Plus => "+",
            PlusEq => "+=",
            Minus => "-",
            MinusEq => "-=",
            Star => "*",
            StarEq => "*=",
            Slash => "/",
            SlashEq => "/=",
            FloorDiv => "//",
            FloorDivEq => "//=",
            Percent => "%",
            PercentEq => "%=",
            Amp => "&",
            AmpEq => "&=",
            Pipe => "|",
            PipeEq => "|=",
            Caret => "^",
            CaretEq => "^=",
            LShift => "<<",
            LShiftEq => "<<=",
            RShift => ">>",
            RShiftEq => ">>=",
            DoubleStar => "**",
            Tilde => "~",
            At => "@",
            LParen => "(",
            RParen => ")",
            LBracket => "[",
            RBracket => "]",
            LBrace => "{",
            RBrace => "}",
            Dot => ".",
            DotDot => "..",
            Ellipsis => "...",
            Comma => ",",
            Colon => ":",
            Semicolon => ";",
            Arrow => "->",
            Assign => "=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            EqEq => "==",
            Ne => "!=",
            False => "False",
            None => "None",
            True => "True",
            And => "and",
            As => "as",
            Assert => "assert",
            Break => "break",
            Class => "class",
            Continue => "continue",
            Def => "def",
            Del => "del",
            Elif => "elif",
            Else => "else",
            Except => "except",
            Finally => "finally",
            For => "for",
            From => "from",
            Global => "global",
            If => "if",
            Import => "import",
            In => "in",
            Is => "is",
            Lambda => "lambda",
            Not => "not",
            Or => "or",
            Pass => "pass",
            Raise => "raise",
            Return => "return",
            Try => "try",
            While => "while",
            With => "with",
            Yield => "yield",
        }
    }

    /// The plain operator for an augmented-assignment token (`+=` -> `+`).
    pub fn inplace_base(self) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match self {
            PlusEq => Plus,
            MinusEq => Minus,
            StarEq => Star,
            SlashEq => Slash,
            FloorDivEq => FloorDiv,
            PercentEq => Percent,
            AmpEq => Amp,
            PipeEq => Pipe,
            CaretEq => Caret,
            LShiftEq => LShift,
            RShiftEq => RShift,
            _ => return Option::None,
        })
    }
}

/// Literal payload attached to `Num`, `Str`, `Bytes`, `Imag` and f-string pieces.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TokenValue {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Str(Rc<str>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// 1-based source line.
    pub line: u32,
    /// Open-bracket depth at this token.
    pub brackets_level: u32,
    pub value: TokenValue,
}

impl Token {
    pub fn str_value(&self) -> Option<&Rc<str>> {
        match &self.value {
            TokenValue::Str(s) => Some(s),
            _ => None,
        }
    }
}
