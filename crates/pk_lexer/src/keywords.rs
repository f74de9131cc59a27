use pk_syntax::TokenKind;

static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "False" => TokenKind::False,
    "None" => TokenKind::None,
    "True" => TokenKind::True,
    "and" => TokenKind::And,
    "as" => TokenKind::As,
    "assert" => TokenKind::Assert,
    "break" => TokenKind::Break,
    "class" => TokenKind::Class,
    "continue" => TokenKind::Continue,
    "def" => TokenKind::Def,
    "del" => TokenKind::Del,
    "elif" => TokenKind::Elif,
    "else" => TokenKind::Else,
    "except" => TokenKind::Except,
    "finally" => TokenKind::Finally,
    "for" => TokenKind::For,
    "from" => TokenKind::From,
    "global" => TokenKind::Global,
    "if" => TokenKind::If,
    "import" => TokenKind::Import,
    "in" => TokenKind::In,
    "is" => TokenKind::Is,
    "lambda" => TokenKind::Lambda,
    "not" => TokenKind::Not,
    "or" => TokenKind::Or,
    "pass" => TokenKind::Pass,
    "raise" => TokenKind::Raise,
    "return" => TokenKind::Return,
    "try" => TokenKind::Try,
    "while" => TokenKind::While,
    "with" => TokenKind::With,
    "yield" => TokenKind::Yield,
};

/// Keyword token for `name`, if it is reserved.
pub fn keyword_kind(name: &str) -> Option<TokenKind> {
    KEYWORDS.get(name).copied()
}
