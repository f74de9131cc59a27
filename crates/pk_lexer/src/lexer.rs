//! Lexer implementation.
//!
//! Single linear pass over normalized text. Tracks an indentation stack and the open-bracket
//! depth; `Eol`/`Indent`/`Dedent` are only produced at bracket depth zero. f-string bodies
//! re-enter the token scanner for each embedded `{expr}`.
//!
//! Related: `LexResult`, `pk_syntax` (tokens/errors).
use std::rc::Rc;

use crate::keywords::keyword_kind;
use pk_syntax::{
    CompileError, CompileErrorKind, Span, Token, TokenKind, TokenValue, is_ident_continue,
    is_ident_start,
};

const TAB_WIDTH: u32 = 4;

/// Lexing result.
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    /// Byte offset of every line start; index 0 is line 1.
    pub line_starts: Vec<u32>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StrKind {
    Normal,
    Raw,
    Bytes,
}

enum IntParse {
    Ok(i64),
    Overflow,
    Failure,
}

/// pk lexer.
pub struct Lexer<'a> {
    filename: Rc<str>,
    input: &'a str,
    bytes: &'a [u8],
    i: usize,
    tokens: Vec<Token>,
    indent_stack: Vec<u32>,
    brackets_level: u32,
    line_starts: Vec<u32>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer over already-normalized text.
    pub fn new(filename: impl Into<Rc<str>>, input: &'a str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in input.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self {
            filename: filename.into(),
            input,
            bytes: input.as_bytes(),
            i: 0,
            tokens: Vec::new(),
            indent_stack: vec![0],
            brackets_level: 0,
            line_starts,
        }
    }

    /// Run the lexer. The first error aborts the compile unit.
    pub fn lex(mut self) -> Result<LexResult, CompileError> {
        let approx = self.bytes.len().saturating_div(4).max(32);
        self.tokens.reserve(approx);
        self.push(TokenKind::Sof, 0, 0);
        // A file may open indented; that is an error like any other unexpected indent.
        self.eat_indentation()?;
        while self.i < self.bytes.len() {
            self.lex_one()?;
        }
        let end = self.bytes.len();
        if !matches!(
            self.tokens.last().map(|t| t.kind),
            Some(TokenKind::Eol | TokenKind::Sof)
        ) {
            self.push(TokenKind::Eol, end, end);
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, end, end);
        }
        self.push(TokenKind::Eof, end, end);
        tracing::trace!(
            target: "pk::lexer",
            file = %self.filename,
            tokens = self.tokens.len(),
            "lexed"
        );
        Ok(LexResult {
            tokens: self.tokens,
            line_starts: self.line_starts,
        })
    }

    fn line_of(&self, byte: usize) -> u32 {
        self.line_starts.partition_point(|&s| s as usize <= byte) as u32
    }

    fn error(&self, kind: CompileErrorKind, at: usize, msg: impl Into<String>) -> CompileError {
        let at = at.min(self.bytes.len());
        CompileError::new(
            kind,
            self.filename.clone(),
            self.line_of(at),
            Span::new(at as u32, (at + 1).min(self.bytes.len().max(at)) as u32),
            msg,
        )
    }

    fn syntax_error(&self, at: usize, msg: impl Into<String>) -> CompileError {
        self.error(CompileErrorKind::Syntax, at, msg)
    }

    fn peek(&self) -> u8 {
        self.bytes.get(self.i).copied().unwrap_or(0)
    }

    fn peek_at(&self, off: usize) -> u8 {
        self.bytes.get(self.i + off).copied().unwrap_or(0)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.i..].chars().next()
    }

    fn match_byte(&mut self, b: u8) -> bool {
        if self.peek() == b {
            self.i += 1;
            true
        } else {
            false
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.push_value(kind, start, end, TokenValue::Empty);
    }

    fn push_value(&mut self, kind: TokenKind, start: usize, end: usize, value: TokenValue) {
        match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                self.brackets_level += 1
            }
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                self.brackets_level = self.brackets_level.saturating_sub(1)
            }
            _ => {}
        }
        // Compound keywords rewrite the previous token in place.
        let merged = match (self.tokens.last().map(|t| t.kind), kind) {
            (Some(TokenKind::Not), TokenKind::In) => Some(TokenKind::NotIn),
            (Some(TokenKind::Is), TokenKind::Not) => Some(TokenKind::IsNot),
            (Some(TokenKind::Yield), TokenKind::From) => Some(TokenKind::YieldFrom),
            _ => None,
        };
        if let Some(compound) = merged {
            if let Some(prev) = self.tokens.last_mut() {
                prev.kind = compound;
                prev.span = Span::new(prev.span.start.0, end as u32);
                return;
            }
        }
        let line = self.line_of(start);
        self.tokens.push(Token {
            kind,
            span: Span::new(start as u32, end as u32),
            line,
            brackets_level: self.brackets_level,
            value,
        });
    }

    fn push2(&mut self, start: usize, next: u8, one: TokenKind, two: TokenKind) {
        if self.match_byte(next) {
            self.push(two, start, self.i);
        } else {
            self.push(one, start, self.i);
        }
    }

    fn eat_spaces(&mut self) -> u32 {
        let mut width = 0;
        loop {
            match self.peek() {
                b' ' => width += 1,
                b'\t' => width += TAB_WIDTH,
                _ => return width,
            }
            self.i += 1;
        }
    }

    fn skip_line_comment(&mut self) {
        while self.i < self.bytes.len() && self.bytes[self.i] != b'\n' {
            self.i += 1;
        }
    }

    /// Measures the next logical line's indentation. Blank and comment-only lines leave the stack
    /// untouched.
    fn eat_indentation(&mut self) -> Result<(), CompileError> {
        if self.brackets_level > 0 {
            return Ok(());
        }
        let at = self.i;
        let spaces = self.eat_spaces();
        if self.peek() == b'#' {
            self.skip_line_comment();
        }
        if matches!(self.peek(), 0 | b'\n') {
            return Ok(());
        }
        let top = self.indent_stack.last().copied().unwrap_or(0);
        if spaces > top {
            if matches!(self.tokens.last().map(|t| t.kind), Some(TokenKind::Sof)) {
                return Err(self.error(CompileErrorKind::Indentation, at, "unexpected indent"));
            }
            self.indent_stack.push(spaces);
            self.push(TokenKind::Indent, self.i, self.i);
        } else if spaces < top {
            while self.indent_stack.last().is_some_and(|&w| spaces < w) {
                self.indent_stack.pop();
                self.push(TokenKind::Dedent, self.i, self.i);
            }
            if self.indent_stack.last().copied() != Some(spaces) {
                return Err(self.error(
                    CompileErrorKind::Indentation,
                    at,
                    "unindent does not match any outer indentation level",
                ));
            }
        }
        Ok(())
    }

    fn lex_one(&mut self) -> Result<(), CompileError> {
        let start = self.i;
        let c = self.peek();
        self.i += 1;
        match c {
            b'\'' | b'"' => self.eat_string(start, c, StrKind::Normal)?,
            b'#' => self.skip_line_comment(),
            b'~' => self.push(TokenKind::Tilde, start, self.i),
            b'{' => self.push(TokenKind::LBrace, start, self.i),
            b'}' => self.push(TokenKind::RBrace, start, self.i),
            b',' => self.push(TokenKind::Comma, start, self.i),
            b':' => self.push(TokenKind::Colon, start, self.i),
            b';' => self.push(TokenKind::Semicolon, start, self.i),
            b'(' => self.push(TokenKind::LParen, start, self.i),
            b')' => self.push(TokenKind::RParen, start, self.i),
            b'[' => self.push(TokenKind::LBracket, start, self.i),
            b']' => self.push(TokenKind::RBracket, start, self.i),
            b'@' => self.push(TokenKind::At, start, self.i),
            b'\\' => {
                // Line continuation.
                if !self.match_byte(b'\n') {
                    return Err(
                        self.syntax_error(start, "expected newline after line continuation character")
                    );
                }
                self.eat_spaces();
            }
            b'%' => self.push2(start, b'=', TokenKind::Percent, TokenKind::PercentEq),
            b'&' => self.push2(start, b'=', TokenKind::Amp, TokenKind::AmpEq),
            b'|' => self.push2(start, b'=', TokenKind::Pipe, TokenKind::PipeEq),
            b'^' => self.push2(start, b'=', TokenKind::Caret, TokenKind::CaretEq),
            b'+' => self.push2(start, b'=', TokenKind::Plus, TokenKind::PlusEq),
            b'=' => self.push2(start, b'=', TokenKind::Assign, TokenKind::EqEq),
            b'!' => {
                if !self.match_byte(b'=') {
                    return Err(self.syntax_error(start, "expected '=' after '!'"));
                }
                self.push(TokenKind::Ne, start, self.i);
            }
            b'.' => {
                if self.peek() == b'.' {
                    self.i += 1;
                    if self.match_byte(b'.') {
                        self.push(TokenKind::Ellipsis, start, self.i);
                    } else {
                        self.push(TokenKind::DotDot, start, self.i);
                    }
                } else if self.peek().is_ascii_digit() {
                    self.eat_number(start)?;
                } else {
                    self.push(TokenKind::Dot, start, self.i);
                }
            }
            b'>' => {
                if self.match_byte(b'=') {
                    self.push(TokenKind::Ge, start, self.i);
                } else if self.match_byte(b'>') {
                    self.push2(start, b'=', TokenKind::RShift, TokenKind::RShiftEq);
                } else {
                    self.push(TokenKind::Gt, start, self.i);
                }
            }
            b'<' => {
                if self.match_byte(b'=') {
                    self.push(TokenKind::Le, start, self.i);
                } else if self.match_byte(b'<') {
                    self.push2(start, b'=', TokenKind::LShift, TokenKind::LShiftEq);
                } else {
                    self.push(TokenKind::Lt, start, self.i);
                }
            }
            b'-' => {
                if self.match_byte(b'=') {
                    self.push(TokenKind::MinusEq, start, self.i);
                } else if self.match_byte(b'>') {
                    self.push(TokenKind::Arrow, start, self.i);
                } else {
                    self.push(TokenKind::Minus, start, self.i);
                }
            }
            b'*' => {
                if self.match_byte(b'*') {
                    self.push(TokenKind::DoubleStar, start, self.i);
                } else {
                    self.push2(start, b'=', TokenKind::Star, TokenKind::StarEq);
                }
            }
            b'/' => {
                if self.match_byte(b'/') {
                    self.push2(start, b'=', TokenKind::FloorDiv, TokenKind::FloorDivEq);
                } else {
                    self.push2(start, b'=', TokenKind::Slash, TokenKind::SlashEq);
                }
            }
            b' ' | b'\t' => {
                self.eat_spaces();
            }
            b'\n' => {
                let prev = self.tokens.last().map(|t| t.kind);
                let at_line_end = !matches!(prev, Some(TokenKind::Eol | TokenKind::Sof));
                if self.brackets_level == 0 && at_line_end {
                    self.push(TokenKind::Eol, start, self.i);
                }
                self.eat_indentation()?;
            }
            _ => {
                let quote = self.peek();
                if matches!(quote, b'\'' | b'"') {
                    let kind = match c {
                        b'f' => Some(None),
                        b'r' => Some(Some(StrKind::Raw)),
                        b'b' => Some(Some(StrKind::Bytes)),
                        _ => None,
                    };
                    if let Some(kind) = kind {
                        self.i += 1;
                        return match kind {
                            None => self.eat_fstring(start, quote),
                            Some(kind) => self.eat_string(start, quote, kind),
                        };
                    }
                }
                if c.is_ascii_digit() {
                    return self.eat_number(start);
                }
                self.i = start;
                return self.eat_name(start);
            }
        }
        Ok(())
    }

    fn eat_name(&mut self, start: usize) -> Result<(), CompileError> {
        match self.peek_char() {
            Some(ch) if is_ident_start(ch) => self.i += ch.len_utf8(),
            Some(ch) => return Err(self.syntax_error(start, format!("invalid char: {ch}"))),
            None => return Err(self.syntax_error(start, "@id contains invalid char")),
        }
        while let Some(ch) = self.peek_char() {
            if !is_ident_continue(ch) {
                break;
            }
            self.i += ch.len_utf8();
        }
        let name = &self.input[start..self.i];
        match keyword_kind(name) {
            Some(kind) => self.push(kind, start, self.i),
            None => {
                let value = TokenValue::Str(Rc::from(name));
                self.push_value(TokenKind::Id, start, self.i, value)
            }
        }
        Ok(())
    }

    fn eat_number(&mut self, start: usize) -> Result<(), CompileError> {
        self.i = start;
        while is_possible_number_byte(self.peek()) {
            self.i += 1;
        }
        let mut scientific = false;
        if matches!(self.bytes[self.i - 1], b'e' | b'E') && matches!(self.peek(), b'+' | b'-') {
            self.i += 1;
            while self.peek().is_ascii_digit() || matches!(self.peek(), b'j' | b'J') {
                self.i += 1;
            }
            scientific = true;
        }
        let text = &self.input[start..self.i];
        if !text.starts_with('.') && !scientific {
            match parse_uint(text) {
                IntParse::Ok(v) => {
                    self.push_value(TokenKind::Num, start, self.i, TokenValue::Int(v));
                    return Ok(());
                }
                IntParse::Overflow => {
                    return Err(self.syntax_error(start, "int literal is too large"));
                }
                IntParse::Failure => {}
            }
        }
        let cleaned: String = text.chars().filter(|&c| c != '_').collect();
        if let Some(v) = parse_float(&cleaned) {
            self.push_value(TokenKind::Num, start, self.i, TokenValue::Float(v));
            return Ok(());
        }
        if let Some(body) = cleaned.strip_suffix(['j', 'J']) {
            if let Some(v) = parse_float(body) {
                self.push_value(TokenKind::Imag, start, self.i, TokenValue::Float(v));
                return Ok(());
            }
        }
        Err(self.syntax_error(start, "invalid number literal"))
    }

    /// Consumes one escape sequence (the backslash is already eaten) into `buf`.
    fn eat_escape(&mut self, buf: &mut String) -> Result<(), CompileError> {
        let at = self.i - 1;
        let c = self.peek();
        self.i += 1;
        let out = match c {
            b'"' => '"',
            b'\'' => '\'',
            b'\\' => '\\',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'b' => '\x08',
            b'f' => '\x0c',
            b'v' => '\x0b',
            b'a' => '\x07',
            b'0' => '\0',
            b'x' => {
                let hex = self.input.get(self.i..self.i + 2).unwrap_or("");
                let value = if hex.len() == 2 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                    u8::from_str_radix(hex, 16).ok()
                } else {
                    None
                };
                match value {
                    Some(v) => {
                        self.i += 2;
                        char::from(v)
                    }
                    None => return Err(self.syntax_error(at, "invalid hex char")),
                }
            }
            _ => return Err(self.syntax_error(at, "invalid escape char")),
        };
        buf.push(out);
        Ok(())
    }

    /// Opening quote already consumed. Returns whether the literal is triple-quoted.
    fn open_quote(&mut self, quote: u8) -> bool {
        if self.peek() == quote && self.peek_at(1) == quote {
            self.i += 2;
            true
        } else {
            false
        }
    }

    fn at_close_quote(&mut self, quote: u8, triple: bool) -> bool {
        if triple {
            if self.peek_at(1) == quote && self.peek_at(2) == quote {
                self.i += 3;
                return true;
            }
            false
        } else {
            self.i += 1;
            true
        }
    }

    fn eat_string_body(
        &mut self,
        start: usize,
        quote: u8,
        kind: StrKind,
    ) -> Result<String, CompileError> {
        let triple = self.open_quote(quote);
        let mut buf = String::new();
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(self.syntax_error(start, "EOL while scanning string literal"));
            };
            if ch as u32 == quote as u32 {
                if self.at_close_quote(quote, triple) {
                    break;
                }
                self.i += 1;
                buf.push(ch);
                continue;
            }
            match ch {
                '\n' if !triple => {
                    return Err(self.syntax_error(start, "EOL while scanning string literal"));
                }
                '\\' if kind != StrKind::Raw => {
                    self.i += 1;
                    self.eat_escape(&mut buf)?;
                }
                _ => {
                    if kind == StrKind::Bytes && !ch.is_ascii() {
                        return Err(self.syntax_error(
                            self.i,
                            "bytes can only contain ASCII literal characters",
                        ));
                    }
                    self.i += ch.len_utf8();
                    buf.push(ch);
                }
            }
        }
        Ok(buf)
    }

    fn eat_string(&mut self, start: usize, quote: u8, kind: StrKind) -> Result<(), CompileError> {
        let body = self.eat_string_body(start, quote, kind)?;
        let tk = if kind == StrKind::Bytes {
            TokenKind::Bytes
        } else {
            TokenKind::Str
        };
        self.push_value(tk, start, self.i, TokenValue::Str(Rc::from(body)));
        Ok(())
    }

    fn push_fstr_cpnt(&mut self, buf: &mut String, start: usize) {
        if !buf.is_empty() {
            let value = TokenValue::Str(Rc::from(std::mem::take(buf).as_str()));
            self.push_value(TokenKind::FStrCpnt, start, self.i, value);
        }
    }

    fn eat_fstring(&mut self, start: usize, quote: u8) -> Result<(), CompileError> {
        self.push(TokenKind::FStrBegin, start, self.i);
        let triple = self.open_quote(quote);
        let mut buf = String::new();
        let mut seg_start = self.i;
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(self.syntax_error(start, "EOL while scanning string literal"));
            };
            if ch as u32 == quote as u32 {
                let at = self.i;
                if self.at_close_quote(quote, triple) {
                    self.i = at;
                    self.push_fstr_cpnt(&mut buf, seg_start);
                    self.at_close_quote(quote, triple);
                    break;
                }
                self.i += 1;
                buf.push(ch);
                continue;
            }
            match ch {
                '\n' if !triple => {
                    return Err(self.syntax_error(start, "EOL while scanning string literal"));
                }
                '{' => {
                    if self.peek_at(1) == b'{' {
                        self.i += 2;
                        buf.push('{');
                        continue;
                    }
                    self.push_fstr_cpnt(&mut buf, seg_start);
                    self.i += 1;
                    self.eat_fstring_expr(quote, triple)?;
                    seg_start = self.i;
                }
                '}' => {
                    if self.peek_at(1) == b'}' {
                        self.i += 2;
                        buf.push('}');
                        continue;
                    }
                    return Err(self.syntax_error(self.i, "f-string: single '}' is not allowed"));
                }
                '\\' => {
                    self.i += 1;
                    self.eat_escape(&mut buf)?;
                }
                _ => {
                    self.i += ch.len_utf8();
                    buf.push(ch);
                }
            }
        }
        self.push(TokenKind::FStrEnd, self.i, self.i);
        Ok(())
    }

    /// Lexes the tokens of one `{...}` replacement field (the `{` is consumed), then closes it
    /// with an `FStrSpec` token whose value is the conversion and format spec, e.g. `!r:>8`.
    fn eat_fstring_expr(&mut self, quote: u8, triple: bool) -> Result<(), CompileError> {
        let open = self.i - 1;
        let base_level = self.brackets_level;
        let first_token = self.tokens.len();
        let mut tail = String::new();
        loop {
            match self.peek() {
                b' ' | b'\t' => {
                    self.i += 1;
                    continue;
                }
                b'\n' if triple => {
                    self.i += 1;
                    continue;
                }
                0 | b'\n' => return Err(self.syntax_error(open, "f-string: expecting '}'")),
                b'#' => {
                    return Err(
                        self.syntax_error(self.i, "f-string expression part cannot include '#'")
                    );
                }
                b'\\' => {
                    return Err(self.syntax_error(
                        self.i,
                        "f-string expression part cannot include a backslash",
                    ));
                }
                c if c == quote => return Err(self.syntax_error(open, "f-string: expecting '}'")),
                _ => {}
            }
            if self.brackets_level == base_level {
                let c = self.peek();
                if c == b'}' {
                    self.i += 1;
                    break;
                }
                if c == b'!'
                    && matches!(self.peek_at(1), b'r' | b's')
                    && matches!(self.peek_at(2), b'}' | b':')
                {
                    tail.push('!');
                    tail.push(self.peek_at(1) as char);
                    self.i += 2;
                    continue;
                }
                if c == b':' {
                    self.i += 1;
                    tail.push(':');
                    loop {
                        match self.peek_char() {
                            Some('}') => break,
                            Some('\n') | None => {
                                return Err(self.syntax_error(open, "f-string: expecting '}'"));
                            }
                            Some(ch) if ch as u32 == quote as u32 => {
                                return Err(self.syntax_error(open, "f-string: expecting '}'"));
                            }
                            Some(ch) => {
                                self.i += ch.len_utf8();
                                tail.push(ch);
                            }
                        }
                    }
                    self.i += 1;
                    break;
                }
            }
            self.lex_one()?;
        }
        if self.tokens.len() == first_token {
            return Err(self.syntax_error(open, "f-string: empty expression not allowed"));
        }
        self.push_value(
            TokenKind::FStrSpec,
            open,
            self.i,
            TokenValue::Str(Rc::from(tail.as_str())),
        );
        Ok(())
    }
}

fn is_possible_number_byte(b: u8) -> bool {
    b.is_ascii_hexdigit() || matches!(b, b'.' | b'x' | b'X' | b'o' | b'O' | b'_' | b'j' | b'J')
}

fn parse_float(text: &str) -> Option<f64> {
    // Rust accepts "inf"/"nan" spellings; a literal must start with a digit or '.'.
    let first = text.bytes().next()?;
    if !(first.is_ascii_digit() || first == b'.') {
        return None;
    }
    text.parse::<f64>().ok()
}

fn parse_uint(text: &str) -> IntParse {
    let lower = text.get(..2).map(|p| p.to_ascii_lowercase());
    let (radix, digits) = match lower.as_deref() {
        Some("0x") => (16, &text[2..]),
        Some("0o") => (8, &text[2..]),
        Some("0b") => (2, &text[2..]),
        _ => (10, text),
    };
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') {
        return IntParse::Failure;
    }
    let mut out: i64 = 0;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let Some(d) = c.to_digit(radix) else {
            return IntParse::Failure;
        };
        out = match out.checked_mul(radix as i64).and_then(|v| v.checked_add(d as i64)) {
            Some(v) => v,
            None => return IntParse::Overflow,
        };
    }
    IntParse::Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_prefixes() {
        assert!(matches!(parse_uint("0x1f"), IntParse::Ok(31)));
        assert!(matches!(parse_uint("0b101"), IntParse::Ok(5)));
        assert!(matches!(parse_uint("1_000"), IntParse::Ok(1000)));
        assert!(matches!(parse_uint("1e5"), IntParse::Failure));
        assert!(matches!(parse_uint("99999999999999999999"), IntParse::Overflow));
    }
}
