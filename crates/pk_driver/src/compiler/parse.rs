//! Expression parsing: the Pratt loop and every prefix/infix handler named in the rule table.
use std::rc::Rc;

use pk_ir::{Constant, KwArg, NO_ARG, Opcode};
use pk_syntax::{TokenKind, TokenValue};

use super::context::KEEPLINE;
use super::expr::{ExprBox, ExprKind, FStrPart, FStrValue, Literal};
use super::rules::{Precedence, rule};
use super::{CompileResult, Compiler};

/// Splits an f-string field tail such as `!r:>8` into its `repr` flag and format spec.
fn split_conversion(tail: &str) -> (bool, Option<Rc<str>>) {
    let (conv, spec) = match tail.find(':') {
        Some(at) => (&tail[..at], Some(&tail[at + 1..])),
        None => (tail, None),
    };
    let spec = spec.filter(|s| !s.is_empty()).map(Rc::from);
    (conv == "!r", spec)
}

impl Compiler {
    pub(super) fn is_expression(&self, allow_slice: bool) -> bool {
        let kind = self.curr().kind;
        rule(kind).prefix.is_some() && (allow_slice || kind != TokenKind::Colon)
    }

    pub(super) fn parse_expression(
        &mut self,
        precedence: Precedence,
        allow_slice: bool,
    ) -> CompileResult {
        let kind = self.curr().kind;
        let prefix = rule(kind).prefix;
        let Some(prefix) = prefix.filter(|_| allow_slice || kind != TokenKind::Colon) else {
            return Err(self.syntax_error(format!(
                "expected an expression, got {}",
                kind.symbol()
            )));
        };
        self.advance();
        prefix(self)?;
        loop {
            let kind = self.curr().kind;
            let r = rule(kind);
            if r.precedence < precedence || (kind == TokenKind::Colon && !allow_slice) {
                break;
            }
            let Some(infix) = r.infix else {
                break;
            };
            self.advance();
            infix(self)?;
        }
        Ok(())
    }

    /// One expression without a top-level tuple.
    pub(super) fn expr(&mut self) -> CompileResult {
        self.parse_expression(Precedence::Lowest.next(), false)
    }

    /// An expression or a bare comma-separated tuple.
    pub(super) fn expr_tuple(&mut self, allow_slice: bool) -> CompileResult {
        let line = self.curr().line;
        self.parse_expression(Precedence::Lowest.next(), allow_slice)?;
        if !self.eat(TokenKind::Comma) {
            return Ok(());
        }
        let mut items = vec![self.pop_expr()?];
        loop {
            if self.curr().brackets_level > 0 {
                self.match_newlines();
            }
            if !self.is_expression(allow_slice) {
                break;
            }
            self.parse_expression(Precedence::Lowest.next(), allow_slice)?;
            items.push(self.pop_expr()?);
            if self.curr().brackets_level > 0 {
                self.match_newlines();
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let e = self.make_expr(line, ExprKind::Tuple(items));
        self.push_expr(e);
        Ok(())
    }

    /// Loop targets: one or more comma-separated names.
    pub(super) fn expr_vars(&mut self) -> CompileResult {
        let line = self.curr().line;
        let mut items = Vec::new();
        loop {
            self.consume(TokenKind::Id)?;
            items.push(self.make_name(self.prev_str(), self.prev().line));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let e = if items.len() == 1 {
            items.remove(0)
        } else {
            self.make_expr(line, ExprKind::Tuple(items))
        };
        self.push_expr(e);
        Ok(())
    }

    fn consume_comp(&mut self, op0: Opcode, op1: Opcode, expr: ExprBox) -> CompileResult {
        let line = expr.line;
        self.expr_vars()?;
        let vars = self.pop_expr()?;
        self.consume(TokenKind::In)?;
        self.parse_expression(Precedence::Ternary.next(), false)?;
        let iter = self.pop_expr()?;
        self.match_newlines();
        let cond = if self.eat(TokenKind::If) {
            self.parse_expression(Precedence::Ternary.next(), false)?;
            Some(self.pop_expr()?)
        } else {
            None
        };
        let e = self.make_expr(
            line,
            ExprKind::Comp {
                op0,
                op1,
                expr,
                vars,
                iter,
                cond,
            },
        );
        self.push_expr(e);
        self.match_newlines();
        Ok(())
    }

    pub(super) fn expr_literal(&mut self) -> CompileResult {
        let tok = self.prev();
        let line = tok.line;
        let lit = match &tok.value {
            TokenValue::Int(v) => Literal::Int(*v),
            TokenValue::Float(v) => Literal::Float(*v),
            TokenValue::Str(s) => Literal::Str(s.clone()),
            TokenValue::Empty => return Err(self.syntax_error("malformed literal")),
        };
        let e = self.make_expr(line, ExprKind::Literal(lit));
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_imag(&mut self) -> CompileResult {
        let tok = self.prev();
        let line = tok.line;
        let value = match tok.value {
            TokenValue::Float(v) => v,
            TokenValue::Int(v) => v as f64,
            _ => return Err(self.syntax_error("malformed imaginary literal")),
        };
        let e = self.make_expr(line, ExprKind::Imag(value));
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_bytes(&mut self) -> CompileResult {
        let line = self.prev().line;
        let e = self.make_expr(line, ExprKind::Bytes(self.prev_str()));
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_literal0(&mut self) -> CompileResult {
        let tok = self.prev();
        let e = self.make_expr(tok.line, ExprKind::Literal0(tok.kind));
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_name(&mut self) -> CompileResult {
        let e = self.make_name(self.prev_str(), self.prev().line);
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_fstring(&mut self) -> CompileResult {
        let line = self.prev().line;
        let mut parts = Vec::new();
        loop {
            let tok = self.curr();
            match tok.kind {
                TokenKind::FStrEnd => {
                    self.advance();
                    break;
                }
                TokenKind::FStrCpnt => {
                    let text = tok.str_value().cloned().unwrap_or_else(|| Rc::from(""));
                    self.advance();
                    parts.push(FStrPart::Literal(text));
                }
                TokenKind::Eof => return Err(self.syntax_error("unterminated f-string")),
                _ => {
                    let begin = self.i;
                    let end = self.find_fstr_spec(begin)?;
                    let value = self.fstr_field_value(begin, end);
                    let tail = self.tk(end).str_value().cloned().unwrap_or_else(|| Rc::from(""));
                    let (repr, spec) = split_conversion(&tail);
                    parts.push(FStrPart::Field { value, repr, spec });
                    self.i = end + 1;
                }
            }
        }
        let e = self.make_expr(line, ExprKind::FString(parts));
        self.push_expr(e);
        Ok(())
    }

    /// Index of the `FStrSpec` closing the replacement field that starts at `begin`, skipping
    /// over nested f-strings.
    fn find_fstr_spec(&self, begin: usize) -> CompileResult<usize> {
        let mut depth = 0usize;
        let mut j = begin;
        while j < self.tokens.len() {
            match self.tokens[j].kind {
                TokenKind::FStrBegin => depth += 1,
                TokenKind::FStrEnd => depth = depth.saturating_sub(1),
                TokenKind::FStrSpec if depth == 0 => return Ok(j),
                TokenKind::Eof => break,
                _ => {}
            }
            j += 1;
        }
        Err(self.syntax_error("f-string: expecting '}'"))
    }

    fn fstr_field_value(&self, begin: usize, end: usize) -> FStrValue {
        let toks = &self.tokens[begin..end];
        let kinds: Vec<TokenKind> = toks.iter().map(|t| t.kind).collect();
        match kinds.as_slice() {
            [TokenKind::Id] => {
                if let Some(name) = toks[0].str_value() {
                    return FStrValue::Load(self.make_name(name.clone(), toks[0].line));
                }
            }
            [TokenKind::Id, TokenKind::Dot, TokenKind::Id] => {
                if let (Some(obj), Some(attr)) = (toks[0].str_value(), toks[2].str_value()) {
                    let child = self.make_name(obj.clone(), toks[0].line);
                    let e = self.make_expr(
                        toks[0].line,
                        ExprKind::Attrib {
                            child,
                            name: attr.clone(),
                        },
                    );
                    return FStrValue::Load(e);
                }
            }
            _ => {}
        }
        let start = toks.first().map_or(0, |t| t.span.start.0 as usize);
        let stop = toks.last().map_or(start, |t| t.span.end.0 as usize);
        let src = self.source.get(start..stop).unwrap_or_default();
        FStrValue::Eval(Rc::from(src))
    }

    pub(super) fn expr_group(&mut self) -> CompileResult {
        let line = self.prev().line;
        self.match_newlines();
        if self.eat(TokenKind::RParen) {
            let e = self.make_expr(line, ExprKind::Tuple(Vec::new()));
            self.push_expr(e);
            return Ok(());
        }
        self.expr_tuple(false)?;
        self.match_newlines();
        self.consume(TokenKind::RParen)?;
        if self.ctx.s_top().is_some_and(|e| e.is_tuple()) {
            return Ok(());
        }
        let child = self.pop_expr()?;
        let e = self.make_expr(line, ExprKind::Grouped(child));
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_list(&mut self) -> CompileResult {
        let line = self.prev().line;
        let mut items = Vec::new();
        loop {
            self.match_newlines();
            if self.curr().kind == TokenKind::RBracket {
                break;
            }
            self.expr()?;
            items.push(self.pop_expr()?);
            self.match_newlines();
            if items.len() == 1 && self.eat(TokenKind::For) {
                let first = items.remove(0);
                self.consume_comp(Opcode::BuildList, Opcode::ListAppend, first)?;
                self.consume(TokenKind::RBracket)?;
                return Ok(());
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.match_newlines();
        self.consume(TokenKind::RBracket)?;
        let e = self.make_expr(line, ExprKind::List(items));
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_map(&mut self) -> CompileResult {
        let line = self.prev().line;
        let mut parsing_dict = false;
        let mut items = Vec::new();
        loop {
            self.match_newlines();
            if self.curr().kind == TokenKind::RBrace {
                break;
            }
            self.expr()?;
            let star_level = self.ctx.s_top().map_or(0, |e| e.star_level());
            if star_level == 2 || self.curr().kind == TokenKind::Colon {
                parsing_dict = true;
            }
            if parsing_dict {
                let item_line = self.curr().line;
                let item = if star_level == 2 {
                    let value = self.pop_expr()?;
                    ExprKind::DictItem { key: None, value }
                } else {
                    self.consume(TokenKind::Colon)?;
                    self.expr()?;
                    let value = self.pop_expr()?;
                    let key = self.pop_expr()?;
                    ExprKind::DictItem {
                        key: Some(key),
                        value,
                    }
                };
                items.push(self.make_expr(item_line, item));
            } else {
                items.push(self.pop_expr()?);
            }
            self.match_newlines();
            if items.len() == 1 && self.eat(TokenKind::For) {
                let first = items.remove(0);
                if parsing_dict {
                    self.consume_comp(Opcode::BuildDict, Opcode::DictAdd, first)?;
                } else {
                    self.consume_comp(Opcode::BuildSet, Opcode::SetAdd, first)?;
                }
                self.consume(TokenKind::RBrace)?;
                return Ok(());
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.match_newlines();
        self.consume(TokenKind::RBrace)?;
        let kind = if items.is_empty() || parsing_dict {
            ExprKind::Dict(items)
        } else {
            ExprKind::Set(items)
        };
        let e = self.make_expr(line, kind);
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_call(&mut self) -> CompileResult {
        let line = self.prev().line;
        let callee = self.pop_expr()?;
        let mut args = Vec::new();
        let mut kwargs: Vec<(Rc<str>, ExprBox)> = Vec::new();
        loop {
            self.match_newlines();
            if self.curr().kind == TokenKind::RParen {
                break;
            }
            if self.curr().kind == TokenKind::Id && self.next().kind == TokenKind::Assign {
                self.consume(TokenKind::Id)?;
                let key = self.prev_str();
                self.consume(TokenKind::Assign)?;
                self.expr()?;
                kwargs.push((key, self.pop_expr()?));
            } else {
                self.expr()?;
                let star_level = self.ctx.s_top().map_or(0, |e| e.star_level());
                if star_level == 2 {
                    kwargs.push((Rc::from(""), self.pop_expr()?));
                } else {
                    if !kwargs.is_empty() {
                        return Err(
                            self.syntax_error("positional argument follows keyword argument")
                        );
                    }
                    args.push(self.pop_expr()?);
                }
            }
            self.match_newlines();
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RParen)?;
        let e = self.make_expr(
            line,
            ExprKind::Call {
                callee,
                args,
                kwargs,
            },
        );
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_subscr(&mut self) -> CompileResult {
        let line = self.prev().line;
        let lhs = self.pop_expr()?;
        self.expr_tuple(true)?;
        let rhs = self.pop_expr()?;
        self.consume(TokenKind::RBracket)?;
        let e = self.make_expr(line, ExprKind::Subscr { lhs, rhs });
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_attrib(&mut self) -> CompileResult {
        self.consume(TokenKind::Id)?;
        let line = self.prev().line;
        let name = self.prev_str();
        let child = self.pop_expr()?;
        let e = self.make_expr(line, ExprKind::Attrib { child, name });
        self.push_expr(e);
        Ok(())
    }

    /// Parses `[stop][:[step]]` after the first colon of a slice.
    fn slice_tail(&mut self) -> CompileResult<(Option<ExprBox>, Option<ExprBox>)> {
        let mut stop = None;
        let mut step = None;
        if self.is_expression(false) {
            self.parse_expression(Precedence::Lowest.next(), false)?;
            stop = Some(self.pop_expr()?);
            if self.eat(TokenKind::Colon) && self.is_expression(false) {
                self.parse_expression(Precedence::Lowest.next(), false)?;
                step = Some(self.pop_expr()?);
            }
        } else if self.eat(TokenKind::Colon) && self.is_expression(false) {
            self.parse_expression(Precedence::Lowest.next(), false)?;
            step = Some(self.pop_expr()?);
        }
        Ok((stop, step))
    }

    /// `:stop:step` with no start.
    pub(super) fn expr_slice0(&mut self) -> CompileResult {
        let line = self.prev().line;
        let (stop, step) = self.slice_tail()?;
        let e = self.make_expr(
            line,
            ExprKind::Slice {
                start: None,
                stop,
                step,
            },
        );
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_slice1(&mut self) -> CompileResult {
        let line = self.prev().line;
        let start = Some(self.pop_expr()?);
        let (stop, step) = self.slice_tail()?;
        let e = self.make_expr(line, ExprKind::Slice { start, stop, step });
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_binary(&mut self) -> CompileResult {
        let tok = self.prev();
        let (op, line) = (tok.kind, tok.line);
        let precedence = rule(op).precedence;
        // `**` is right-associative
        let rhs_precedence = if op == TokenKind::DoubleStar {
            precedence
        } else {
            precedence.next()
        };
        self.parse_expression(rhs_precedence, false)?;
        let rhs = self.pop_expr()?;
        let lhs = self.pop_expr()?;
        let e = self.make_expr(
            line,
            ExprKind::Binary {
                op,
                lhs,
                rhs,
                inplace: false,
            },
        );
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_unary(&mut self) -> CompileResult {
        let tok = self.prev();
        let (op, line) = (tok.kind, tok.line);
        self.parse_expression(Precedence::Unary.next(), false)?;
        let child = self.pop_expr()?;
        let kind = match op {
            TokenKind::Minus => ExprKind::Negated(child),
            TokenKind::Tilde => ExprKind::Invert(child),
            TokenKind::Star => ExprKind::Starred { child, level: 1 },
            TokenKind::DoubleStar => ExprKind::Starred { child, level: 2 },
            _ => return Err(self.syntax_error("invalid unary operator")),
        };
        let e = self.make_expr(line, kind);
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_not(&mut self) -> CompileResult {
        let line = self.prev().line;
        self.parse_expression(Precedence::Not.next(), false)?;
        let child = self.pop_expr()?;
        let e = self.make_expr(line, ExprKind::Not(child));
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_and(&mut self) -> CompileResult {
        let line = self.prev().line;
        self.parse_expression(Precedence::And.next(), false)?;
        let rhs = self.pop_expr()?;
        let lhs = self.pop_expr()?;
        let e = self.make_expr(line, ExprKind::And { lhs, rhs });
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_or(&mut self) -> CompileResult {
        let line = self.prev().line;
        self.parse_expression(Precedence::Or.next(), false)?;
        let rhs = self.pop_expr()?;
        let lhs = self.pop_expr()?;
        let e = self.make_expr(line, ExprKind::Or { lhs, rhs });
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_ternary(&mut self) -> CompileResult {
        let line = self.prev().line;
        let true_expr = self.pop_expr()?;
        self.parse_expression(Precedence::Ternary.next(), false)?;
        let cond = self.pop_expr()?;
        self.consume(TokenKind::Else)?;
        self.parse_expression(Precedence::Ternary, false)?;
        let false_expr = self.pop_expr()?;
        let e = self.make_expr(
            line,
            ExprKind::Ternary {
                cond,
                true_expr,
                false_expr,
            },
        );
        self.push_expr(e);
        Ok(())
    }

    pub(super) fn expr_lambda(&mut self) -> CompileResult {
        let line = self.prev().line;
        self.push_f_context("<lambda>");
        if !self.eat(TokenKind::Colon) {
            self.compile_f_args(false)?;
            self.consume(TokenKind::Colon)?;
        }
        self.parse_expression(Precedence::Lambda.next(), false)?;
        self.s_emit_top()?;
        self.ctx.emit(Opcode::ReturnValue, NO_ARG, KEEPLINE);
        let decl_index = self.pop_f_context()?;
        let e = self.make_expr(line, ExprKind::Lambda { decl_index });
        self.push_expr(e);
        Ok(())
    }

    /// A default-value literal: number (optionally negated), string, bool, None, `...` or a
    /// parenthesized tuple of those.
    pub(super) fn read_literal(&mut self) -> CompileResult<Option<Constant>> {
        self.advance();
        let (kind, payload) = (self.prev().kind, self.prev().value.clone());
        let value = match (kind, &payload) {
            (TokenKind::Minus, _) => {
                self.consume(TokenKind::Num)?;
                match self.prev().value {
                    TokenValue::Int(v) => Constant::Int(v.wrapping_neg()),
                    TokenValue::Float(v) => Constant::Float(-v),
                    _ => return Ok(None),
                }
            }
            (TokenKind::Num, TokenValue::Int(v)) => Constant::Int(*v),
            (TokenKind::Num, TokenValue::Float(v)) => Constant::Float(*v),
            (TokenKind::Str, TokenValue::Str(s)) => Constant::Str(s.clone()),
            (TokenKind::True, _) => Constant::Bool(true),
            (TokenKind::False, _) => Constant::Bool(false),
            (TokenKind::None, _) => Constant::None,
            (TokenKind::Ellipsis, _) => Constant::Ellipsis,
            (TokenKind::LParen, _) => {
                let mut items = Vec::new();
                while self.curr().kind != TokenKind::RParen {
                    match self.read_literal()? {
                        Some(c) => items.push(c),
                        None => return Ok(None),
                    }
                    if self.curr().kind == TokenKind::RParen {
                        break;
                    }
                    self.consume(TokenKind::Comma)?;
                }
                self.consume(TokenKind::RParen)?;
                Constant::Tuple(Rc::from(items))
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// Parameter list of a `def` or `lambda`, recorded on the current context's header.
    pub(super) fn compile_f_args(&mut self, enable_type_hints: bool) -> CompileResult {
        // 0: positional, 1: *args, 2: key=default, 3: **kwargs
        let mut state = 0u8;
        loop {
            if state >= 3 {
                return Err(self.syntax_error("**kwargs should be the last argument"));
            }
            self.match_newlines();
            if self.eat(TokenKind::Star) {
                if state < 1 {
                    state = 1;
                } else {
                    return Err(self.syntax_error("*args should be placed before **kwargs"));
                }
            } else if self.eat(TokenKind::DoubleStar) {
                state = 3;
            }
            self.consume(TokenKind::Id)?;
            let name = self.prev_str();

            let duplicate = self
                .ctx
                .func
                .as_ref()
                .is_some_and(|f| f.has_param(&self.ctx.co, &name));
            if duplicate {
                return Err(self.syntax_error("duplicate argument name"));
            }
            if enable_type_hints && self.eat(TokenKind::Colon) {
                self.consume_type_hints()?;
            }
            if state == 0 && self.curr().kind == TokenKind::Assign {
                state = 2;
            }
            let index = self.ctx.add_varname(&name);
            match state {
                0 => self.header_mut().args.push(index),
                1 => {
                    self.header_mut().starred_arg = Some(index);
                    state += 1;
                }
                2 => {
                    self.consume(TokenKind::Assign)?;
                    let Some(value) = self.read_literal()? else {
                        return Err(self.syntax_error("default argument must be a literal"));
                    };
                    self.header_mut().kwargs.push(KwArg {
                        index,
                        key: name,
                        value,
                    });
                }
                _ => {
                    self.header_mut().starred_kwarg = Some(index);
                    state += 1;
                }
            }
            self.match_newlines();
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    /// Parses and discards an annotation.
    pub(super) fn consume_type_hints(&mut self) -> CompileResult {
        self.expr()?;
        self.pop_expr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::split_conversion;

    #[test]
    fn field_tails() {
        assert_eq!(split_conversion(""), (false, None));
        assert_eq!(split_conversion("!r"), (true, None));
        assert_eq!(split_conversion("!r:>8"), (true, Some(">8".into())));
        assert_eq!(split_conversion(":.2f"), (false, Some(".2f".into())));
        assert_eq!(split_conversion(":"), (false, None));
    }
}
