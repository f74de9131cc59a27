//! Statement compilation.
use std::rc::Rc;

use pk_ir::{CodeBlockType, CompileMode, NO_ARG, Opcode};
use pk_syntax::TokenKind;

use super::context::{KEEPLINE, NameScope};
use super::expr::ExprKind;
use super::{CompileResult, Compiler};

impl Compiler {
    /// `:` followed by either inline statements or an indented suite.
    pub(super) fn compile_block_body(&mut self) -> CompileResult {
        self.consume(TokenKind::Colon)?;
        if !matches!(self.curr().kind, TokenKind::Eol | TokenKind::Eof) {
            loop {
                self.compile_stmt()?;
                let possible = !matches!(self.curr().kind, TokenKind::Eol | TokenKind::Eof);
                if self.prev().kind != TokenKind::Semicolon || !possible {
                    break;
                }
            }
            return Ok(());
        }
        if !self.match_newlines() {
            return Err(self.syntax_error("expected a new line after ':'"));
        }
        self.consume(TokenKind::Indent)?;
        while !matches!(self.curr().kind, TokenKind::Dedent | TokenKind::Eof) {
            self.match_newlines();
            self.compile_stmt()?;
            self.match_newlines();
        }
        self.consume(TokenKind::Dedent)
    }

    pub(super) fn compile_stmt(&mut self) -> CompileResult {
        self.advance();
        let kw = self.prev().kind;
        let kw_line = self.prev().line;
        match kw {
            TokenKind::Break => {
                let Some(block) = self.ctx.get_loop() else {
                    return Err(self.syntax_error("'break' outside loop"));
                };
                self.ctx.emit(Opcode::LoopBreak, block, kw_line);
                self.consume_end_stmt()
            }
            TokenKind::Continue => {
                let Some(block) = self.ctx.get_loop() else {
                    return Err(self.syntax_error("'continue' not properly in loop"));
                };
                self.ctx.emit(Opcode::LoopContinue, block, kw_line);
                self.consume_end_stmt()
            }
            TokenKind::Yield => {
                if self.parents.is_empty() {
                    return Err(self.syntax_error("'yield' outside function"));
                }
                self.expr_tuple(false)?;
                self.s_emit_top()?;
                self.ctx.emit(Opcode::YieldValue, NO_ARG, kw_line);
                self.consume_end_stmt()
            }
            TokenKind::YieldFrom => {
                if self.parents.is_empty() {
                    return Err(self.syntax_error("'yield from' outside function"));
                }
                self.expr_tuple(false)?;
                self.s_emit_top()?;
                self.ctx.emit(Opcode::GetIter, NO_ARG, kw_line);
                let block = self.ctx.enter_block(CodeBlockType::ForLoop);
                self.ctx.emit(Opcode::ForIter, block, kw_line);
                self.ctx.emit(Opcode::YieldValue, NO_ARG, kw_line);
                self.ctx.emit(Opcode::LoopContinue, block, kw_line);
                self.ctx.exit_block();
                self.consume_end_stmt()
            }
            TokenKind::Return => {
                if self.parents.is_empty() {
                    return Err(self.syntax_error("'return' outside function"));
                }
                if self.match_end_stmt() {
                    self.ctx.emit(Opcode::ReturnValue, 1, kw_line);
                    return Ok(());
                }
                self.expr_tuple(false)?;
                self.s_emit_top()?;
                self.consume_end_stmt()?;
                self.ctx.emit(Opcode::ReturnValue, NO_ARG, kw_line);
                Ok(())
            }
            TokenKind::If => self.compile_if_stmt(),
            TokenKind::While => self.compile_while_loop(),
            TokenKind::For => self.compile_for_loop(),
            TokenKind::Import => self.compile_normal_import(),
            TokenKind::From => self.compile_from_import(),
            TokenKind::Def => self.compile_function(0),
            TokenKind::At => self.compile_decorated(),
            TokenKind::Class => self.compile_class(0),
            TokenKind::Pass => self.consume_end_stmt(),
            TokenKind::Assert => {
                self.expr()?;
                self.s_emit_top()?;
                let index = self.ctx.emit(Opcode::PopJumpIfTrue, NO_ARG, kw_line);
                let mut has_msg = 0;
                if self.eat(TokenKind::Comma) {
                    self.expr()?;
                    self.s_emit_top()?;
                    has_msg = 1;
                }
                self.ctx.emit(Opcode::RaiseAssert, has_msg, kw_line);
                self.ctx.patch_jump(index);
                self.consume_end_stmt()
            }
            TokenKind::Global => {
                loop {
                    self.consume(TokenKind::Id)?;
                    let name = self.prev_str();
                    if !self.ctx.global_names.contains(&name) {
                        self.ctx.global_names.push(name);
                    }
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.consume_end_stmt()
            }
            TokenKind::Raise => {
                self.expr()?;
                self.s_emit_top()?;
                self.ctx.emit(Opcode::Raise, NO_ARG, kw_line);
                self.consume_end_stmt()
            }
            TokenKind::Del => {
                self.expr_tuple(false)?;
                let e = self.pop_expr()?;
                let r = e.emit_del(&mut self.ctx);
                self.emitted(r)?;
                self.consume_end_stmt()
            }
            TokenKind::With => self.compile_with_stmt(),
            TokenKind::Try => Err(self.syntax_error("try/except is not supported")),
            _ => {
                // not a keyword statement; re-read the token as the start of an expression
                self.i -= 1;
                self.compile_expr_stmt()
            }
        }
    }

    fn compile_expr_stmt(&mut self) -> CompileResult {
        self.expr_tuple(false)?;
        let mut is_typed_name = false;
        if self.ctx.s_top().is_some_and(|e| e.is_name()) && self.eat(TokenKind::Colon) {
            self.consume_type_hints()?;
            is_typed_name = true;
            if self.ctx.is_compiling_class {
                let name = self.ctx.s_top().and_then(|e| e.name().cloned());
                if let Some(name) = name {
                    let i = self.ctx.add_name(&name);
                    self.ctx.emit(Opcode::AddClassAnnotation, i, KEEPLINE);
                }
            }
        }
        if !self.try_compile_assignment()? {
            if self.top_is_starred() {
                return Err(self.syntax_error("can't use starred expression here"));
            }
            if is_typed_name {
                self.pop_expr()?;
            } else {
                self.s_emit_top()?;
                let echo = self.mode == CompileMode::Single && self.name_scope() == NameScope::Global;
                let op = if echo {
                    Opcode::PrintExpr
                } else {
                    Opcode::PopTop
                };
                self.ctx.emit(op, NO_ARG, KEEPLINE);
            }
        }
        self.consume_end_stmt()
    }

    fn try_compile_assignment(&mut self) -> CompileResult<bool> {
        let kind = self.curr().kind;
        if let Some(base) = kind.inplace_base() {
            if self.top_is_starred() {
                return Err(self.syntax_error("can't use starred expression here"));
            }
            if self.ctx.is_compiling_class {
                return Err(self.syntax_error("can't use inplace operator in class definition"));
            }
            let line = self.curr().line;
            self.advance();
            let lhs = self.pop_expr()?;
            self.expr_tuple(false)?;
            let rhs = self.pop_expr()?;
            if rhs.is_starred() {
                return Err(self.syntax_error("can't use starred expression here"));
            }
            let e = self.make_expr(
                line,
                ExprKind::Binary {
                    op: base,
                    lhs,
                    rhs,
                    inplace: true,
                },
            );
            self.emit_expr(&e)?;
            if let ExprKind::Binary { lhs, .. } = &e.kind {
                let r = lhs.emit_istore(&mut self.ctx);
                self.emitted(r)?;
            }
            return Ok(true);
        }
        if kind != TokenKind::Assign {
            return Ok(false);
        }
        let mut n = 0;
        while self.eat(TokenKind::Assign) {
            self.expr_tuple(false)?;
            n += 1;
        }
        // n targets below the value
        self.s_emit_top()?;
        for _ in 1..n {
            self.ctx.emit(Opcode::DupTop, NO_ARG, KEEPLINE);
        }
        for _ in 0..n {
            let target = self.pop_expr()?;
            if target.is_starred() {
                return Err(
                    self.syntax_error("starred assignment target must be in a list or tuple")
                );
            }
            self.emit_store(&target)?;
        }
        Ok(true)
    }

    fn compile_if_stmt(&mut self) -> CompileResult {
        self.expr()?;
        self.s_emit_top()?;
        let patch = self.ctx.emit(Opcode::PopJumpIfFalse, NO_ARG, self.prev().line);
        self.compile_block_body()?;
        if self.eat(TokenKind::Elif) {
            let exit = self.ctx.emit(Opcode::JumpForward, NO_ARG, self.prev().line);
            self.ctx.patch_jump(patch);
            self.compile_if_stmt()?;
            self.ctx.patch_jump(exit);
        } else if self.eat(TokenKind::Else) {
            let exit = self.ctx.emit(Opcode::JumpForward, NO_ARG, self.prev().line);
            self.ctx.patch_jump(patch);
            self.compile_block_body()?;
            self.ctx.patch_jump(exit);
        } else {
            self.ctx.patch_jump(patch);
        }
        Ok(())
    }

    fn compile_while_loop(&mut self) -> CompileResult {
        let block = self.ctx.enter_block(CodeBlockType::WhileLoop);
        self.expr()?;
        self.s_emit_top()?;
        let patch = self.ctx.emit(Opcode::PopJumpIfFalse, NO_ARG, self.prev().line);
        self.compile_block_body()?;
        self.ctx.emit_virtual(Opcode::LoopContinue, block, KEEPLINE);
        self.ctx.patch_jump(patch);
        self.ctx.exit_block();
        self.compile_loop_else(block)
    }

    fn compile_for_loop(&mut self) -> CompileResult {
        self.expr_vars()?;
        self.consume(TokenKind::In)?;
        self.expr_tuple(false)?;
        self.s_emit_top()?;
        self.ctx.emit(Opcode::GetIter, NO_ARG, KEEPLINE);
        let block = self.ctx.enter_block(CodeBlockType::ForLoop);
        self.ctx.emit(Opcode::ForIter, block, KEEPLINE);
        let vars = self.pop_expr()?;
        self.emit_store(&vars)?;
        self.compile_block_body()?;
        self.ctx.emit_virtual(Opcode::LoopContinue, block, KEEPLINE);
        self.ctx.exit_block();
        self.compile_loop_else(block)
    }

    /// `else` runs when the loop ends without `break`; `break` skips past it.
    fn compile_loop_else(&mut self, block: u16) -> CompileResult {
        if self.eat(TokenKind::Else) {
            self.compile_block_body()?;
            let end2 = self.ctx.co.codes.len();
            if let Some(b) = self.ctx.co.blocks.get_mut(block as usize) {
                b.end2 = Some(end2);
            }
        }
        Ok(())
    }

    fn compile_with_stmt(&mut self) -> CompileResult {
        self.expr()?;
        self.s_emit_top()?;
        self.ctx.enter_block(CodeBlockType::ContextManager);
        let mut target = None;
        if self.eat(TokenKind::As) {
            self.consume(TokenKind::Id)?;
            target = Some(self.make_name(self.prev_str(), self.prev().line));
        }
        // [cm] -> [cm, cm.__enter__()]
        self.ctx.emit(Opcode::WithEnter, NO_ARG, self.prev().line);
        match target {
            Some(t) => self.emit_store(&t)?,
            None => {
                self.ctx.emit(Opcode::PopTop, NO_ARG, KEEPLINE);
            }
        }
        self.compile_block_body()?;
        self.ctx.emit(Opcode::WithExit, NO_ARG, self.prev().line);
        self.ctx.exit_block();
        Ok(())
    }

    /// Dotted module name, returned as written.
    fn consume_module_name(&mut self) -> CompileResult<String> {
        self.consume(TokenKind::Id)?;
        let mut name = self.prev_str().to_string();
        while self.eat(TokenKind::Dot) {
            self.consume(TokenKind::Id)?;
            name.push('.');
            name.push_str(&self.prev_str());
        }
        Ok(name)
    }

    fn store_name(&mut self, name: Rc<str>) -> CompileResult {
        let target = self.make_name(name, self.prev().line);
        self.emit_store(&target)
    }

    /// `import a.b [as c], ...`. Without an alias the top-level package is bound.
    fn compile_normal_import(&mut self) -> CompileResult {
        loop {
            let path = self.consume_module_name()?;
            let line = self.prev().line;
            let i = self.ctx.add_const_str(&path);
            self.ctx.emit(Opcode::ImportPath, i, line);
            if self.eat(TokenKind::As) {
                self.consume(TokenKind::Id)?;
                let alias = self.prev_str();
                self.store_name(alias)?;
            } else if let Some((head, _)) = path.split_once('.') {
                self.ctx.emit(Opcode::PopTop, NO_ARG, KEEPLINE);
                let i = self.ctx.add_const_str(head);
                self.ctx.emit(Opcode::ImportPath, i, line);
                self.store_name(Rc::from(head))?;
            } else {
                self.store_name(Rc::from(path.as_str()))?;
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.consume_end_stmt()
    }

    /// `from [.]*a.b import x [as y], ...` or `from a import *`.
    fn compile_from_import(&mut self) -> CompileResult {
        let mut path = String::new();
        loop {
            let dots = match self.curr().kind {
                TokenKind::Dot => 1,
                TokenKind::DotDot => 2,
                TokenKind::Ellipsis => 3,
                _ => break,
            };
            path.extend(std::iter::repeat_n('.', dots));
            self.advance();
        }
        if path.is_empty() || self.curr().kind == TokenKind::Id {
            path.push_str(&self.consume_module_name()?);
        }
        let i = self.ctx.add_const_str(&path);
        self.ctx.emit(Opcode::ImportPath, i, self.prev().line);
        self.consume(TokenKind::Import)?;

        if self.eat(TokenKind::Star) {
            if self.name_scope() == NameScope::Local {
                return Err(
                    self.syntax_error("from <module> import * can only be used in global scope")
                );
            }
            self.ctx.emit(Opcode::PopImportStar, NO_ARG, self.prev().line);
            return self.consume_end_stmt();
        }

        let parenthesized = self.eat(TokenKind::LParen);
        loop {
            if parenthesized {
                self.match_newlines();
                if self.curr().kind == TokenKind::RParen {
                    break;
                }
            }
            self.ctx.emit(Opcode::DupTop, NO_ARG, KEEPLINE);
            self.consume(TokenKind::Id)?;
            let mut name = self.prev_str();
            let i = self.ctx.add_name(&name);
            self.ctx.emit(Opcode::LoadAttr, i, self.prev().line);
            if self.eat(TokenKind::As) {
                self.consume(TokenKind::Id)?;
                name = self.prev_str();
            }
            self.store_name(name)?;
            if parenthesized {
                self.match_newlines();
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        if parenthesized {
            self.match_newlines();
            self.consume(TokenKind::RParen)?;
        }
        self.ctx.emit(Opcode::PopTop, NO_ARG, KEEPLINE);
        self.consume_end_stmt()
    }

    /// Decorator expressions stay on the expression stack until the decorated object exists.
    fn compile_decorated(&mut self) -> CompileResult {
        let mut count = 0;
        loop {
            self.expr()?;
            count += 1;
            if !self.match_newlines() {
                return Err(self.syntax_error("expected a newline after '@'"));
            }
            if !self.eat(TokenKind::At) {
                break;
            }
        }
        if self.eat(TokenKind::Class) {
            self.compile_class(count)
        } else {
            self.consume(TokenKind::Def)?;
            self.compile_function(count)
        }
    }

    fn compile_class(&mut self, decorators: usize) -> CompileResult {
        self.consume(TokenKind::Id)?;
        let name = self.prev_str();
        let line = self.prev().line;
        let namei = self.ctx.add_name(&name);
        let mut has_base = false;
        if self.eat(TokenKind::LParen) {
            if self.is_expression(false) {
                self.expr()?;
                has_base = true;
            }
            self.consume(TokenKind::RParen)?;
        }
        if has_base {
            self.s_emit_top()?;
        } else {
            self.ctx.emit(Opcode::LoadNone, NO_ARG, line);
        }
        self.ctx.emit(Opcode::BeginClass, namei, KEEPLINE);
        if self.is_compiling_class() {
            return Err(self.syntax_error("nested class is not allowed"));
        }
        self.ctx.is_compiling_class = true;
        self.compile_block_body()?;
        self.ctx.is_compiling_class = false;
        // leaves the finished class on the stack
        self.ctx.emit(Opcode::EndClass, namei, KEEPLINE);
        let r = self.ctx.s_emit_decorators(decorators);
        self.emitted(r)?;
        let target = self.make_name(name, line);
        self.emit_store(&target)
    }

    fn compile_function(&mut self, decorators: usize) -> CompileResult {
        self.consume(TokenKind::Id)?;
        let name = self.prev_str();
        let line = self.prev().line;
        self.push_f_context(&name);
        self.consume(TokenKind::LParen)?;
        if !self.eat(TokenKind::RParen) {
            self.compile_f_args(true)?;
            self.consume(TokenKind::RParen)?;
        }
        if self.eat(TokenKind::Arrow) {
            self.consume_type_hints()?;
        }
        self.compile_block_body()?;
        let decl_index = self.pop_f_context()?;
        self.ctx.emit(Opcode::LoadFunction, decl_index, line);
        let r = self.ctx.s_emit_decorators(decorators);
        self.emitted(r)?;
        // inside a class body this becomes STORE_CLASS_ATTR
        let target = self.make_name(name, line);
        self.emit_store(&target)
    }
}
