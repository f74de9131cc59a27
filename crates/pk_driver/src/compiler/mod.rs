//! Single-pass bytecode compiler.
//!
//! Statements dispatch on their leading token; expressions are parsed by Pratt precedence
//! climbing into short-lived IR nodes (see `expr`) that are emitted as soon as their consumer
//! knows whether it needs a value, a store or a delete. Each function body gets its own
//! `CodeEmitContext`; class bodies share the enclosing one.
mod context;
mod expr;
mod parse;
mod rules;
mod stmt;

use std::mem;
use std::rc::Rc;

use pk_core::FixedPool;
use pk_ir::{CodeObject, CompileMode, FuncDecl, FuncKind, MAX_CONSTS, MAX_LOCALS, NO_ARG, Opcode};
use pk_lexer::Lexer;
use pk_syntax::{CompileError, CompileErrorKind, Token, TokenKind};

use crate::CompileOptions;
use context::{CodeEmitContext, FuncHeader, KEEPLINE, NameScope};
use expr::{EmitResult, Expr, ExprBox, ExprKind};

pub(crate) type CompileResult<T = ()> = Result<T, CompileError>;

pub(crate) struct Compiler {
    filename: Rc<str>,
    source: String,
    tokens: Vec<Token>,
    i: usize,
    mode: CompileMode,
    unknown_global_scope: bool,
    /// Innermost context; enclosing ones wait in `parents`.
    ctx: CodeEmitContext,
    parents: Vec<CodeEmitContext>,
    pool: FixedPool<Expr>,
}

impl Compiler {
    /// `source` must already be normalized.
    pub fn new(
        filename: Rc<str>,
        source: String,
        mode: CompileMode,
        options: &CompileOptions,
    ) -> Self {
        let co = CodeObject::new(filename.clone(), "<module>");
        Self {
            filename,
            source,
            tokens: Vec::new(),
            i: 0,
            mode,
            unknown_global_scope: options.unknown_global_scope,
            ctx: CodeEmitContext::new(co, 0),
            parents: Vec::new(),
            pool: FixedPool::new(options.expr_pool_blocks),
        }
    }

    pub fn compile(mut self) -> CompileResult<CodeObject> {
        let lexed = Lexer::new(self.filename.clone(), &self.source).lex()?;
        self.tokens = lexed.tokens;
        self.i = 0;

        // skip @sof so that prev() is always valid
        self.consume(TokenKind::Sof)?;
        self.match_newlines();

        if self.mode == CompileMode::Eval {
            self.expr_tuple(false)?;
            self.s_emit_top()?;
            self.match_newlines();
            self.consume(TokenKind::Eof)?;
            self.ctx.emit(Opcode::ReturnValue, NO_ARG, KEEPLINE);
        } else {
            while !self.eat(TokenKind::Eof) {
                self.compile_stmt()?;
                self.match_newlines();
            }
        }
        self.finish_context()?;
        tracing::debug!(
            target: "pk::compile",
            filename = %self.filename,
            codes = self.ctx.co.codes.len(),
            consts = self.ctx.co.consts.len(),
            functions = self.ctx.co.func_decls.len(),
            "compiled unit"
        );
        Ok(self.ctx.co)
    }

    // ---- token cursor ----

    fn tk(&self, i: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[i.min(last)]
    }

    fn curr(&self) -> &Token {
        self.tk(self.i)
    }

    fn prev(&self) -> &Token {
        self.tk(self.i.saturating_sub(1))
    }

    fn next(&self) -> &Token {
        self.tk(self.i + 1)
    }

    fn advance(&mut self) {
        self.i += 1;
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.curr().kind != kind {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind) -> CompileResult {
        if self.eat(kind) {
            return Ok(());
        }
        Err(self.syntax_error(format!(
            "expected '{}', got '{}'",
            kind.symbol(),
            self.curr().kind.symbol()
        )))
    }

    fn match_newlines(&mut self) -> bool {
        let mut consumed = false;
        while self.curr().kind == TokenKind::Eol {
            self.advance();
            consumed = true;
        }
        consumed
    }

    fn match_end_stmt(&mut self) -> bool {
        if self.eat(TokenKind::Semicolon) {
            self.match_newlines();
            return true;
        }
        if self.match_newlines() || self.curr().kind == TokenKind::Eof {
            return true;
        }
        self.curr().kind == TokenKind::Dedent
    }

    fn consume_end_stmt(&mut self) -> CompileResult {
        if self.match_end_stmt() {
            Ok(())
        } else {
            Err(self.syntax_error("expected statement end"))
        }
    }

    fn prev_str(&self) -> Rc<str> {
        match self.prev().str_value() {
            Some(s) => s.clone(),
            None => Rc::from(self.prev().kind.symbol()),
        }
    }

    // ---- errors ----

    fn syntax_error(&self, msg: impl Into<String>) -> CompileError {
        let tok = self.curr();
        CompileError::new(
            CompileErrorKind::Syntax,
            self.filename.clone(),
            tok.line,
            tok.span,
            msg,
        )
    }

    fn emitted(&self, r: EmitResult) -> CompileResult {
        r.map_err(|e| self.syntax_error(e.0))
    }

    // ---- expression stack ----

    fn make_expr(&self, line: u32, kind: ExprKind) -> ExprBox {
        self.pool.alloc(Expr::new(line, kind))
    }

    fn name_scope(&self) -> NameScope {
        if !self.parents.is_empty() {
            NameScope::Local
        } else if self.unknown_global_scope {
            NameScope::GlobalUnknown
        } else {
            NameScope::Global
        }
    }

    fn make_name(&self, name: Rc<str>, line: u32) -> ExprBox {
        let scope = if self.ctx.global_names.contains(&name) {
            NameScope::Global
        } else {
            self.name_scope()
        };
        self.make_expr(line, ExprKind::Name { name, scope })
    }

    fn push_expr(&mut self, e: ExprBox) {
        self.ctx.s_push(e);
    }

    fn pop_expr(&mut self) -> CompileResult<ExprBox> {
        match self.ctx.s_pop() {
            Some(e) => Ok(e),
            None => Err(self.syntax_error("expected an expression")),
        }
    }

    fn top_is_starred(&self) -> bool {
        self.ctx.s_top().is_some_and(|e| e.is_starred())
    }

    fn s_emit_top(&mut self) -> CompileResult {
        let r = self.ctx.s_emit_top();
        self.emitted(r)
    }

    fn emit_expr(&mut self, e: &Expr) -> CompileResult {
        let r = e.emit(&mut self.ctx);
        self.emitted(r)
    }

    fn emit_store(&mut self, e: &Expr) -> CompileResult {
        let r = e.emit_store(&mut self.ctx);
        self.emitted(r)
    }

    // ---- contexts ----

    fn header_mut(&mut self) -> &mut FuncHeader {
        self.ctx.func.get_or_insert_with(FuncHeader::default)
    }

    fn is_compiling_class(&self) -> bool {
        self.ctx.is_compiling_class || self.parents.iter().any(|c| c.is_compiling_class)
    }

    fn push_f_context(&mut self, name: &str) {
        let nested = self.name_scope() == NameScope::Local;
        let mut co = CodeObject::new(self.filename.clone(), name);
        co.start_line = self.prev().line;
        let mut ctx = CodeEmitContext::new(co, self.parents.len() + 1);
        ctx.func = Some(FuncHeader {
            nested,
            ..FuncHeader::default()
        });
        let parent = mem::replace(&mut self.ctx, ctx);
        self.parents.push(parent);
    }

    /// Appends the `return None` guard, checks table limits, resolves loop jumps and
    /// classifies the function kind.
    fn finish_context(&mut self) -> CompileResult<Option<FuncKind>> {
        self.ctx.s_clean();
        // The guard is always appended: a jump may land one past the last explicit return.
        self.ctx.emit_virtual(Opcode::ReturnValue, 1, KEEPLINE);

        let mut j = self.i.saturating_sub(1);
        while j > 0
            && matches!(
                self.tk(j).kind,
                TokenKind::Eol | TokenKind::Dedent | TokenKind::Eof
            )
        {
            j -= 1;
        }
        self.ctx.co.end_line = self.tk(j).line;

        if self.ctx.co.nlocals() > MAX_LOCALS {
            return Err(self.syntax_error("maximum number of local variables exceeded"));
        }
        if self.ctx.co.consts.len() > MAX_CONSTS {
            return Err(self.syntax_error("maximum number of constants exceeded"));
        }

        let co = &mut self.ctx.co;
        for i in 0..co.codes.len() {
            let bc = co.codes[i];
            let target = match bc.op {
                Opcode::LoopContinue => co.blocks.get(bc.arg as usize).map(|b| b.start),
                Opcode::LoopBreak => co.blocks.get(bc.arg as usize).and_then(|b| b.break_target()),
                _ => continue,
            };
            if let Some(target) = target {
                co.codes[i].arg = (target as isize - i as isize) as i16 as u16;
            }
        }

        let Some(func) = &self.ctx.func else {
            return Ok(None);
        };
        let codes = &self.ctx.co.codes;
        if self.ctx.co.has_yield() {
            if codes
                .iter()
                .any(|bc| bc.op == Opcode::ReturnValue && bc.arg == NO_ARG)
            {
                return Err(
                    self.syntax_error("'return' with argument inside generator function")
                );
            }
            return Ok(Some(FuncKind::Generator));
        }
        let simple =
            func.kwargs.is_empty() && func.starred_arg.is_none() && func.starred_kwarg.is_none();
        if !simple {
            return Ok(Some(FuncKind::Normal));
        }
        let empty = codes.len() == 1 && codes[0].op == Opcode::ReturnValue && codes[0].arg == 1;
        Ok(Some(if empty {
            FuncKind::Empty
        } else {
            FuncKind::Simple
        }))
    }

    /// Closes the current function context and registers its declaration with the parent.
    /// Returns the declaration's index for `LOAD_FUNCTION`.
    fn pop_f_context(&mut self) -> CompileResult<u16> {
        let kind = self.finish_context()?.unwrap_or(FuncKind::Normal);
        let Some(parent) = self.parents.pop() else {
            return Err(self.syntax_error("unbalanced function context"));
        };
        let child = mem::replace(&mut self.ctx, parent);
        let mut co = child.co;
        let header = child.func.unwrap_or_default();

        let mut docstring = None;
        if co.codes.len() >= 2
            && co.codes[0].op == Opcode::LoadConst
            && co.codes[1].op == Opcode::PopTop
        {
            if let Some(s) = co.const_str(co.codes[0].arg).cloned() {
                co.codes[0].op = Opcode::NoOp;
                co.codes[1].op = Opcode::NoOp;
                docstring = Some(s);
            }
        }

        tracing::debug!(
            target: "pk::compile",
            name = %co.name,
            kind = ?kind,
            nlocals = co.nlocals(),
            "function compiled"
        );
        let decl = FuncDecl {
            code: Rc::new(co),
            args: header.args.into_iter().collect(),
            kwargs: header.kwargs,
            starred_arg: header.starred_arg,
            starred_kwarg: header.starred_kwarg,
            nested: header.nested,
            kind,
            docstring,
        };
        self.ctx.co.func_decls.push(Rc::new(decl));
        Ok((self.ctx.co.func_decls.len() - 1) as u16)
    }
}
