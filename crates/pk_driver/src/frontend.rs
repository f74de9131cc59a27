//! Compile entry points: file loading, lexing for tooling, and the `Frontend` implementation the
//! runtime calls back into for imports and dynamic evaluation.
use std::fs;
use std::rc::Rc;
use std::time::Instant;

use pk_ir::{CodeObject, CompileMode, Frontend};
use pk_lexer::{Lexer, decode_source, normalize_source};
use pk_syntax::{CompileError, SourceFile, Token};

use crate::compiler::Compiler;

#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Blocks preallocated for expression nodes; deeper nesting spills to the global allocator.
    pub expr_pool_blocks: usize,
    /// Resolve top-level names at run time (LOAD_NAME / STORE_NAME).
    pub unknown_global_scope: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            expr_pool_blocks: 512,
            unknown_global_scope: false,
        }
    }
}

pub struct LexedFile {
    pub path: String,
    pub source: SourceFile,
    pub tokens: Vec<Token>,
}

#[derive(Default)]
pub struct Driver {
    options: CompileOptions,
}

impl Driver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Reads, validates and normalizes a source file.
    pub fn load_file(&self, path: &str) -> Result<SourceFile, String> {
        let bytes = fs::read(path).map_err(|e| format!("Failed to read file {path}: {e}"))?;
        let text = decode_source(&bytes, path).map_err(|e| e.to_string())?;
        Ok(SourceFile::new(path, normalize_source(&text)))
    }

    pub fn lex_source(&self, source: &SourceFile) -> Result<LexedFile, CompileError> {
        let lexed = Lexer::new(source.name.clone(), source.text.as_str()).lex()?;
        Ok(LexedFile {
            path: source.name.to_string(),
            source: source.clone(),
            tokens: lexed.tokens,
        })
    }

    pub fn lex_text(&self, path: &str, input: &str) -> Result<LexedFile, CompileError> {
        self.lex_source(&SourceFile::new(path, normalize_source(input)))
    }

    /// Compiles an already-normalized source file.
    pub fn compile_source(
        &self,
        source: &SourceFile,
        mode: CompileMode,
    ) -> Result<CodeObject, CompileError> {
        self.compile_with(
            source.name.clone(),
            source.text.as_str().to_string(),
            mode,
            &self.options,
        )
    }

    pub fn compile_text(
        &self,
        path: &str,
        input: &str,
        mode: CompileMode,
    ) -> Result<CodeObject, CompileError> {
        self.compile_with(Rc::from(path), normalize_source(input), mode, &self.options)
    }

    fn compile_with(
        &self,
        filename: Rc<str>,
        normalized: String,
        mode: CompileMode,
        options: &CompileOptions,
    ) -> Result<CodeObject, CompileError> {
        let started = Instant::now();
        let result = Compiler::new(filename.clone(), normalized, mode, options).compile();
        tracing::debug!(
            target: "pk::driver",
            filename = %filename,
            mode = ?mode,
            ok = result.is_ok(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "compile"
        );
        result
    }
}

impl Frontend for Driver {
    fn compile(
        &self,
        source: &str,
        filename: &str,
        mode: CompileMode,
    ) -> Result<Rc<CodeObject>, CompileError> {
        self.compile_text(filename, source, mode).map(Rc::new)
    }

    fn compile_dynamic(
        &self,
        source: &str,
        filename: &str,
        mode: CompileMode,
    ) -> Result<Rc<CodeObject>, CompileError> {
        let options = CompileOptions {
            unknown_global_scope: true,
            ..self.options.clone()
        };
        self.compile_with(Rc::from(filename), normalize_source(source), mode, &options)
            .map(Rc::new)
    }
}
