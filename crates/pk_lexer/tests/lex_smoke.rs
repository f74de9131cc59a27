use pk_lexer::{Lexer, normalize_source};
use pk_syntax::{CompileErrorKind, Token, TokenKind, TokenValue};

fn lex(src: &str) -> Vec<Token> {
    let normalized = normalize_source(src);
    Lexer::new("main.py", &normalized).lex().expect("lex").tokens
}

fn kinds(src: &str) -> Vec<TokenKind> {
    lex(src).into_iter().map(|t| t.kind).collect()
}

fn lex_err(src: &str) -> pk_syntax::CompileError {
    let normalized = normalize_source(src);
    Lexer::new("main.py", &normalized).lex().unwrap_err()
}

#[test]
fn indent_and_dedent() {
    use TokenKind::*;
    assert_eq!(
        kinds("if x:\n    y\nz"),
        vec![Sof, If, Id, Colon, Eol, Indent, Id, Eol, Dedent, Id, Eol, Eof]
    );
}

#[test]
fn dedent_to_unknown_width_fails() {
    let err = lex_err("if x:\n  y\n z");
    assert_eq!(err.kind, CompileErrorKind::Indentation);
    assert_eq!(err.message, "unindent does not match any outer indentation level");
    assert_eq!(err.line, 3);
}

#[test]
fn blank_and_comment_lines_keep_indentation() {
    use TokenKind::*;
    assert_eq!(
        kinds("while x:\n    a\n\n  # note\n    b"),
        vec![Sof, While, Id, Colon, Eol, Indent, Id, Eol, Id, Eol, Dedent, Eof]
    );
}

#[test]
fn brackets_suspend_layout() {
    use TokenKind::*;
    assert_eq!(
        kinds("x = (1,\n        2)\ny"),
        vec![Sof, Id, Assign, LParen, Num, Comma, Num, RParen, Eol, Id, Eol, Eof]
    );
}

#[test]
fn tabs_count_as_four_spaces() {
    use TokenKind::*;
    assert_eq!(
        kinds("if a:\n\tb\n    c"),
        vec![Sof, If, Id, Colon, Eol, Indent, Id, Eol, Id, Eol, Dedent, Eof]
    );
}

#[test]
fn compound_keywords_merge() {
    use TokenKind::*;
    assert_eq!(kinds("a not in b"), vec![Sof, Id, NotIn, Id, Eol, Eof]);
    assert_eq!(kinds("a is not b"), vec![Sof, Id, IsNot, Id, Eol, Eof]);
    assert_eq!(kinds("yield from g"), vec![Sof, YieldFrom, Id, Eol, Eof]);
    assert_eq!(kinds("not a"), vec![Sof, Not, Id, Eol, Eof]);
}

#[test]
fn numbers() {
    let toks = lex("10 0x1F 1.5 2e3 1e-2 3j 1_000");
    let values: Vec<_> = toks
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::Num | TokenKind::Imag))
        .map(|t| (t.kind, t.value.clone()))
        .collect();
    assert_eq!(
        values,
        vec![
            (TokenKind::Num, TokenValue::Int(10)),
            (TokenKind::Num, TokenValue::Int(31)),
            (TokenKind::Num, TokenValue::Float(1.5)),
            (TokenKind::Num, TokenValue::Float(2000.0)),
            (TokenKind::Num, TokenValue::Float(0.01)),
            (TokenKind::Imag, TokenValue::Float(3.0)),
            (TokenKind::Num, TokenValue::Int(1000)),
        ]
    );
}

#[test]
fn number_errors() {
    assert_eq!(lex_err("x = 99999999999999999999").message, "int literal is too large");
    assert_eq!(lex_err("x = 0xzz").message, "invalid number literal");
}

#[test]
fn string_escapes() {
    let toks = lex(r#"'a\tb\x41\0' r'\n' b"\xff""#);
    assert_eq!(toks[1].str_value().map(|s| &**s), Some("a\tbA\0"));
    assert_eq!(toks[2].str_value().map(|s| &**s), Some("\\n"));
    assert_eq!(toks[3].kind, TokenKind::Bytes);
    assert_eq!(toks[3].str_value().map(|s| &**s), Some("\u{ff}"));
}

#[test]
fn string_errors() {
    assert_eq!(lex_err("'abc").message, "EOL while scanning string literal");
    assert_eq!(lex_err("'a\\qb'").message, "invalid escape char");
    assert_eq!(lex_err("'\\xg1'").message, "invalid hex char");
    assert_eq!(lex_err("a ! b").message, "expected '=' after '!'");
}

#[test]
fn triple_quoted_strings_span_lines() {
    let toks = lex("s = '''a\n'b'\nc'''\nt");
    assert_eq!(toks[3].str_value().map(|s| &**s), Some("a\n'b'\nc"));
    assert_eq!(toks[5].line, 4);
}

#[test]
fn fstring_pieces() {
    use TokenKind::*;
    let toks = lex("f'x={x!r:>4} {{ok}} {a.b}'");
    let ks: Vec<_> = toks.iter().map(|t| t.kind).collect();
    assert_eq!(
        ks,
        vec![
            Sof, FStrBegin, FStrCpnt, Id, FStrSpec, FStrCpnt, Id, Dot, Id, FStrSpec, FStrEnd, Eol,
            Eof
        ]
    );
    assert_eq!(toks[2].str_value().map(|s| &**s), Some("x="));
    assert_eq!(toks[4].str_value().map(|s| &**s), Some("!r:>4"));
    assert_eq!(toks[5].str_value().map(|s| &**s), Some(" {ok} "));
    assert_eq!(toks[9].str_value().map(|s| &**s), Some(""));
}

#[test]
fn fstring_nested_brackets_and_strings() {
    use TokenKind::*;
    let ks = kinds("f\"{d['k']}\"");
    assert_eq!(
        ks,
        vec![Sof, FStrBegin, Id, LBracket, Str, RBracket, FStrSpec, FStrEnd, Eol, Eof]
    );
}

#[test]
fn fstring_errors() {
    assert_eq!(lex_err("f'{}'").message, "f-string: empty expression not allowed");
    assert_eq!(lex_err("f'a}b'").message, "f-string: single '}' is not allowed");
    assert_eq!(lex_err("f'{a'").message, "f-string: expecting '}'");
}

#[test]
fn line_starts_table() {
    let normalized = normalize_source("a\nbb\nccc");
    let result = Lexer::new("main.py", &normalized).lex().unwrap();
    assert_eq!(result.line_starts, vec![0, 2, 5]);
}

#[test]
fn unexpected_leading_indent() {
    let err = lex_err("  x = 1");
    assert_eq!(err.message, "unexpected indent");
}
