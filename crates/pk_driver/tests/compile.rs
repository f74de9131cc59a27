use pk_driver::Driver;
use pk_ir::{CodeObject, CompileMode, Constant, Frontend, FuncKind, Opcode, dis};
use pk_syntax::CompileErrorKind;

fn compile(src: &str) -> CodeObject {
    Driver::new()
        .compile_text("main.py", src, CompileMode::Exec)
        .expect("compile")
}

fn compile_err(src: &str) -> String {
    let err = Driver::new()
        .compile_text("main.py", src, CompileMode::Exec)
        .unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::Syntax, "{err}");
    err.message
}

fn ops(co: &CodeObject) -> Vec<Opcode> {
    co.codes.iter().map(|bc| bc.op).collect()
}

#[test]
fn call_statement() {
    use Opcode::*;
    let co = compile("print(1)\n");
    assert_eq!(
        ops(&co),
        vec![LoadGlobal, LoadNull, LoadSmallInt, Call, PopTop, ReturnValue]
    );
    assert_eq!(co.codes[3].arg, 1);
    // the trailing `return None` is compiler-synthesized
    assert!(co.codes_ex[5].is_virtual);
}

#[test]
fn chained_comparison_evaluates_each_operand_once() {
    use Opcode::*;
    let co = compile("a < b < c");
    assert_eq!(
        ops(&co),
        vec![
            LoadGlobal,
            LoadGlobal,
            DupTop,
            RotThree,
            BinaryOp,
            ShortcutIfFalseOrPop,
            LoadGlobal,
            BinaryOp,
            PopTop,
            ReturnValue,
        ]
    );
    // the bail-out lands on the merge point right after the last compare
    assert_eq!(co.codes[5].jump_target(5), Some(8));
    assert_eq!(co.names.len(), 3);
}

#[test]
fn swap_elides_tuple_round_trip() {
    use Opcode::*;
    let co = compile("a, b = b, a");
    assert_eq!(
        ops(&co),
        vec![LoadGlobal, LoadGlobal, StoreGlobal, StoreGlobal, ReturnValue]
    );
}

#[test]
fn unpacking_keeps_sequence_ops() {
    let co = compile("a, *b = x");
    assert!(ops(&co).contains(&Opcode::UnpackEx));
    let co = compile("a, b = x");
    assert!(ops(&co).contains(&Opcode::UnpackSequence));
}

#[test]
fn starred_target_errors() {
    assert_eq!(
        compile_err("*a = 1"),
        "starred assignment target must be in a list or tuple"
    );
    assert_eq!(
        compile_err("a, *b, c = x"),
        "starred assignment target must be the last one"
    );
    assert_eq!(
        compile_err("*a, *b = x"),
        "multiple starred expressions in assignment"
    );
}

#[test]
fn control_flow_errors() {
    assert_eq!(compile_err("break"), "'break' outside loop");
    assert_eq!(compile_err("continue"), "'continue' not properly in loop");
    assert_eq!(compile_err("return 1"), "'return' outside function");
    assert_eq!(compile_err("yield 1"), "'yield' outside function");
    assert_eq!(
        compile_err("def g():\n    yield 1\n    return 2\n"),
        "'return' with argument inside generator function"
    );
    assert_eq!(
        compile_err("try:\n    pass\n"),
        "try/except is not supported"
    );
}

#[test]
fn from_import_ends_at_its_line() {
    let co = compile(
        "from m import a, b as c\nprint(a)\nfrom m import (\n    a,\n    b,\n)\nx = 1\n",
    );
    let ops = ops(&co);
    assert_eq!(ops.iter().filter(|op| **op == Opcode::ImportPath).count(), 2);
    assert_eq!(ops.iter().filter(|op| **op == Opcode::LoadAttr).count(), 4);
    assert!(co.names.contains("c"));
}

#[test]
fn break_inside_function_inside_loop_is_rejected() {
    assert_eq!(
        compile_err("for i in x:\n    def f():\n        break\n"),
        "'break' outside loop"
    );
}

#[test]
fn definition_errors() {
    assert_eq!(compile_err("def f(a, a): pass"), "duplicate argument name");
    assert_eq!(
        compile_err("def f(a=b): pass"),
        "default argument must be a literal"
    );
    assert_eq!(
        compile_err("def f(**kw, a): pass"),
        "**kwargs should be the last argument"
    );
    assert_eq!(
        compile_err("def f(a, b=2, *rest): pass"),
        "*args should be placed before **kwargs"
    );
    assert_eq!(
        compile_err("f(a=1, 2)"),
        "positional argument follows keyword argument"
    );
    assert_eq!(
        compile_err("class A:\n    class B:\n        pass\n"),
        "nested class is not allowed"
    );
    assert_eq!(compile_err("x + 1 = 2"), "cannot assign to this expression");
    assert_eq!(compile_err("del 1"), "cannot delete this expression");
    assert_eq!(
        compile_err("class A:\n    x += 1\n"),
        "can't use inplace operator in class definition"
    );
}

#[test]
fn local_limit() {
    let mut src = String::from("def f():\n");
    for i in 0..65 {
        src.push_str(&format!("    v{i} = {i}\n"));
    }
    assert_eq!(
        compile_err(&src),
        "maximum number of local variables exceeded"
    );
}

#[test]
fn missing_operand_names_the_token() {
    assert_eq!(compile_err("x = 1 +\n"), "expected an expression, got @eol");
}

#[test]
fn for_else_break_skips_else() {
    use Opcode::*;
    let co = compile("for i in x:\n    break\nelse:\n    y = 1\n");
    assert_eq!(
        ops(&co),
        vec![
            LoadGlobal,
            GetIter,
            ForIter,
            StoreGlobal,
            LoopBreak,
            LoopContinue,
            LoadSmallInt,
            StoreGlobal,
            ReturnValue,
        ]
    );
    let block = co.blocks[1];
    assert_eq!(block.start, 2);
    assert_eq!(block.end, Some(6));
    assert_eq!(block.end2, Some(8));
    assert_eq!(co.codes[4].jump_target(4), Some(8));
    assert_eq!(co.codes[5].jump_target(5), Some(2));
    assert_eq!(co.codes[2].arg, 1);
}

#[test]
fn while_continue_jumps_to_condition() {
    let co = compile("while a:\n    continue\n");
    let at = ops(&co)
        .iter()
        .position(|&op| op == Opcode::LoopContinue)
        .unwrap();
    assert_eq!(co.codes[at].jump_target(at), Some(0));
}

#[test]
fn function_kinds() {
    let co = compile(
        "def s(a): return a\n\
         def e(): pass\n\
         def n(a, b=1): pass\n\
         def v(*args): pass\n\
         def g(): yield 1\n",
    );
    let kinds: Vec<FuncKind> = co.func_decls.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            FuncKind::Simple,
            FuncKind::Empty,
            FuncKind::Normal,
            FuncKind::Normal,
            FuncKind::Generator,
        ]
    );
    let n = &co.func_decls[2];
    assert_eq!(n.args.len(), 1);
    assert_eq!(n.kwargs[0].value, Constant::Int(1));
    assert_eq!(n.signature(), "n(a, b=1)");
    assert!(co.func_decls[3].starred_arg.is_some());
}

#[test]
fn docstring_is_captured() {
    let co = compile("def f():\n    'hello'\n    return 1\n");
    let decl = &co.func_decls[0];
    assert_eq!(decl.docstring.as_deref(), Some("hello"));
    assert_eq!(decl.code.codes[0].op, Opcode::NoOp);
    assert_eq!(decl.code.codes[1].op, Opcode::NoOp);
    assert_eq!(decl.code.start_line, 1);
    assert_eq!(decl.code.end_line, 3);
}

#[test]
fn local_and_global_names() {
    let co = compile("def f(a):\n    global g\n    g = a\n    b = a\n    return b\n");
    let f = &co.func_decls[0].code;
    let f_ops = ops(f);
    assert!(f_ops.contains(&Opcode::StoreGlobal));
    assert!(f_ops.contains(&Opcode::StoreFast));
    assert!(f_ops.contains(&Opcode::LoadFast));
    assert_eq!(f.nlocals(), 2);
    assert!(!co.func_decls[0].nested);
}

#[test]
fn nested_functions_load_nonlocal() {
    let co = compile("def outer():\n    x = 1\n    def inner():\n        return x\n    return inner\n");
    let outer = &co.func_decls[0];
    let inner = &outer.code.func_decls[0];
    assert!(inner.nested);
    assert!(ops(&inner.code).contains(&Opcode::LoadNonlocal));
}

#[test]
fn decorators_wrap_before_store() {
    use Opcode::*;
    let co = compile("@d\ndef f(): pass\n");
    assert_eq!(
        ops(&co),
        vec![
            LoadFunction,
            LoadGlobal,
            RotTwo,
            LoadNull,
            RotTwo,
            Call,
            StoreGlobal,
            ReturnValue,
        ]
    );
}

#[test]
fn class_body_uses_class_ops() {
    use Opcode::*;
    let co = compile("class A(B):\n    x = 1\n    def m(self):\n        return self.x\n");
    assert_eq!(
        ops(&co),
        vec![
            LoadGlobal,
            BeginClass,
            LoadSmallInt,
            StoreClassAttr,
            LoadFunction,
            StoreClassAttr,
            EndClass,
            StoreGlobal,
            ReturnValue,
        ]
    );
}

#[test]
fn method_calls_use_load_method() {
    let co = compile("xs.append(1)");
    assert_eq!(co.codes[1].op, Opcode::LoadMethod);
}

#[test]
fn fstring_fields() {
    let co = compile("s = f'{x} and {y + 1:>4}{z!r}'");
    let o = ops(&co);
    assert!(o.contains(&Opcode::FstringEval));
    assert!(o.contains(&Opcode::FormatString));
    assert!(o.contains(&Opcode::Repr));
    let build = co
        .codes
        .iter()
        .find(|bc| bc.op == Opcode::BuildString)
        .unwrap();
    assert_eq!(build.arg, 4);
    assert!(co.consts.contains(&Constant::Str("y + 1".into())));
    assert!(co.consts.contains(&Constant::Str(">4".into())));
}

#[test]
fn comprehension_uses_a_for_block() {
    let co = compile("ys = [x * 2 for x in xs if x]");
    let o = ops(&co);
    assert_eq!(o[0], Opcode::BuildList);
    assert!(o.contains(&Opcode::ListAppend));
    assert!(o.contains(&Opcode::PopJumpIfFalse));
    assert_eq!(co.blocks.len(), 2);
}

#[test]
fn eval_and_single_modes() {
    let driver = Driver::new();
    let co = driver
        .compile_text("<eval>", "1 + 2", CompileMode::Eval)
        .unwrap();
    let n = co.codes.len();
    assert_eq!(co.codes[n - 2].op, Opcode::ReturnValue);
    assert_eq!(co.codes[n - 2].arg, 0);

    let co = driver
        .compile_text("<stdin>", "1 + 2", CompileMode::Single)
        .unwrap();
    assert!(ops(&co).contains(&Opcode::PrintExpr));
}

#[test]
fn dynamic_compile_resolves_names_at_run_time() {
    let co = Driver::new()
        .compile_dynamic("x = y", "<exec>", CompileMode::Exec)
        .unwrap();
    assert_eq!(ops(&co)[..2], [Opcode::LoadName, Opcode::StoreName]);
}

#[test]
fn imports() {
    use Opcode::*;
    let co = compile("import a.b\nfrom .c import d as e, f\n");
    assert_eq!(
        ops(&co),
        vec![
            ImportPath,
            PopTop,
            ImportPath,
            StoreGlobal,
            ImportPath,
            DupTop,
            LoadAttr,
            StoreGlobal,
            DupTop,
            LoadAttr,
            StoreGlobal,
            PopTop,
            ReturnValue,
        ]
    );
    assert!(co.consts.contains(&Constant::Str(".c".into())));
    assert_eq!(
        compile_err("def f():\n    from m import *\n"),
        "from <module> import * can only be used in global scope"
    );
}

#[test]
fn compile_is_deterministic_and_dis_is_pure() {
    let src = "def f(n):\n    s = 0\n    for i in range(n):\n        if i % 2 == 0:\n            s += i\n    return s\nprint(f(10))\n";
    let a = compile(src);
    let b = compile(src);
    let before = a.codes.clone();
    let text_a = dis(&a);
    assert_eq!(text_a, dis(&b));
    assert_eq!(text_a, dis(&a));
    assert_eq!(a.codes, before);
    assert!(text_a.contains("Disassembly of f:"));
}
