use std::collections::HashSet;
use std::fmt::Write as _;

use crate::{CodeObject, Magic, Opcode};

fn operand(co: &CodeObject, ip: usize) -> String {
    let bc = co.codes[ip];
    let arg = bc.arg;
    use Opcode::*;
    match bc.op {
        LoadConst | FormatString | ImportPath | FstringEval => match co.consts.get(arg as usize) {
            Some(c) => format!("{arg} ({c})"),
            None => arg.to_string(),
        },
        LoadFast | StoreFast | DeleteFast => match co.varname(arg) {
            Some(n) => format!("{arg} ({n})"),
            None => arg.to_string(),
        },
        LoadName | LoadNonlocal | LoadGlobal | LoadAttr | LoadClassGlobal | LoadMethod
        | StoreName | StoreGlobal | StoreAttr | DeleteName | DeleteGlobal | DeleteAttr
        | BeginClass | StoreClassAttr | AddClassAnnotation => match co.name_at(arg) {
            Some(n) => format!("{arg} ({n})"),
            None => arg.to_string(),
        },
        LoadFunction => match co.func_decls.get(arg as usize) {
            Some(decl) => format!("{arg} ({})", decl.name()),
            None => arg.to_string(),
        },
        LoadSmallInt => (arg as i16).to_string(),
        BinaryOp => match Magic::unpack_binary(arg) {
            Some((op, _)) => format!("{arg} ({})", op.operator()),
            None => arg.to_string(),
        },
        Call | CallVargs => format!("{} {}", arg & 0xff, arg >> 8),
        ForIter => match co.blocks.get(arg as usize).and_then(|b| b.end) {
            Some(end) => format!("{arg} (to {end})"),
            None => arg.to_string(),
        },
        op if op.is_jump() => match bc.jump_target(ip) {
            Some(t) => format!("{} (to {t})", bc.jump_offset()),
            None => bc.jump_offset().to_string(),
        },
        NoOp | PopTop | DupTop | DupTopTwo | RotTwo | RotThree | PrintExpr | LoadNone
        | LoadTrue | LoadFalse | LoadEllipsis | LoadNull | LoadSubscr | StoreSubscr
        | DeleteSubscr | BuildImag | Repr | ReturnValue | YieldValue | UnaryNegative
        | UnaryNot | UnaryStar | UnaryInvert | GetIter | PopImportStar | EndClass
        | WithEnter | WithExit | Raise => String::new(),
        _ => arg.to_string(),
    }
}

fn dis_one(co: &CodeObject, out: &mut String) {
    let targets: HashSet<usize> = co
        .codes
        .iter()
        .enumerate()
        .filter_map(|(i, bc)| bc.jump_target(i))
        .collect();
    let mut prev_line = 0;
    for (ip, bc) in co.codes.iter().enumerate() {
        let line = co.line_at(ip);
        let line_col = if line != prev_line {
            prev_line = line;
            line.to_string()
        } else {
            String::new()
        };
        let marker = if targets.contains(&ip) { ">>" } else { "  " };
        let text = format!(
            "{line_col:<6}{marker}{ip:>4} {:<26}{}",
            bc.op.name(),
            operand(co, ip)
        );
        out.push_str(text.trim_end());
        out.push('\n');
    }
    for decl in &co.func_decls {
        let _ = writeln!(out, "\nDisassembly of {}:", decl.name());
        dis_one(&decl.code, out);
    }
}

/// Human-readable listing of `co` and every nested function, one instruction per line:
/// source line (when it changes), jump-target marker, offset, opcode name, resolved operand.
pub fn dis(co: &CodeObject) -> String {
    let mut out = String::new();
    dis_one(co, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{Bytecode, BytecodeEx, Constant};

    fn push(co: &mut CodeObject, op: Opcode, arg: u16, line: u32) {
        co.codes.push(Bytecode::new(op, arg));
        co.codes_ex.push(BytecodeEx {
            line,
            is_virtual: false,
            block: 0,
        });
    }

    #[test]
    fn listing_resolves_operands() {
        let mut co = CodeObject::new(Rc::from("m.py"), "<module>");
        let c = co.add_const(Constant::Int(42)) as u16;
        let n = co.add_name("x");
        push(&mut co, Opcode::LoadConst, c, 1);
        push(&mut co, Opcode::StoreGlobal, n, 1);
        push(&mut co, Opcode::JumpForward, 2, 2);
        push(&mut co, Opcode::NoOp, 0, 2);
        push(&mut co, Opcode::LoadNone, 0, 3);
        push(&mut co, Opcode::ReturnValue, 0, 3);
        let text = dis(&co);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "1          0 LOAD_CONST                0 (42)");
        assert_eq!(lines[1], "           1 STORE_GLOBAL              0 (x)");
        assert_eq!(lines[2], "2          2 JUMP_FORWARD              2 (to 4)");
        assert_eq!(lines[4], "3     >>   4 LOAD_NONE");
    }
}
