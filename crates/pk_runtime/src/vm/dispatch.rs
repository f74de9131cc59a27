//! The step loop.
use pk_ir::{CodeBlockType, Magic, Opcode};

use crate::core::object::slot;
use crate::core::{ObjPayload, ObjectLayout, Value, tp};
use crate::errors::{PyResult, Unwind, messages};

use super::{Called, Vm};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StepResult {
    Continue,
    /// A scripted call pushed a frame.
    Call,
    /// The top frame returned; its value is in the return register.
    Return,
    /// A generator frame suspended; the yielded value is in the return register.
    Yield,
    Error,
}

impl Vm {
    /// Steps until the frame at `base - 1` returns or yields, and hands back its value. On error
    /// every frame at or above that one is unwound into the traceback.
    pub(crate) fn run_frames(&mut self, base: usize) -> PyResult<Value> {
        // every nested loop costs host stack: magic methods, constructors, generator resumes
        if self.nested_loops >= self.config.max_nested_calls {
            let e = self.raise_new(tp::RECURSION_ERROR, messages::RECURSION_LIMIT);
            self.unwind(base);
            return Err(e);
        }
        self.nested_loops += 1;
        let result = self.run_loop(base);
        self.nested_loops -= 1;
        result
    }

    fn run_loop(&mut self, base: usize) -> PyResult<Value> {
        loop {
            match self.step() {
                StepResult::Continue | StepResult::Call => {}
                StepResult::Return => {
                    if self.frames.len() < base {
                        return Ok(self.ret);
                    }
                    self.stack.push(self.ret);
                }
                StepResult::Yield => {
                    if self.frames.len() == base {
                        return Ok(self.ret);
                    }
                    let e = self.runtime_error("yield outside of a resumed generator");
                    self.unwind(base);
                    return Err(e);
                }
                StepResult::Error => {
                    self.unwind(base);
                    return Err(Unwind);
                }
            }
        }
    }

    fn unwind(&mut self, base: usize) {
        while self.frames.len() >= base {
            let Some(frame) = self.frames.pop() else {
                break;
            };
            self.record_trace(&frame);
            self.stack.truncate(frame.p0);
        }
    }

    pub(crate) fn step(&mut self) -> StepResult {
        match self.step_inner() {
            Ok(r) => r,
            Err(Unwind) => StepResult::Error,
        }
    }

    fn jump(&mut self, fi: usize, ip: usize, arg: u16) {
        let target = ip as isize + arg as i16 as isize;
        self.frames[fi].ip = target.max(0) as usize;
    }

    /// Leaves the blocks between `ip` and `target`, popping what each one keeps on the stack.
    fn unwind_blocks(&mut self, fi: usize, ip: usize, target: usize) {
        let co = self.frames[fi].co.clone();
        let mut b = co.block_of(ip);
        loop {
            let Some(block) = co.blocks.get(b as usize) else {
                break;
            };
            if block.contains(target) {
                break;
            }
            // a for loop keeps its iterator, a with block its context manager
            if matches!(
                block.ty,
                CodeBlockType::ForLoop | CodeBlockType::ContextManager
            ) {
                self.stack.pop();
            }
            if b == block.parent {
                break;
            }
            b = block.parent;
        }
    }

    fn step_inner(&mut self) -> PyResult<StepResult> {
        let Some(fi) = self.frames.len().checked_sub(1) else {
            return Ok(StepResult::Return);
        };
        let frame = &mut self.frames[fi];
        let ip = frame.ip;
        let Some(&bc) = frame.co.codes.get(ip) else {
            // falling off the end behaves like `return None`
            let p0 = frame.p0;
            self.frames.pop();
            self.stack.truncate(p0);
            self.ret = Value::NONE;
            return Ok(StepResult::Return);
        };
        frame.ip += 1;
        let arg = bc.arg;
        if self.config.trace_steps {
            tracing::trace!(
                target: "pk::vm",
                depth = fi,
                ip,
                op = bc.op.name(),
                arg,
                sp = self.stack.len(),
            );
        }

        match bc.op {
            Opcode::NoOp => {}
            Opcode::PopTop => {
                self.pop();
            }
            Opcode::DupTop => {
                let v = self.top();
                self.stack.push(v);
            }
            Opcode::DupTopTwo => {
                let (a, b) = (self.peek(1), self.peek(0));
                self.stack.push(a);
                self.stack.push(b);
            }
            Opcode::RotTwo => {
                let n = self.stack.len();
                self.stack.swap(n - 1, n - 2);
            }
            Opcode::RotThree => {
                // [x, y, z] -> [z, x, y]
                let n = self.stack.len();
                self.stack[n - 3..].rotate_right(1);
            }
            Opcode::PrintExpr => {
                let v = self.top();
                if !v.is_none() {
                    let s = self.py_repr(v)?;
                    self.write_out(&s);
                    self.write_out("\n");
                }
                self.pop();
            }

            Opcode::LoadConst => {
                let c = self.frames[fi].co.consts.get(arg as usize).cloned();
                let v = match c {
                    Some(c) => self.const_value(&c),
                    None => Value::NONE,
                };
                self.stack.push(v);
            }
            Opcode::LoadNone => self.stack.push(Value::NONE),
            Opcode::LoadTrue => self.stack.push(Value::TRUE),
            Opcode::LoadFalse => self.stack.push(Value::FALSE),
            Opcode::LoadSmallInt => self.stack.push(Value::int(arg as i16 as i64)),
            Opcode::LoadEllipsis => self.stack.push(Value::ELLIPSIS),
            Opcode::LoadFunction => {
                let f = self.make_function(fi, arg)?;
                self.stack.push(f);
            }
            Opcode::LoadNull => self.stack.push(Value::NIL),

            Opcode::LoadFast => {
                let v = self.stack[self.frames[fi].locals_base + arg as usize];
                if v.is_nil() {
                    return Err(self.unbound_local(fi, arg));
                }
                self.stack.push(v);
            }
            Opcode::LoadName => {
                let name = self.name_operand(fi, arg);
                let v = self.load_name(fi, &name)?;
                self.stack.push(v);
            }
            Opcode::LoadNonlocal => {
                let name = self.name_operand(fi, arg);
                let v = self.load_nonlocal(fi, &name)?;
                self.stack.push(v);
            }
            Opcode::LoadGlobal => {
                let name = self.name_operand(fi, arg);
                let v = self.load_global(fi, &name)?;
                self.stack.push(v);
            }
            Opcode::LoadClassGlobal => {
                let name = self.name_operand(fi, arg);
                let v = self.load_class_global(fi, &name)?;
                self.stack.push(v);
            }
            Opcode::LoadAttr => {
                let name = self.name_operand(fi, arg);
                let obj = self.top();
                let v = self.getattr(obj, &name)?;
                self.replace_top(1, v);
            }
            Opcode::LoadMethod => {
                let name = self.name_operand(fi, arg);
                let obj = self.top();
                let (f, receiver) = self.load_method(obj, &name)?;
                self.replace_top(1, f);
                self.stack.push(receiver);
            }
            Opcode::LoadSubscr => {
                let (obj, key) = (self.peek(1), self.peek(0));
                let v = self.getitem(obj, key)?;
                self.replace_top(2, v);
            }

            Opcode::StoreFast => {
                let v = self.pop();
                let base = self.frames[fi].locals_base;
                self.stack[base + arg as usize] = v;
            }
            Opcode::StoreName => {
                let name = self.name_operand(fi, arg);
                let v = self.pop();
                self.store_name(fi, name, v);
            }
            Opcode::StoreGlobal => {
                let name = self.name_operand(fi, arg);
                let v = self.pop();
                let module = self.frames[fi].module;
                self.module_set(module, name, v);
            }
            Opcode::StoreAttr => {
                // [value, obj]
                let name = self.name_operand(fi, arg);
                let (value, obj) = (self.peek(1), self.peek(0));
                self.setattr(obj, name, value)?;
                let n = self.stack.len();
                self.stack.truncate(n - 2);
            }
            Opcode::StoreSubscr => {
                // [value, obj, key]
                let (value, obj, key) = (self.peek(2), self.peek(1), self.peek(0));
                self.setitem(obj, key, value)?;
                let n = self.stack.len();
                self.stack.truncate(n - 3);
            }

            Opcode::DeleteFast => {
                let slot_index = self.frames[fi].locals_base + arg as usize;
                if self.stack[slot_index].is_nil() {
                    return Err(self.unbound_local(fi, arg));
                }
                self.stack[slot_index] = Value::NIL;
            }
            Opcode::DeleteName => {
                let name = self.name_operand(fi, arg);
                self.delete_name(fi, &name)?;
            }
            Opcode::DeleteGlobal => {
                let name = self.name_operand(fi, arg);
                let module = self.frames[fi].module;
                let removed = self
                    .heap
                    .get_mut(module)
                    .attr_dict_mut()
                    .and_then(|d| d.shift_remove(&*name));
                if removed.is_none() {
                    return Err(self.name_error(&name));
                }
            }
            Opcode::DeleteAttr => {
                let name = self.name_operand(fi, arg);
                let obj = self.top();
                self.delattr(obj, &name)?;
                self.pop();
            }
            Opcode::DeleteSubscr => {
                let (obj, key) = (self.peek(1), self.peek(0));
                self.delitem(obj, key)?;
                let n = self.stack.len();
                self.stack.truncate(n - 2);
            }

            Opcode::BuildImag => {
                let v = self.pop();
                let Some(im) = v.as_number() else {
                    return Err(self.type_error("imaginary literal must be a number"));
                };
                let c = self.new_complex(0.0, im);
                self.stack.push(c);
            }
            Opcode::BuildBytes => {
                let v = self.pop();
                let s = self.str_value(v).unwrap_or_default();
                let b = self.new_bytes(s.as_bytes());
                self.stack.push(b);
            }
            Opcode::BuildTuple => {
                let items = self.pop_n(arg as usize);
                let t = self.new_tuple(items);
                self.stack.push(t);
            }
            Opcode::BuildList => {
                let items = self.pop_n(arg as usize);
                let l = self.new_list(items);
                self.stack.push(l);
            }
            Opcode::BuildDict => {
                let items = self.pop_n(arg as usize);
                let d = self.build_dict(&items)?;
                self.stack.push(d);
            }
            Opcode::BuildSet => {
                let items = self.pop_n(arg as usize);
                let s = self.build_set(&items)?;
                self.stack.push(s);
            }
            Opcode::BuildSlice => {
                let step = self.pop();
                let stop = self.pop();
                let start = self.pop();
                let s = self.new_slice(start, stop, step);
                self.stack.push(s);
            }
            Opcode::BuildString => {
                let n = arg as usize;
                let start = self.stack.len() - n;
                let mut out = String::new();
                for i in start..start + n {
                    let v = self.stack[i];
                    out.push_str(&self.py_str(v)?);
                }
                let s = self.new_str(&out);
                self.replace_top(n, s);
            }
            Opcode::BuildTupleUnpack => {
                let items = self.unpack_star_args(arg as usize)?;
                let t = self.new_tuple(items);
                self.stack.push(t);
            }
            Opcode::BuildListUnpack => {
                let items = self.unpack_star_args(arg as usize)?;
                let l = self.new_list(items);
                self.stack.push(l);
            }
            Opcode::BuildSetUnpack => {
                let items = self.unpack_star_args(arg as usize)?;
                let s = self.build_set(&items)?;
                self.stack.push(s);
            }
            Opcode::BuildDictUnpack => {
                let d = self.build_dict_unpack(arg as usize)?;
                self.stack.push(d);
            }

            Opcode::BinaryOp => {
                let Some((op, rop)) = Magic::unpack_binary(arg) else {
                    return Err(self.runtime_error(format!("invalid BINARY_OP operand {arg}")));
                };
                let (lhs, rhs) = (self.peek(1), self.peek(0));
                let v = self.binary_op(op, rop, lhs, rhs)?;
                self.replace_top(2, v);
            }
            Opcode::IsOp => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.stack.push(Value::bool(lhs.is(rhs) != (arg == 1)));
            }
            Opcode::ContainsOp => {
                // [item, container]
                let (item, container) = (self.peek(1), self.peek(0));
                let found = self.contains(container, item)?;
                self.replace_top(2, Value::bool(found != (arg == 1)));
            }

            Opcode::JumpForward => self.jump(fi, ip, arg),
            Opcode::PopJumpIfFalse => {
                let v = self.top();
                let truthy = self.py_bool(v)?;
                self.pop();
                if !truthy {
                    self.jump(fi, ip, arg);
                }
            }
            Opcode::PopJumpIfTrue => {
                let v = self.top();
                let truthy = self.py_bool(v)?;
                self.pop();
                if truthy {
                    self.jump(fi, ip, arg);
                }
            }
            Opcode::JumpIfTrueOrPop => {
                let v = self.top();
                if self.py_bool(v)? {
                    self.jump(fi, ip, arg);
                } else {
                    self.pop();
                }
            }
            Opcode::JumpIfFalseOrPop => {
                let v = self.top();
                if self.py_bool(v)? {
                    self.pop();
                } else {
                    self.jump(fi, ip, arg);
                }
            }
            Opcode::ShortcutIfFalseOrPop => {
                // [b, res]: a false link ends the chain with `res` as its value
                let res = self.top();
                if self.py_bool(res)? {
                    self.pop();
                } else {
                    self.replace_top(2, res);
                    self.jump(fi, ip, arg);
                }
            }
            Opcode::LoopBreak | Opcode::LoopContinue => {
                let target = (ip as isize + arg as i16 as isize).max(0) as usize;
                self.unwind_blocks(fi, ip, target);
                self.frames[fi].ip = target;
            }

            Opcode::Repr => {
                let v = self.top();
                let s = self.py_repr(v)?;
                let s = self.new_str(&s);
                self.replace_top(1, s);
            }
            Opcode::Call => {
                self.collect_if_needed();
                let argc = (arg & 0xff) as usize;
                let kwargc = (arg >> 8) as usize;
                return self.finish_call(argc, kwargc);
            }
            Opcode::CallVargs => {
                self.collect_if_needed();
                let (argc, kwargc) = self.spread_vargs(arg == 1)?;
                return self.finish_call(argc, kwargc);
            }
            Opcode::ReturnValue => {
                let v = if arg == 1 { Value::NONE } else { self.pop() };
                if let Some(frame) = self.frames.pop() {
                    self.stack.truncate(frame.p0);
                }
                self.ret = v;
                return Ok(StepResult::Return);
            }
            Opcode::YieldValue => {
                self.ret = self.pop();
                return Ok(StepResult::Yield);
            }

            Opcode::ListAppend => {
                // [list, iterator, item]
                let item = self.pop();
                let list = self.peek(1);
                if let Some(ObjPayload::List(items)) = self.payload_mut(list) {
                    items.push(item);
                }
            }
            Opcode::DictAdd => {
                let pair = self.pop();
                let dict = self.peek(1);
                let (k, v) = self.pair_of(pair)?;
                self.dict_set(dict, k, v)?;
            }
            Opcode::SetAdd => {
                let item = self.pop();
                let set = self.peek(1);
                let key = self.dict_key(item)?;
                if let Some(ObjPayload::Set(s)) = self.payload_mut(set) {
                    s.insert(key, item);
                }
            }

            Opcode::UnaryNegative => {
                let v = self.top();
                let r = self.unary_negative(v)?;
                self.replace_top(1, r);
            }
            Opcode::UnaryNot => {
                let v = self.top();
                let truthy = self.py_bool(v)?;
                self.replace_top(1, Value::bool(!truthy));
            }
            Opcode::UnaryStar => {
                let v = self.pop();
                let w = self.alloc(tp::STAR_WRAPPER, ObjectLayout::Slots(2), ObjPayload::Empty);
                self.set_slot(w, slot::STAR_VALUE, v);
                self.set_slot(w, slot::STAR_LEVEL, Value::int(arg as i64));
                self.stack.push(w);
            }
            Opcode::UnaryInvert => {
                let v = self.top();
                let r = self.unary_invert(v)?;
                self.replace_top(1, r);
            }

            Opcode::GetIter => {
                let v = self.top();
                let it = self.get_iter(v)?;
                self.replace_top(1, it);
            }
            Opcode::ForIter => {
                let it = self.top();
                match self.next_value(it)? {
                    Some(v) => self.stack.push(v),
                    None => {
                        self.pop();
                        let end = self.frames[fi]
                            .co
                            .blocks
                            .get(arg as usize)
                            .and_then(|b| b.end);
                        match end {
                            Some(end) => self.frames[fi].ip = end,
                            None => return Err(self.runtime_error("FOR_ITER block has no end")),
                        }
                    }
                }
            }

            Opcode::ImportPath => {
                let path = self.const_str_operand(fi, arg);
                let m = self.import_path(fi, &path)?;
                self.stack.push(m);
            }
            Opcode::PopImportStar => {
                let m = self.top();
                self.import_star(fi, m)?;
                self.pop();
            }

            Opcode::UnpackSequence => {
                let v = self.top();
                let items = self.unpack_values(v)?;
                let n = arg as usize;
                if items.len() != n {
                    let msg = if items.len() > n {
                        format!("too many values to unpack (expected {n})")
                    } else {
                        format!("not enough values to unpack (expected {n}, got {})", items.len())
                    };
                    return Err(self.value_error(msg));
                }
                self.pop();
                self.stack.extend(items);
            }
            Opcode::UnpackEx => {
                let v = self.top();
                let mut items = self.unpack_values(v)?;
                let n = arg as usize;
                if items.len() < n {
                    return Err(self.value_error(format!(
                        "not enough values to unpack (expected at least {n}, got {})",
                        items.len()
                    )));
                }
                let rest = items.split_off(n);
                self.pop();
                self.stack.extend(items);
                let rest = self.new_list(rest);
                self.stack.push(rest);
            }

            Opcode::BeginClass => {
                let name = self.name_operand(fi, arg);
                let base = self.pop();
                self.begin_class(fi, &name, base)?;
            }
            Opcode::EndClass => {
                let Some(tid) = self.frames[fi].class.take() else {
                    return Err(self.runtime_error("END_CLASS without BEGIN_CLASS"));
                };
                let t = self.type_object(tid);
                self.stack.push(t);
            }
            Opcode::StoreClassAttr => {
                let name = self.name_operand(fi, arg);
                let v = self.pop();
                self.store_class_attr(fi, name, v)?;
            }
            Opcode::AddClassAnnotation => {
                let name = self.name_operand(fi, arg);
                if let Some(tid) = self.frames[fi].class {
                    self.types[tid.index()].annotations.push(name);
                }
            }

            Opcode::WithEnter => {
                // [cm] -> [cm, cm.__enter__()]
                let cm = self.top();
                let r = self.with_magic(cm, "__enter__")?;
                self.stack.push(r);
            }
            Opcode::WithExit => {
                let cm = self.top();
                self.with_magic(cm, "__exit__")?;
                self.pop();
            }

            Opcode::Raise => {
                let v = self.top();
                return Err(self.raise_value(v));
            }
            Opcode::RaiseAssert => {
                let msg = if arg == 1 {
                    let m = self.top();
                    self.py_str(m)?
                } else {
                    "".into()
                };
                return Err(self.raise_new(tp::ASSERTION_ERROR, &*msg));
            }

            Opcode::FstringEval => {
                let src = self.const_str_operand(fi, arg);
                let v = self.fstring_eval(fi, &src)?;
                self.stack.push(v);
            }
            Opcode::FormatString => {
                let spec = self.const_str_operand(fi, arg);
                let v = self.top();
                let s = self.format_value(v, &spec)?;
                let s = self.new_str(&s);
                self.replace_top(1, s);
            }
        }
        Ok(StepResult::Continue)
    }

    fn finish_call(&mut self, argc: usize, kwargc: usize) -> PyResult<StepResult> {
        match self.vectorcall_op(argc, kwargc)? {
            Called::Value(v) => {
                self.stack.push(v);
                Ok(StepResult::Continue)
            }
            Called::Frame => Ok(StepResult::Call),
        }
    }

    fn with_magic(&mut self, cm: Value, name: &str) -> PyResult<Value> {
        match self.call_magic(cm, name, &[])? {
            Some(v) => Ok(v),
            None => {
                let tn = self.type_name(cm);
                Err(self.attribute_error(format!("'{tn}' object has no attribute '{name}'")))
            }
        }
    }

    fn unbound_local(&mut self, fi: usize, arg: u16) -> Unwind {
        let name = self.frames[fi]
            .co
            .varname(arg)
            .cloned()
            .unwrap_or_else(|| "?".into());
        self.raise_new(
            tp::UNBOUND_LOCAL_ERROR,
            format!("local variable '{name}' referenced before assignment"),
        )
    }

    fn pop_n(&mut self, n: usize) -> Vec<Value> {
        let at = self.stack.len() - n;
        self.stack.split_off(at)
    }

    pub(crate) fn name_operand(&self, fi: usize, arg: u16) -> std::rc::Rc<str> {
        self.frames[fi]
            .co
            .name_at(arg)
            .cloned()
            .unwrap_or_else(|| "".into())
    }

    fn const_str_operand(&self, fi: usize, arg: u16) -> std::rc::Rc<str> {
        self.frames[fi]
            .co
            .const_str(arg)
            .cloned()
            .unwrap_or_else(|| "".into())
    }
}
