//! Iteration protocol and generator resumption.
use crate::core::object::{GenState, IterState};
use crate::core::{ObjPayload, ObjectLayout, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

/// One step of a built-in iterator, decided without touching scripted code.
enum Step {
    Item(Value),
    /// Needs `next()` on the wrapped iterators first.
    Delegate,
    Done,
}

impl Vm {
    pub(crate) fn new_iter(&mut self, state: IterState) -> Value {
        self.alloc(tp::ITERATOR, ObjectLayout::Plain, ObjPayload::Iter(state))
    }

    /// `iter(v)`.
    pub fn get_iter(&mut self, v: Value) -> PyResult<Value> {
        match v.ty() {
            tp::ITERATOR | tp::GENERATOR => return Ok(v),
            tp::LIST | tp::TUPLE | tp::STR | tp::BYTES => {
                return Ok(self.new_iter(IterState::Seq { seq: v, index: 0 }));
            }
            _ => {}
        }
        let snapshot: Option<Vec<Value>> = match self.payload(v) {
            Some(ObjPayload::Dict(d)) => Some(d.keys().collect()),
            Some(ObjPayload::Set(s)) => Some(s.values().collect()),
            Some(&ObjPayload::Range(r)) => {
                return Ok(self.new_iter(IterState::Range {
                    cur: r.start,
                    stop: r.stop,
                    step: r.step,
                }));
            }
            _ => None,
        };
        if let Some(items) = snapshot {
            return Ok(self.new_iter(IterState::Values { items, index: 0 }));
        }
        match self.call_magic(v, "__iter__", &[])? {
            Some(it) => Ok(it),
            None => {
                let tn = self.type_name(v);
                Err(self.type_error(format!("'{tn}' object is not iterable")))
            }
        }
    }

    /// Advances an iterator: `Some(item)`, or `None` once exhausted.
    pub fn next_value(&mut self, it: Value) -> PyResult<Option<Value>> {
        match it.ty() {
            tp::ITERATOR => self.iter_step(it),
            tp::GENERATOR => self.gen_next(it),
            _ => {
                if let Some(f) = self.find_type_attr(it.ty(), "__next__") {
                    return match self.call_method(f, it, &[]) {
                        Ok(v) => Ok(Some(v)),
                        Err(_) if self.pending_is(tp::STOP_ITERATION) => {
                            self.clear_pending();
                            Ok(None)
                        }
                        Err(e) => Err(e),
                    };
                }
                let tn = self.type_name(it);
                Err(self.type_error(format!("'{tn}' object is not an iterator")))
            }
        }
    }

    fn iter_step(&mut self, it: Value) -> PyResult<Option<Value>> {
        let step = self.iter_advance(it);
        match step {
            Step::Item(v) => Ok(Some(v)),
            Step::Done => Ok(None),
            Step::Delegate => self.iter_delegate(it),
        }
    }

    /// Advances the self-contained iterator states in place.
    fn iter_advance(&mut self, it: Value) -> Step {
        let Some(id) = it.obj_id() else {
            return Step::Done;
        };
        let (seq, index) = match &mut self.heap.get_mut(id).payload {
            ObjPayload::Iter(IterState::Range { cur, stop, step }) => {
                let more = if *step > 0 { *cur < *stop } else { *cur > *stop };
                if !more {
                    return Step::Done;
                }
                let v = *cur;
                *cur += *step;
                return Step::Item(Value::int(v));
            }
            ObjPayload::Iter(IterState::Values { items, index }) => {
                return match items.get(*index) {
                    Some(&v) => {
                        *index += 1;
                        Step::Item(v)
                    }
                    None => Step::Done,
                };
            }
            ObjPayload::Iter(IterState::Seq { seq, index }) => (*seq, *index),
            ObjPayload::Iter(IterState::Enumerate { .. } | IterState::Zip { .. }) => {
                return Step::Delegate;
            }
            _ => return Step::Done,
        };
        // str iterators advance by byte offset
        let (item, width) = match self.payload(seq) {
            Some(ObjPayload::List(items)) => (items.get(index).copied().map(SeqItem::Value), 1),
            Some(ObjPayload::Tuple(items)) => (items.get(index).copied().map(SeqItem::Value), 1),
            Some(ObjPayload::Bytes(b)) => (
                b.get(index).map(|&byte| SeqItem::Value(Value::int(byte as i64))),
                1,
            ),
            Some(ObjPayload::Str(s)) => match s.get(index..).and_then(|t| t.chars().next()) {
                Some(c) => (Some(SeqItem::Char(c)), c.len_utf8()),
                None => (None, 0),
            },
            _ => (None, 0),
        };
        let Some(item) = item else {
            return Step::Done;
        };
        if let ObjPayload::Iter(IterState::Seq { index, .. }) = &mut self.heap.get_mut(id).payload {
            *index += width;
        }
        match item {
            SeqItem::Value(v) => Step::Item(v),
            SeqItem::Char(c) => {
                let mut buf = [0u8; 4];
                Step::Item(self.new_str(c.encode_utf8(&mut buf)))
            }
        }
    }

    /// `enumerate` and `zip` pull from the iterators they wrap.
    fn iter_delegate(&mut self, it: Value) -> PyResult<Option<Value>> {
        let (inners, count) = match self.payload(it) {
            Some(ObjPayload::Iter(IterState::Enumerate { inner, count })) => (vec![*inner], Some(*count)),
            Some(ObjPayload::Iter(IterState::Zip { inners })) => (inners.to_vec(), None),
            _ => return Ok(None),
        };
        let start = self.stack.len();
        if let Some(n) = count {
            self.stack.push(Value::int(n));
        }
        for inner in inners {
            match self.next_value(inner) {
                Ok(Some(v)) => self.stack.push(v),
                Ok(None) => {
                    self.stack.truncate(start);
                    return Ok(None);
                }
                Err(e) => {
                    self.stack.truncate(start);
                    return Err(e);
                }
            }
        }
        let items = self.stack.split_off(start);
        if let Some(ObjPayload::Iter(IterState::Enumerate { count, .. })) = self.payload_mut(it) {
            *count += 1;
        }
        Ok(Some(self.new_tuple(items)))
    }

    /// Resumes a generator until its next yield. `None` once it has returned.
    pub(crate) fn gen_next(&mut self, g: Value) -> PyResult<Option<Value>> {
        let Some(id) = g.obj_id() else {
            return Ok(None);
        };
        let (frame, values) = match &mut self.heap.get_mut(id).payload {
            ObjPayload::Generator(gen_state) => match gen_state.state {
                GenState::Finished => return Ok(None),
                GenState::Running => (None, Vec::new()),
                GenState::Suspended => {
                    gen_state.state = GenState::Running;
                    (gen_state.frame.take(), std::mem::take(&mut gen_state.values))
                }
            },
            _ => return Ok(None),
        };
        let Some(mut frame) = frame else {
            return Err(self.value_error("generator already executing"));
        };
        // the generator object stays reachable while its frame is off the heap
        self.stack.push(g);
        let p0 = self.stack.len();
        frame.rebase(p0);
        self.stack.extend(values);
        if let Err(e) = self.push_frame(frame) {
            self.stack.truncate(p0 - 1);
            self.finish_generator(id);
            return Err(e);
        }
        let base = self.frames.len();
        let result = self.run_frames(base);
        let yielded = self.frames.len() == base && result.is_ok();
        if yielded {
            // the frame is still on top: park it and its stack region again
            let parked = self.frames.pop();
            let saved = self.stack.split_off(p0);
            self.stack.truncate(p0 - 1);
            if let ObjPayload::Generator(gen_state) = &mut self.heap.get_mut(id).payload {
                gen_state.frame = parked.map(pk_core::PoolBox::into_inner);
                gen_state.values = saved;
                gen_state.state = GenState::Suspended;
            }
            return result.map(Some);
        }
        self.stack.truncate(p0 - 1);
        self.finish_generator(id);
        result.map(|_| None)
    }

    fn finish_generator(&mut self, id: crate::core::ObjectId) {
        if let ObjPayload::Generator(gen_state) = &mut self.heap.get_mut(id).payload {
            gen_state.state = GenState::Finished;
            gen_state.frame = None;
            gen_state.values.clear();
        }
    }
}

enum SeqItem {
    Value(Value),
    Char(char),
}
