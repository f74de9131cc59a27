//! Constructors for built-in objects, hashing, and the helpers that spread iterables onto the
//! value stack.
use std::rc::Rc;

use pk_ir::Constant;

use crate::core::object::{RangeObj, slot};
use crate::core::{Dict, DictKey, ObjPayload, ObjectLayout, Set, Value, tp};
use crate::errors::{PyResult, messages};
use crate::vm::Vm;

impl Vm {
    pub fn new_str(&mut self, s: &str) -> Value {
        self.alloc(tp::STR, ObjectLayout::Plain, ObjPayload::Str(Rc::from(s)))
    }

    pub(crate) fn new_str_rc(&mut self, s: Rc<str>) -> Value {
        self.alloc(tp::STR, ObjectLayout::Plain, ObjPayload::Str(s))
    }

    pub fn new_list(&mut self, items: Vec<Value>) -> Value {
        self.alloc(tp::LIST, ObjectLayout::Plain, ObjPayload::List(items))
    }

    pub fn new_tuple(&mut self, items: Vec<Value>) -> Value {
        self.alloc(
            tp::TUPLE,
            ObjectLayout::Plain,
            ObjPayload::Tuple(items.into_boxed_slice()),
        )
    }

    pub(crate) fn new_dict(&mut self, d: Dict) -> Value {
        self.alloc(tp::DICT, ObjectLayout::Plain, ObjPayload::Dict(d))
    }

    pub(crate) fn new_set(&mut self, s: Set) -> Value {
        self.alloc(tp::SET, ObjectLayout::Plain, ObjPayload::Set(s))
    }

    pub fn new_bytes(&mut self, b: &[u8]) -> Value {
        self.alloc(tp::BYTES, ObjectLayout::Plain, ObjPayload::Bytes(Rc::from(b)))
    }

    pub(crate) fn new_complex(&mut self, re: f64, im: f64) -> Value {
        self.alloc(tp::COMPLEX, ObjectLayout::Plain, ObjPayload::Complex { re, im })
    }

    pub(crate) fn new_slice(&mut self, start: Value, stop: Value, step: Value) -> Value {
        let s = self.alloc(tp::SLICE, ObjectLayout::Slots(3), ObjPayload::Empty);
        self.set_slot(s, slot::START, start);
        self.set_slot(s, slot::STOP, stop);
        self.set_slot(s, slot::STEP, step);
        s
    }

    pub(crate) fn new_range(&mut self, r: RangeObj) -> Value {
        self.alloc(tp::RANGE, ObjectLayout::Plain, ObjPayload::Range(r))
    }

    /// Materializes a compile-time constant. String constants are interned permanently.
    pub(crate) fn const_value(&mut self, c: &Constant) -> Value {
        match c {
            Constant::None => Value::NONE,
            Constant::Bool(b) => Value::bool(*b),
            Constant::Int(i) => Value::int(*i),
            Constant::Float(f) => Value::float(*f),
            Constant::Str(s) => self.intern_str(s),
            Constant::Bytes(b) => self.new_bytes(b),
            Constant::Ellipsis => Value::ELLIPSIS,
            Constant::Tuple(items) => {
                let values: Vec<Value> = items.iter().map(|c| self.const_value(c)).collect();
                self.new_tuple(values)
            }
        }
    }

    pub(crate) fn intern_str(&mut self, s: &Rc<str>) -> Value {
        if let Some(&id) = self.str_consts.get(s) {
            return Value::obj(tp::STR, id);
        }
        let v = self.alloc_permanent(tp::STR, ObjectLayout::Plain, ObjPayload::Str(s.clone()));
        if let Some(id) = v.obj_id() {
            self.str_consts.insert(s.clone(), id);
        }
        v
    }

    pub(crate) fn payload(&self, v: Value) -> Option<&ObjPayload> {
        self.heap_obj(v).map(|o| &o.payload)
    }

    pub(crate) fn payload_mut(&mut self, v: Value) -> Option<&mut ObjPayload> {
        let id = v.obj_id()?;
        Some(&mut self.heap.get_mut(id).payload)
    }

    pub fn str_value(&self, v: Value) -> Option<Rc<str>> {
        if v.ty() != tp::STR {
            return None;
        }
        match self.payload(v)? {
            ObjPayload::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Items of a list or tuple.
    pub(crate) fn seq_items(&self, v: Value) -> Option<Vec<Value>> {
        match self.payload(v)? {
            ObjPayload::List(items) => Some(items.clone()),
            ObjPayload::Tuple(items) => Some(items.to_vec()),
            _ => None,
        }
    }

    /// `(key, value)` out of a two-item list or tuple.
    pub(crate) fn pair_of(&mut self, v: Value) -> PyResult<(Value, Value)> {
        match self.seq_items(v).as_deref() {
            Some(&[k, v]) => Ok((k, v)),
            Some(items) => {
                let n = items.len();
                Err(self.value_error(format!(
                    "dictionary update sequence element has length {n}; 2 is required"
                )))
            }
            None => {
                let tn = self.type_name(v);
                Err(self.type_error(format!("cannot convert '{tn}' object to a key/value pair")))
            }
        }
    }

    pub(crate) fn dict_set(&mut self, dict: Value, k: Value, v: Value) -> PyResult<()> {
        let key = self.dict_key(k)?;
        if let Some(ObjPayload::Dict(d)) = self.payload_mut(dict) {
            d.insert(key, k, v);
        }
        Ok(())
    }

    /// Entries of a mapping, for `**` unpacking.
    pub(crate) fn mapping_items(&mut self, v: Value) -> PyResult<Vec<(Value, Value)>> {
        match self.payload(v) {
            Some(ObjPayload::Dict(d)) => Ok(d.items().collect()),
            _ => {
                let tn = self.type_name(v);
                Err(self.type_error(format!("'{tn}' object is not a mapping")))
            }
        }
    }

    /// BUILD_DICT: every item is a `(key, value)` pair.
    pub(crate) fn build_dict(&mut self, items: &[Value]) -> PyResult<Value> {
        let mut d = Dict::new();
        for &item in items {
            let (k, v) = self.pair_of(item)?;
            let key = self.dict_key(k)?;
            d.insert(key, k, v);
        }
        Ok(self.new_dict(d))
    }

    pub(crate) fn build_set(&mut self, items: &[Value]) -> PyResult<Value> {
        let mut s = Set::new();
        for &item in items {
            let key = self.dict_key(item)?;
            s.insert(key, item);
        }
        Ok(self.new_set(s))
    }

    /// Value and level of a star wrapper; None for anything else.
    pub(crate) fn star_parts(&self, v: Value) -> Option<(Value, i64)> {
        if v.ty() != tp::STAR_WRAPPER {
            return None;
        }
        let obj = self.heap_obj(v)?;
        let value = *obj.slots().get(slot::STAR_VALUE)?;
        let level = obj.slots().get(slot::STAR_LEVEL)?.as_int()?;
        Some((value, level))
    }

    /// Consumes the top `n` operands, spreading `*x` wrappers, and returns the flat items.
    pub(crate) fn unpack_star_args(&mut self, n: usize) -> PyResult<Vec<Value>> {
        let start = self.stack.len() - n;
        for i in start..start + n {
            let v = self.stack[i];
            match self.star_parts(v) {
                Some((inner, 1)) => {
                    self.push_iterable(inner)?;
                }
                Some(_) => return Err(self.type_error("'**' unpacking is only valid in a dict")),
                None => self.stack.push(v),
            }
        }
        let items = self.stack.split_off(start + n);
        self.stack.truncate(start);
        Ok(items)
    }

    /// BUILD_DICT_UNPACK: pairs and `**mapping` wrappers, later keys win.
    pub(crate) fn build_dict_unpack(&mut self, n: usize) -> PyResult<Value> {
        let start = self.stack.len() - n;
        let dict = self.new_dict(Dict::new());
        self.stack.push(dict);
        for i in start..start + n {
            let v = self.stack[i];
            match self.star_parts(v) {
                Some((inner, 2)) => {
                    for (k, v) in self.mapping_items(inner)? {
                        self.dict_set(dict, k, v)?;
                    }
                }
                Some(_) => return Err(self.type_error("'*' unpacking is not valid in a dict")),
                None => {
                    let (k, v) = self.pair_of(v)?;
                    self.dict_set(dict, k, v)?;
                }
            }
        }
        self.stack.truncate(start);
        Ok(dict)
    }

    /// Pushes every item of `v` onto the value stack and returns how many were pushed.
    pub(crate) fn push_iterable(&mut self, v: Value) -> PyResult<usize> {
        let fast: Option<Vec<Value>> = match self.payload(v) {
            Some(ObjPayload::List(items)) => Some(items.clone()),
            Some(ObjPayload::Tuple(items)) => Some(items.to_vec()),
            Some(ObjPayload::Dict(d)) => Some(d.keys().collect()),
            Some(ObjPayload::Set(s)) => Some(s.values().collect()),
            _ => None,
        };
        if let Some(items) = fast {
            let n = items.len();
            self.stack.extend(items);
            return Ok(n);
        }
        let it = self.get_iter(v)?;
        self.stack.push(it);
        let it_slot = self.stack.len() - 1;
        let mut n = 0;
        while let Some(item) = self.next_value(it)? {
            self.stack.push(item);
            n += 1;
        }
        self.stack.remove(it_slot);
        Ok(n)
    }

    /// Every item of an iterable. The result is not rooted; callers must not run scripted code
    /// before storing it.
    pub(crate) fn collect_values(&mut self, v: Value) -> PyResult<Vec<Value>> {
        let start = self.stack.len();
        match self.push_iterable(v) {
            Ok(_) => Ok(self.stack.split_off(start)),
            Err(e) => {
                self.stack.truncate(start);
                Err(e)
            }
        }
    }

    /// Source items for UNPACK_SEQUENCE and UNPACK_EX.
    pub(crate) fn unpack_values(&mut self, v: Value) -> PyResult<Vec<Value>> {
        self.collect_values(v)
    }

    /// Reduces a value to its dictionary key. Containers that can change are unhashable.
    pub(crate) fn dict_key(&mut self, v: Value) -> PyResult<DictKey> {
        match v.ty() {
            tp::NONE => return Ok(DictKey::None),
            tp::INT | tp::BOOL => return Ok(DictKey::Int(v.as_index().unwrap_or(0))),
            tp::FLOAT => return Ok(DictKey::from_float(v.as_float().unwrap_or(0.0))),
            tp::LIST | tp::DICT | tp::SET => {
                let tn = self.type_name(v);
                return Err(self.type_error(format!("{}: '{tn}'", messages::UNHASHABLE)));
            }
            _ => {}
        }
        let key = match self.payload(v) {
            Some(ObjPayload::Str(s)) => DictKey::Str(s.clone()),
            Some(ObjPayload::Bytes(b)) => DictKey::Bytes(b.clone()),
            Some(ObjPayload::Tuple(items)) => {
                let items = items.to_vec();
                let mut keys = Vec::with_capacity(items.len());
                for item in items {
                    keys.push(self.dict_key(item)?);
                }
                DictKey::Tuple(keys.into_boxed_slice())
            }
            Some(_) => match v.obj_id() {
                Some(id) => DictKey::Id(id),
                None => DictKey::Singleton(v.ty()),
            },
            None => DictKey::Singleton(v.ty()),
        };
        Ok(key)
    }

    /// `hash(v)`: ints hash to themselves, everything else through the key's hash.
    pub(crate) fn py_hash(&mut self, v: Value) -> PyResult<i64> {
        let key = self.dict_key(v)?;
        if let DictKey::Int(i) = key {
            return Ok(i);
        }
        let state = ahash::RandomState::with_seeds(0x70, 0x6b, 0x72, 0x73);
        Ok(state.hash_one(&key) as i64)
    }

    /// Resolves a possibly negative index against `len`.
    pub(crate) fn normalize_index(&mut self, index: i64, len: usize, what: &str) -> PyResult<usize> {
        let i = if index < 0 { index + len as i64 } else { index };
        if i < 0 || i >= len as i64 {
            return Err(self.index_error(format!("{what} {}", messages::INDEX_OUT_OF_RANGE)));
        }
        Ok(i as usize)
    }

    /// Integer index out of an int or bool operand.
    pub(crate) fn index_operand(&mut self, v: Value, what: &str) -> PyResult<i64> {
        match v.as_index() {
            Some(i) => Ok(i),
            None => {
                let tn = self.type_name(v);
                Err(self.type_error(format!(
                    "{what} indices must be integers or slices, not {tn}"
                )))
            }
        }
    }

    /// `(start, stop, step)` of a slice object; the step defaults to 1 and may not be 0.
    pub(crate) fn slice_bounds(&mut self, s: Value) -> PyResult<(Option<i64>, Option<i64>, i64)> {
        let parts = self
            .heap_obj(s)
            .map(|o| o.slots().to_vec())
            .unwrap_or_default();
        let mut bounds = [None; 3];
        for (i, part) in parts.iter().take(3).enumerate() {
            if part.is_none() || part.is_nil() {
                continue;
            }
            match part.as_index() {
                Some(n) => bounds[i] = Some(n),
                None => {
                    return Err(self.type_error("slice indices must be integers or None"));
                }
            }
        }
        let step = bounds[2].unwrap_or(1);
        if step == 0 {
            return Err(self.value_error("slice step cannot be zero"));
        }
        Ok((bounds[0], bounds[1], step))
    }

    /// The positions a slice object selects from a sequence of `len` items.
    pub(crate) fn slice_indices(&mut self, s: Value, len: usize) -> PyResult<Vec<usize>> {
        let (start, stop, step) = self.slice_bounds(s)?;
        Ok(slice_positions(start, stop, step, len))
    }
}

/// Clamps `start:stop:step` against `len` and lists the selected positions.
pub(crate) fn slice_positions(
    start: Option<i64>,
    stop: Option<i64>,
    step: i64,
    len: usize,
) -> Vec<usize> {
    let len = len as i64;
    let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
    let clamp = |v: Option<i64>, default: i64| match v {
        None => default,
        Some(v) if v < 0 => (v + len).max(lower),
        Some(v) => v.min(upper),
    };
    let (start, stop) = if step < 0 {
        (clamp(start, upper), clamp(stop, lower))
    } else {
        (clamp(start, lower), clamp(stop, upper))
    };
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(i as usize);
        i += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::slice_positions;

    #[test]
    fn slices_clamp_like_sequences() {
        assert_eq!(slice_positions(None, None, 1, 4), vec![0, 1, 2, 3]);
        assert_eq!(slice_positions(Some(1), Some(-1), 1, 4), vec![1, 2]);
        assert_eq!(slice_positions(None, None, -1, 3), vec![2, 1, 0]);
        assert_eq!(slice_positions(Some(-10), Some(10), 2, 5), vec![0, 2, 4]);
        assert_eq!(slice_positions(Some(3), Some(1), 1, 5), Vec::<usize>::new());
        assert_eq!(slice_positions(Some(10), None, -2, 5), vec![4, 2, 0]);
    }
}
