//! Operators: the built-in fast paths, then forward and reflected magic methods.
use std::cmp::Ordering;

use pk_ir::Magic;

use crate::core::{ObjPayload, Set, Value, tp};
use crate::errors::{PyResult, messages};
use crate::vm::Vm;

/// Operand data copied out of the heap for the built-in paths.
enum Operand {
    Int(i64),
    Bool(bool),
    Float(f64),
    Complex(f64, f64),
    Str(std::rc::Rc<str>),
    Bytes(std::rc::Rc<[u8]>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict,
    Set(Set),
    Other,
}

fn ordering_result(op: Magic, ord: Ordering) -> Option<bool> {
    Some(match op {
        Magic::Lt => ord == Ordering::Less,
        Magic::Le => ord != Ordering::Greater,
        Magic::Gt => ord == Ordering::Greater,
        Magic::Ge => ord != Ordering::Less,
        Magic::Eq => ord == Ordering::Equal,
        Magic::Ne => ord != Ordering::Equal,
        _ => return None,
    })
}

fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
}

/// `items * n`, or `None` when the result cannot be allocated.
fn repeat<T: Clone>(items: &[T], n: i64) -> Option<Vec<T>> {
    if n <= 0 || items.is_empty() {
        return Some(Vec::new());
    }
    let total = items.len().checked_mul(usize::try_from(n).ok()?)?;
    let mut out = Vec::new();
    out.try_reserve_exact(total).ok()?;
    for _ in 0..n {
        out.extend_from_slice(items);
    }
    Some(out)
}

fn repeat_str(s: &str, n: i64) -> Option<String> {
    if n <= 0 || s.is_empty() {
        return Some(String::new());
    }
    let total = s.len().checked_mul(usize::try_from(n).ok()?)?;
    let mut out = String::new();
    out.try_reserve_exact(total).ok()?;
    for _ in 0..n {
        out.push_str(s);
    }
    Some(out)
}

impl Vm {
    fn repeat_overflow(&mut self) -> crate::errors::Unwind {
        self.raise_new(tp::MEMORY_ERROR, messages::REPEAT_TOO_LARGE)
    }

    fn operand(&self, v: Value) -> Operand {
        match v.ty() {
            tp::INT => return Operand::Int(v.as_int().unwrap_or(0)),
            tp::BOOL => return Operand::Bool(v.as_bool().unwrap_or(false)),
            tp::FLOAT => return Operand::Float(v.as_float().unwrap_or(0.0)),
            _ => {}
        }
        match self.payload(v) {
            Some(&ObjPayload::Complex { re, im }) => Operand::Complex(re, im),
            Some(ObjPayload::Str(s)) => Operand::Str(s.clone()),
            Some(ObjPayload::Bytes(b)) => Operand::Bytes(b.clone()),
            Some(ObjPayload::List(items)) => Operand::List(items.clone()),
            Some(ObjPayload::Tuple(items)) => Operand::Tuple(items.to_vec()),
            Some(ObjPayload::Dict(_)) => Operand::Dict,
            Some(ObjPayload::Set(s)) => Operand::Set(s.clone()),
            _ => Operand::Other,
        }
    }

    /// Applies `op` to two operands.
    pub(crate) fn binary_op(
        &mut self,
        op: Magic,
        rop: Magic,
        lhs: Value,
        rhs: Value,
    ) -> PyResult<Value> {
        if let Some(v) = self.builtin_binary(op, lhs, rhs)? {
            return Ok(v);
        }
        if let Some(f) = self.find_type_attr(lhs.ty(), op.name()) {
            let r = self.call_method(f, lhs, &[rhs])?;
            if !r.is_not_implemented() {
                return Ok(r);
            }
        }
        if op.reflected().is_some() {
            if let Some(f) = self.find_type_attr(rhs.ty(), rop.name()) {
                let r = self.call_method(f, rhs, &[lhs])?;
                if !r.is_not_implemented() {
                    return Ok(r);
                }
            }
        }
        match op {
            Magic::Eq => Ok(Value::bool(lhs.is(rhs))),
            Magic::Ne => Ok(Value::bool(!lhs.is(rhs))),
            _ => {
                let (a, b) = (self.type_name(lhs), self.type_name(rhs));
                Err(self.type_error(format!(
                    "unsupported operand type(s) for '{}': '{a}' and '{b}'",
                    op.operator()
                )))
            }
        }
    }

    fn builtin_binary(&mut self, op: Magic, lhs: Value, rhs: Value) -> PyResult<Option<Value>> {
        use Operand as O;
        let (a, b) = (self.operand(lhs), self.operand(rhs));
        match (a, b) {
            (O::Bool(x), O::Bool(y)) if matches!(op, Magic::And | Magic::Or | Magic::Xor) => {
                Ok(Some(Value::bool(match op {
                    Magic::And => x & y,
                    Magic::Or => x | y,
                    _ => x ^ y,
                })))
            }
            (O::Int(_) | O::Bool(_), O::Int(_) | O::Bool(_)) => {
                let x = lhs.as_index().unwrap_or(0);
                let y = rhs.as_index().unwrap_or(0);
                self.int_op(op, x, y)
            }
            (O::Int(_) | O::Bool(_) | O::Float(_), O::Int(_) | O::Bool(_) | O::Float(_)) => {
                let x = lhs.as_number().unwrap_or(0.0);
                let y = rhs.as_number().unwrap_or(0.0);
                self.float_op(op, x, y)
            }
            (x, y) if matches!(x, O::Complex(..)) || matches!(y, O::Complex(..)) => {
                let as_complex = |o: &O| match *o {
                    O::Complex(re, im) => Some((re, im)),
                    O::Int(i) => Some((i as f64, 0.0)),
                    O::Bool(b) => Some((b as i64 as f64, 0.0)),
                    O::Float(f) => Some((f, 0.0)),
                    _ => None,
                };
                match (as_complex(&x), as_complex(&y)) {
                    (Some(x), Some(y)) => self.complex_op(op, x, y),
                    _ => Ok(None),
                }
            }
            (O::Str(x), O::Str(y)) => Ok(match op {
                Magic::Add => {
                    let mut s = String::with_capacity(x.len() + y.len());
                    s.push_str(&x);
                    s.push_str(&y);
                    Some(self.new_str(&s))
                }
                _ => ordering_result(op, x.cmp(&y)).map(Value::bool),
            }),
            (O::Str(s), O::Int(n)) | (O::Int(n), O::Str(s)) if op == Magic::Mul => {
                match repeat_str(&s, n) {
                    Some(r) => Ok(Some(self.new_str(&r))),
                    None => Err(self.repeat_overflow()),
                }
            }
            (O::Bytes(x), O::Bytes(y)) => Ok(match op {
                Magic::Add => Some(self.new_bytes(&[&x[..], &y[..]].concat())),
                _ => ordering_result(op, x.cmp(&y)).map(Value::bool),
            }),
            (O::List(x), O::List(y)) | (O::Tuple(x), O::Tuple(y)) => match op {
                Magic::Add => {
                    let joined = [x, y].concat();
                    Ok(Some(if lhs.ty() == tp::LIST {
                        self.new_list(joined)
                    } else {
                        self.new_tuple(joined)
                    }))
                }
                Magic::Eq | Magic::Ne | Magic::Lt | Magic::Le | Magic::Gt | Magic::Ge => {
                    self.seq_compare(op, &x, &y).map(|r| Some(Value::bool(r)))
                }
                _ => Ok(None),
            },
            (O::List(items), O::Int(n)) | (O::Int(n), O::List(items)) if op == Magic::Mul => {
                match repeat(&items, n) {
                    Some(r) => Ok(Some(self.new_list(r))),
                    None => Err(self.repeat_overflow()),
                }
            }
            (O::Tuple(items), O::Int(n)) | (O::Int(n), O::Tuple(items)) if op == Magic::Mul => {
                match repeat(&items, n) {
                    Some(r) => Ok(Some(self.new_tuple(r))),
                    None => Err(self.repeat_overflow()),
                }
            }
            (O::Dict, O::Dict) if matches!(op, Magic::Eq | Magic::Ne) => {
                let eq = self.dict_eq(lhs, rhs)?;
                Ok(Some(Value::bool(eq == (op == Magic::Eq))))
            }
            (O::Set(x), O::Set(y)) => Ok(self.set_op(op, &x, &y)),
            _ => Ok(None),
        }
    }

    fn int_op(&mut self, op: Magic, x: i64, y: i64) -> PyResult<Option<Value>> {
        let v = match op {
            Magic::Add => Value::int(x.wrapping_add(y)),
            Magic::Sub => Value::int(x.wrapping_sub(y)),
            Magic::Mul => Value::int(x.wrapping_mul(y)),
            Magic::Truediv => {
                if y == 0 {
                    return Err(self.zero_division());
                }
                Value::float(x as f64 / y as f64)
            }
            Magic::Floordiv => {
                if y == 0 {
                    return Err(self.zero_division());
                }
                Value::int(floor_div(x, y))
            }
            Magic::Mod => {
                if y == 0 {
                    return Err(self.zero_division());
                }
                Value::int(floor_mod(x, y))
            }
            Magic::Pow => {
                if y < 0 {
                    if x == 0 {
                        return Err(self.zero_division());
                    }
                    Value::float((x as f64).powf(y as f64))
                } else {
                    Value::int(x.wrapping_pow(y.min(u32::MAX as i64) as u32))
                }
            }
            Magic::Lshift | Magic::Rshift => {
                if y < 0 {
                    return Err(self.value_error("negative shift count"));
                }
                let v = match (op, y >= 64) {
                    (Magic::Lshift, true) => 0,
                    (Magic::Lshift, false) => x.wrapping_shl(y as u32),
                    (_, true) => {
                        if x < 0 {
                            -1
                        } else {
                            0
                        }
                    }
                    (_, false) => x >> y,
                };
                Value::int(v)
            }
            Magic::And => Value::int(x & y),
            Magic::Or => Value::int(x | y),
            Magic::Xor => Value::int(x ^ y),
            _ => match ordering_result(op, x.cmp(&y)) {
                Some(b) => Value::bool(b),
                None => return Ok(None),
            },
        };
        Ok(Some(v))
    }

    fn float_op(&mut self, op: Magic, x: f64, y: f64) -> PyResult<Option<Value>> {
        let v = match op {
            Magic::Add => x + y,
            Magic::Sub => x - y,
            Magic::Mul => x * y,
            Magic::Truediv | Magic::Floordiv | Magic::Mod if y == 0.0 => {
                return Err(self.zero_division());
            }
            Magic::Truediv => x / y,
            Magic::Floordiv => (x / y).floor(),
            Magic::Mod => float_mod(x, y),
            Magic::Pow => {
                if x == 0.0 && y < 0.0 {
                    return Err(self.zero_division());
                }
                x.powf(y)
            }
            Magic::Lt => return Ok(Some(Value::bool(x < y))),
            Magic::Le => return Ok(Some(Value::bool(x <= y))),
            Magic::Gt => return Ok(Some(Value::bool(x > y))),
            Magic::Ge => return Ok(Some(Value::bool(x >= y))),
            Magic::Eq => return Ok(Some(Value::bool(x == y))),
            Magic::Ne => return Ok(Some(Value::bool(x != y))),
            _ => return Ok(None),
        };
        Ok(Some(Value::float(v)))
    }

    fn complex_op(&mut self, op: Magic, x: (f64, f64), y: (f64, f64)) -> PyResult<Option<Value>> {
        let ((a, b), (c, d)) = (x, y);
        let (re, im) = match op {
            Magic::Add => (a + c, b + d),
            Magic::Sub => (a - c, b - d),
            Magic::Mul => (a * c - b * d, a * d + b * c),
            Magic::Truediv => {
                let denom = c * c + d * d;
                if denom == 0.0 {
                    return Err(self.zero_division());
                }
                ((a * c + b * d) / denom, (b * c - a * d) / denom)
            }
            Magic::Eq => return Ok(Some(Value::bool(a == c && b == d))),
            Magic::Ne => return Ok(Some(Value::bool(a != c || b != d))),
            _ => return Ok(None),
        };
        Ok(Some(self.new_complex(re, im)))
    }

    fn set_op(&mut self, op: Magic, x: &Set, y: &Set) -> Option<Value> {
        let subset = |a: &Set, b: &Set| a.entries().all(|(k, _)| b.contains(k));
        let result = match op {
            Magic::Eq => return Some(Value::bool(x.len() == y.len() && subset(x, y))),
            Magic::Ne => return Some(Value::bool(!(x.len() == y.len() && subset(x, y)))),
            Magic::Le => return Some(Value::bool(subset(x, y))),
            Magic::Ge => return Some(Value::bool(subset(y, x))),
            Magic::Lt => return Some(Value::bool(x.len() < y.len() && subset(x, y))),
            Magic::Gt => return Some(Value::bool(y.len() < x.len() && subset(y, x))),
            Magic::Sub => {
                let mut out = Set::new();
                for (k, v) in x.entries().filter(|(k, _)| !y.contains(k)) {
                    out.insert(k.clone(), v);
                }
                out
            }
            Magic::And => {
                let mut out = Set::new();
                for (k, v) in x.entries().filter(|(k, _)| y.contains(k)) {
                    out.insert(k.clone(), v);
                }
                out
            }
            Magic::Or => {
                let mut out = x.clone();
                for (k, v) in y.entries() {
                    out.insert(k.clone(), v);
                }
                out
            }
            Magic::Xor => {
                let mut out = Set::new();
                for (k, v) in x.entries().filter(|(k, _)| !y.contains(k)) {
                    out.insert(k.clone(), v);
                }
                for (k, v) in y.entries().filter(|(k, _)| !x.contains(k)) {
                    out.insert(k.clone(), v);
                }
                out
            }
            _ => return None,
        };
        Some(self.new_set(result))
    }

    /// Lexicographic comparison; the first unequal pair decides.
    fn seq_compare(&mut self, op: Magic, x: &[Value], y: &[Value]) -> PyResult<bool> {
        for (&a, &b) in x.iter().zip(y.iter()) {
            if !self.py_eq(a, b)? {
                return match op {
                    Magic::Eq => Ok(false),
                    Magic::Ne => Ok(true),
                    _ => {
                        let rop = op.reflected().unwrap_or(op);
                        let r = self.binary_op(op, rop, a, b)?;
                        self.py_bool(r)
                    }
                };
            }
        }
        Ok(ordering_result(op, x.len().cmp(&y.len())).unwrap_or(false))
    }

    fn dict_eq(&mut self, lhs: Value, rhs: Value) -> PyResult<bool> {
        let pairs: Vec<(Value, Option<Value>)> = match (self.payload(lhs), self.payload(rhs)) {
            (Some(ObjPayload::Dict(a)), Some(ObjPayload::Dict(b))) if a.len() == b.len() => {
                a.entries().map(|(k, _, v)| (v, b.get(k))).collect()
            }
            _ => return Ok(false),
        };
        for (a, b) in pairs {
            let Some(b) = b else {
                return Ok(false);
            };
            if !self.py_eq(a, b)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn py_eq(&mut self, a: Value, b: Value) -> PyResult<bool> {
        let r = self.binary_op(Magic::Eq, Magic::Eq, a, b)?;
        self.py_bool(r)
    }

    pub(crate) fn py_lt(&mut self, a: Value, b: Value) -> PyResult<bool> {
        let r = self.binary_op(Magic::Lt, Magic::Gt, a, b)?;
        self.py_bool(r)
    }

    /// Truth value.
    pub fn py_bool(&mut self, v: Value) -> PyResult<bool> {
        match v.ty() {
            tp::NONE | tp::NIL => return Ok(false),
            tp::BOOL => return Ok(v.as_bool().unwrap_or(false)),
            tp::INT => return Ok(v.as_int() != Some(0)),
            tp::FLOAT => return Ok(v.as_float() != Some(0.0)),
            _ => {}
        }
        let builtin = match self.payload(v) {
            Some(ObjPayload::Str(s)) => Some(!s.is_empty()),
            Some(ObjPayload::Bytes(b)) => Some(!b.is_empty()),
            Some(ObjPayload::List(items)) => Some(!items.is_empty()),
            Some(ObjPayload::Tuple(items)) => Some(!items.is_empty()),
            Some(ObjPayload::Dict(d)) => Some(!d.is_empty()),
            Some(ObjPayload::Set(s)) => Some(!s.is_empty()),
            Some(ObjPayload::Range(r)) => Some(!r.is_empty()),
            Some(&ObjPayload::Complex { re, im }) => Some(re != 0.0 || im != 0.0),
            _ => None,
        };
        if let Some(b) = builtin {
            return Ok(b);
        }
        if let Some(r) = self.call_magic(v, "__bool__", &[])? {
            return match r.as_bool() {
                Some(b) => Ok(b),
                None => {
                    let tn = self.type_name(r);
                    Err(self.type_error(format!("__bool__ should return bool, returned {tn}")))
                }
            };
        }
        if let Some(r) = self.call_magic(v, "__len__", &[])? {
            return Ok(r.as_index().unwrap_or(0) != 0);
        }
        Ok(true)
    }

    pub(crate) fn unary_negative(&mut self, v: Value) -> PyResult<Value> {
        match v.ty() {
            tp::INT | tp::BOOL => return Ok(Value::int(v.as_index().unwrap_or(0).wrapping_neg())),
            tp::FLOAT => return Ok(Value::float(-v.as_float().unwrap_or(0.0))),
            _ => {}
        }
        if let Some(&ObjPayload::Complex { re, im }) = self.payload(v) {
            return Ok(self.new_complex(-re, -im));
        }
        match self.call_magic(v, "__neg__", &[])? {
            Some(r) => Ok(r),
            None => {
                let tn = self.type_name(v);
                Err(self.type_error(format!("bad operand type for unary -: '{tn}'")))
            }
        }
    }

    pub(crate) fn unary_invert(&mut self, v: Value) -> PyResult<Value> {
        if let Some(i) = v.as_index() {
            return Ok(Value::int(!i));
        }
        match self.call_magic(v, "__invert__", &[])? {
            Some(r) => Ok(r),
            None => {
                let tn = self.type_name(v);
                Err(self.type_error(format!("bad operand type for unary ~: '{tn}'")))
            }
        }
    }

    /// `item in container`.
    pub fn contains(&mut self, container: Value, item: Value) -> PyResult<bool> {
        match self.operand(container) {
            Operand::Str(s) => match self.str_value(item) {
                Some(needle) => Ok(s.contains(&*needle)),
                None => {
                    let tn = self.type_name(item);
                    Err(self.type_error(format!(
                        "'in <string>' requires string as left operand, not {tn}"
                    )))
                }
            },
            Operand::Bytes(b) => {
                if let Some(byte) = item.as_index() {
                    return Ok(b.contains(&(byte as u8)));
                }
                let needle = match self.payload(item) {
                    Some(ObjPayload::Bytes(n)) => n.clone(),
                    _ => return Err(self.type_error("a bytes-like object is required")),
                };
                Ok(needle.is_empty() || b.windows(needle.len()).any(|w| w == &needle[..]))
            }
            Operand::List(items) | Operand::Tuple(items) => {
                for x in items {
                    if x.is(item) || self.py_eq(x, item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Operand::Dict => {
                let key = self.dict_key(item)?;
                Ok(matches!(self.payload(container), Some(ObjPayload::Dict(d)) if d.contains(&key)))
            }
            Operand::Set(s) => {
                let key = self.dict_key(item)?;
                Ok(s.contains(&key))
            }
            _ => {
                if let Some(&ObjPayload::Range(r)) = self.payload(container) {
                    return Ok(item.as_index().is_some_and(|i| r.contains(i)));
                }
                if let Some(r) = self.call_magic(container, "__contains__", &[item])? {
                    return self.py_bool(r);
                }
                let it = self.get_iter(container)?;
                self.stack.push(it);
                let found = loop {
                    match self.next_value(it) {
                        Ok(Some(x)) => {
                            if x.is(item) || self.py_eq(x, item)? {
                                break Ok(true);
                            }
                        }
                        Ok(None) => break Ok(false),
                        Err(e) => break Err(e),
                    }
                };
                self.stack.pop();
                found
            }
        }
    }

    /// `len(v)`.
    pub fn py_len(&mut self, v: Value) -> PyResult<usize> {
        let n = match self.payload(v) {
            Some(ObjPayload::Str(s)) => Some(s.chars().count()),
            Some(ObjPayload::Bytes(b)) => Some(b.len()),
            Some(ObjPayload::List(items)) => Some(items.len()),
            Some(ObjPayload::Tuple(items)) => Some(items.len()),
            Some(ObjPayload::Dict(d)) => Some(d.len()),
            Some(ObjPayload::Set(s)) => Some(s.len()),
            Some(ObjPayload::Range(r)) => Some(r.len()),
            _ => None,
        };
        if let Some(n) = n {
            return Ok(n);
        }
        match self.call_magic(v, "__len__", &[])? {
            Some(r) => match r.as_index() {
                Some(n) if n >= 0 => Ok(n as usize),
                _ => Err(self.value_error("__len__() should return >= 0")),
            },
            None => {
                let tn = self.type_name(v);
                Err(self.type_error(format!("object of type '{tn}' has no len()")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_floors() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_mod(-7, 2), 1);
        assert_eq!(floor_mod(7, -2), -1);
        assert_eq!(float_mod(-1.0, 3.0), 2.0);
    }

    #[test]
    fn orderings_map_to_comparisons() {
        assert_eq!(ordering_result(Magic::Le, Ordering::Equal), Some(true));
        assert_eq!(ordering_result(Magic::Gt, Ordering::Less), Some(false));
        assert_eq!(ordering_result(Magic::Add, Ordering::Less), None);
        assert_eq!(repeat(&[1, 2], 2), Some(vec![1, 2, 1, 2]));
        assert_eq!(repeat(&[1], -3), Some(Vec::new()));
        assert_eq!(repeat::<i32>(&[], i64::MAX), Some(Vec::new()));
        assert_eq!(repeat(&[0u8; 4], 1 << 62), None);
        assert_eq!(repeat_str("ab", 3).as_deref(), Some("ababab"));
        assert_eq!(repeat_str("ab", 1 << 62), None);
    }
}
