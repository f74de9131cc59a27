//! `str()`, `repr()` and format specs.
use std::rc::Rc;

use crate::core::object::slot;
use crate::core::{ObjPayload, Value, tp};
use crate::errors::PyResult;
use crate::format::{self, FormatSpec};
use crate::vm::Vm;

/// A complex component the way `repr(complex)` prints it: integral values drop the `.0`.
fn complex_part(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format::int_repr(v as i64)
    } else {
        format::float_repr(v)
    }
}

pub(crate) fn complex_repr(re: f64, im: f64) -> String {
    if re == 0.0 && re.is_sign_positive() {
        return format!("{}j", complex_part(im));
    }
    let sign = if im < 0.0 || (im == 0.0 && im.is_sign_negative()) { '-' } else { '+' };
    format!("({}{sign}{}j)", complex_part(re), complex_part(im.abs()))
}

impl Vm {
    /// `str(v)`.
    pub fn py_str(&mut self, v: Value) -> PyResult<Rc<str>> {
        if let Some(s) = self.str_value(v) {
            return Ok(s);
        }
        if let Some(f) = self.find_type_attr(v.ty(), "__str__") {
            let r = self.call_method(f, v, &[])?;
            return self.expect_str(r, "__str__");
        }
        self.py_repr(v)
    }

    fn expect_str(&mut self, r: Value, method: &str) -> PyResult<Rc<str>> {
        match self.str_value(r) {
            Some(s) => Ok(s),
            None => {
                let tn = self.type_name(r);
                Err(self.type_error(format!("{method} returned non-string (type {tn})")))
            }
        }
    }

    /// `repr(v)`.
    pub fn py_repr(&mut self, v: Value) -> PyResult<Rc<str>> {
        let text: String = match v.ty() {
            tp::NONE => "None".into(),
            tp::NIL => "<nil>".into(),
            tp::NOT_IMPLEMENTED => "NotImplemented".into(),
            tp::ELLIPSIS => "Ellipsis".into(),
            tp::BOOL => {
                if v.as_bool() == Some(true) {
                    "True".into()
                } else {
                    "False".into()
                }
            }
            tp::INT => format::int_repr(v.as_int().unwrap_or(0)),
            tp::FLOAT => format::float_repr(v.as_float().unwrap_or(0.0)),
            _ => return self.object_repr(v),
        };
        Ok(Rc::from(text))
    }

    fn object_repr(&mut self, v: Value) -> PyResult<Rc<str>> {
        let Some(id) = v.obj_id() else {
            let tn = self.type_name(v);
            return Ok(Rc::from(format!("<{tn} object>")));
        };
        let simple: Option<String> = match self.payload(v) {
            Some(ObjPayload::Str(s)) => Some(format::quote_str(s)),
            Some(ObjPayload::Bytes(b)) => Some(format::bytes_repr(b)),
            Some(&ObjPayload::Complex { re, im }) => Some(complex_repr(re, im)),
            Some(&ObjPayload::Range(r)) => Some(if r.step == 1 {
                format!("range({}, {})", r.start, r.stop)
            } else {
                format!("range({}, {}, {})", r.start, r.stop, r.step)
            }),
            Some(ObjPayload::Function(f)) => Some(format!("<function {}>", f.decl.name())),
            Some(ObjPayload::Native(n)) => Some(format!("<built-in function {}>", n.name)),
            Some(ObjPayload::Type(tid)) => {
                Some(format!("<class '{}'>", self.types[tid.index()].name))
            }
            Some(ObjPayload::Module(m)) => Some(format!("<module '{}'>", m.name)),
            Some(ObjPayload::Generator(g)) => {
                let name = g
                    .frame
                    .as_ref()
                    .map(|f| f.co.name.to_string())
                    .unwrap_or_else(|| "?".into());
                Some(format!("<generator object {name}>"))
            }
            Some(ObjPayload::Iter(_)) => Some("<iterator object>".into()),
            _ => None,
        };
        if let Some(s) = simple {
            return Ok(Rc::from(s));
        }

        match v.ty() {
            tp::LIST | tp::TUPLE | tp::DICT | tp::SET => return self.container_repr(v),
            tp::SLICE => {
                let mut parts = Vec::with_capacity(3);
                for i in [slot::START, slot::STOP, slot::STEP] {
                    let part = self.slot(v, i).unwrap_or(Value::NONE);
                    parts.push(self.py_repr(part)?.to_string());
                }
                return Ok(Rc::from(format!("slice({})", parts.join(", "))));
            }
            tp::BOUND_METHOD => {
                let receiver = self.slot(v, slot::SELF).unwrap_or(Value::NONE);
                let func = self.slot(v, slot::FUNC).unwrap_or(Value::NONE);
                let fname = match self.payload(func) {
                    Some(ObjPayload::Function(f)) => f.decl.name().to_string(),
                    Some(ObjPayload::Native(n)) => n.name.to_string(),
                    _ => "?".into(),
                };
                let r = self.py_repr(receiver)?;
                return Ok(Rc::from(format!("<bound method {fname} of {r}>")));
            }
            _ => {}
        }
        if let Some(f) = self.find_type_attr(v.ty(), "__repr__") {
            let r = self.call_method(f, v, &[])?;
            return self.expect_str(r, "__repr__");
        }
        let tn = self.type_name(v);
        Ok(Rc::from(format!("<{tn} object at 0x{:x}>", id.0)))
    }

    /// Lists, tuples, dicts and sets. A container already being printed shows as `...`.
    fn container_repr(&mut self, v: Value) -> PyResult<Rc<str>> {
        let Some(id) = v.obj_id() else {
            return Ok(Rc::from(""));
        };
        let (open, close) = match v.ty() {
            tp::LIST => ('[', ']'),
            tp::TUPLE => ('(', ')'),
            _ => ('{', '}'),
        };
        if self.repr_guard.contains(&id) {
            return Ok(Rc::from(format!("{open}...{close}")));
        }
        let pairs: Vec<(Value, Option<Value>)> = match self.payload(v) {
            Some(ObjPayload::List(items)) => items.iter().map(|&x| (x, None)).collect(),
            Some(ObjPayload::Tuple(items)) => items.iter().map(|&x| (x, None)).collect(),
            Some(ObjPayload::Set(s)) => s.values().map(|x| (x, None)).collect(),
            Some(ObjPayload::Dict(d)) => d.items().map(|(k, x)| (k, Some(x))).collect(),
            _ => Vec::new(),
        };
        if v.ty() == tp::SET && pairs.is_empty() {
            return Ok(Rc::from("set()"));
        }
        self.repr_guard.push(id);
        let body = self.join_reprs(&pairs);
        self.repr_guard.pop();
        let body = body?;
        let trailing = if v.ty() == tp::TUPLE && pairs.len() == 1 { "," } else { "" };
        Ok(Rc::from(format!("{open}{body}{trailing}{close}")))
    }

    fn join_reprs(&mut self, pairs: &[(Value, Option<Value>)]) -> PyResult<String> {
        let mut out = String::new();
        for (i, &(k, value)) in pairs.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&self.py_repr(k)?);
            if let Some(value) = value {
                out.push_str(": ");
                out.push_str(&self.py_repr(value)?);
            }
        }
        Ok(out)
    }

    /// FORMAT_STRING: applies a `[pad][align][width][.precision][type]` spec.
    pub(crate) fn format_value(&mut self, v: Value, spec: &str) -> PyResult<String> {
        if spec.is_empty() {
            return Ok(self.py_str(v)?.to_string());
        }
        let fs = match FormatSpec::parse(spec) {
            Ok(fs) => fs,
            Err(msg) => return Err(self.value_error(msg)),
        };
        let numeric = matches!(v.ty(), tp::INT | tp::FLOAT);
        let text = match fs.ty {
            Some('f') => match v.as_number() {
                Some(x) => format::format_fixed(x, fs.precision),
                None => return Err(self.format_type_mismatch('f', v)),
            },
            Some('d') => match v.as_index() {
                Some(i) => format::int_repr(i),
                None => return Err(self.format_type_mismatch('d', v)),
            },
            Some('s') => match self.str_value(v) {
                Some(s) => s.to_string(),
                None => return Err(self.format_type_mismatch('s', v)),
            },
            _ => self.py_str(v)?.to_string(),
        };
        Ok(fs.pad(text, numeric))
    }

    fn format_type_mismatch(&mut self, code: char, v: Value) -> crate::errors::Unwind {
        let tn = self.type_name(v);
        self.value_error(format!("Unknown format code '{code}' for object of type '{tn}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::complex_repr;

    #[test]
    fn complex_numbers_print_like_literals() {
        assert_eq!(complex_repr(0.0, 2.0), "2j");
        assert_eq!(complex_repr(1.0, 2.0), "(1+2j)");
        assert_eq!(complex_repr(1.5, -0.5), "(1.5-0.5j)");
    }
}
