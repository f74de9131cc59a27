//! Attribute and subscript access.
use std::rc::Rc;

use crate::core::object::slot;
use crate::core::{ObjPayload, ObjectLayout, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

/// What a subscript operates on, copied out of the heap so the heap can be mutated.
enum Indexable {
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Range(crate::core::object::RangeObj),
    Dict,
    Other,
}

impl Vm {
    /// Wraps functions found on a class into methods bound to `receiver`.
    pub(crate) fn bind_method(&mut self, receiver: Value, f: Value) -> Value {
        if !matches!(f.ty(), tp::FUNCTION | tp::NATIVE_FUNC) {
            return f;
        }
        let m = self.alloc(tp::BOUND_METHOD, ObjectLayout::Slots(2), ObjPayload::Empty);
        self.set_slot(m, slot::SELF, receiver);
        self.set_slot(m, slot::FUNC, f);
        m
    }

    /// Binds an attribute found on a class for a load through `receiver`: an instance, or the
    /// class itself for classmethods reached through `super`.
    pub(crate) fn bind_class_attr(&mut self, receiver: Value, f: Value) -> PyResult<Value> {
        match f.ty() {
            tp::STATICMETHOD => Ok(self.slot(f, slot::WRAPPED).unwrap_or(Value::NONE)),
            tp::CLASSMETHOD => {
                let func = self.slot(f, slot::WRAPPED).unwrap_or(Value::NONE);
                let cls = if receiver.ty() == tp::TYPE {
                    receiver
                } else {
                    self.type_object(receiver.ty())
                };
                Ok(self.bind_method(cls, func))
            }
            tp::PROPERTY => {
                let getter = self.slot(f, slot::PROP_GET).unwrap_or(Value::NONE);
                if getter.is_none() {
                    return Err(self.attribute_error("unreadable attribute"));
                }
                self.call(getter, &[receiver])
            }
            _ => Ok(self.bind_method(receiver, f)),
        }
    }

    fn instance_attr(&self, obj: Value, name: &str) -> Option<Value> {
        self.heap_obj(obj)?.attr_dict()?.get(name).copied()
    }

    /// Attribute lookup that reports a miss as `None` instead of raising.
    pub(crate) fn getattr_opt(&mut self, obj: Value, name: &str) -> PyResult<Option<Value>> {
        if name == "__class__" {
            return Ok(Some(self.type_object(obj.ty())));
        }
        match obj.ty() {
            tp::TYPE => {
                let Some(tid) = self.as_type(obj) else {
                    return Ok(None);
                };
                return Ok(match name {
                    "__name__" => {
                        let n = self.types[tid.index()].name.clone();
                        Some(self.new_str_rc(n))
                    }
                    "__base__" => Some(match self.types[tid.index()].base {
                        Some(b) => self.type_object(b),
                        None => Value::NONE,
                    }),
                    _ => match self.find_type_attr(tid, name) {
                        Some(f) if matches!(f.ty(), tp::STATICMETHOD | tp::CLASSMETHOD) => {
                            Some(self.bind_class_attr(obj, f)?)
                        }
                        other => other,
                    },
                });
            }
            tp::MODULE => return Ok(self.instance_attr(obj, name)),
            tp::SUPER => {
                let receiver = self.slot(obj, slot::SUPER_SELF).unwrap_or(Value::NONE);
                let start = self.slot(obj, slot::SUPER_TYPE).and_then(|t| self.as_type(t));
                return match start.and_then(|tid| self.find_base_attr(tid, name)) {
                    Some(f) => self.bind_class_attr(receiver, f).map(Some),
                    None => Ok(None),
                };
            }
            tp::FUNCTION => {
                let (fname, doc) = match self.payload(obj) {
                    Some(ObjPayload::Function(f)) => (f.decl.name().clone(), f.decl.docstring.clone()),
                    _ => return Ok(None),
                };
                match name {
                    "__name__" => return Ok(Some(self.new_str_rc(fname))),
                    "__doc__" => {
                        return Ok(Some(match doc {
                            Some(d) => self.new_str_rc(d),
                            None => Value::NONE,
                        }));
                    }
                    _ => {}
                }
            }
            tp::NATIVE_FUNC if name == "__name__" => {
                if let Some(ObjPayload::Native(n)) = self.payload(obj) {
                    let n = n.name.clone();
                    return Ok(Some(self.new_str_rc(n)));
                }
            }
            tp::BOUND_METHOD => match name {
                "__self__" => return Ok(self.slot(obj, slot::SELF)),
                "__func__" => return Ok(self.slot(obj, slot::FUNC)),
                _ => {}
            },
            tp::COMPLEX => {
                if let Some(&ObjPayload::Complex { re, im }) = self.payload(obj) {
                    match name {
                        "real" => return Ok(Some(Value::float(re))),
                        "imag" => return Ok(Some(Value::float(im))),
                        _ => {}
                    }
                }
            }
            tp::SLICE => match name {
                "start" => return Ok(self.slot(obj, slot::START)),
                "stop" => return Ok(self.slot(obj, slot::STOP)),
                "step" => return Ok(self.slot(obj, slot::STEP)),
                _ => {}
            },
            tp::RANGE => {
                if let Some(&ObjPayload::Range(r)) = self.payload(obj) {
                    match name {
                        "start" => return Ok(Some(Value::int(r.start))),
                        "stop" => return Ok(Some(Value::int(r.stop))),
                        "step" => return Ok(Some(Value::int(r.step))),
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        // properties win over the instance dictionary
        let class_attr = self.find_type_attr(obj.ty(), name);
        if let Some(p) = class_attr.filter(|p| p.ty() == tp::PROPERTY) {
            return self.bind_class_attr(obj, p).map(Some);
        }
        if let Some(v) = self.instance_attr(obj, name) {
            return Ok(Some(v));
        }
        if let Some(f) = class_attr {
            return self.bind_class_attr(obj, f).map(Some);
        }
        if let Some(hook) = self.find_type_attr(obj.ty(), "__getattr__") {
            let key = self.new_str(name);
            return self.call_method(hook, obj, &[key]).map(Some);
        }
        Ok(None)
    }

    pub fn getattr(&mut self, obj: Value, name: &str) -> PyResult<Value> {
        match self.getattr_opt(obj, name)? {
            Some(v) => Ok(v),
            None => Err(self.no_attribute(obj, name)),
        }
    }

    fn no_attribute(&mut self, obj: Value, name: &str) -> crate::errors::Unwind {
        let msg = match obj.ty() {
            tp::TYPE => {
                let tn = self
                    .as_type(obj)
                    .map(|t| self.types[t.index()].name.clone())
                    .unwrap_or_else(|| "?".into());
                format!("type object '{tn}' has no attribute '{name}'")
            }
            tp::MODULE => {
                let mn = match self.payload(obj) {
                    Some(ObjPayload::Module(m)) => m.name.clone(),
                    _ => "?".into(),
                };
                format!("module '{mn}' has no attribute '{name}'")
            }
            _ => {
                let tn = self.type_name(obj);
                format!("'{tn}' object has no attribute '{name}'")
            }
        };
        self.attribute_error(msg)
    }

    /// LOAD_METHOD: `(function, receiver)` when a class function can be called unbound,
    /// otherwise `(attribute, nil)`.
    pub(crate) fn load_method(&mut self, obj: Value, name: &str) -> PyResult<(Value, Value)> {
        let plain_instance = !matches!(obj.ty(), tp::TYPE | tp::MODULE | tp::SUPER);
        if plain_instance && self.instance_attr(obj, name).is_none() {
            if let Some(f) = self.find_type_attr(obj.ty(), name) {
                if matches!(f.ty(), tp::FUNCTION | tp::NATIVE_FUNC) {
                    return Ok((f, obj));
                }
            }
        }
        let v = self.getattr(obj, name)?;
        Ok((v, Value::NIL))
    }

    pub fn setattr(&mut self, obj: Value, name: Rc<str>, v: Value) -> PyResult<()> {
        if !matches!(obj.ty(), tp::TYPE | tp::MODULE) {
            if let Some(p) = self.find_type_attr(obj.ty(), &name).filter(|p| p.ty() == tp::PROPERTY) {
                let setter = self.slot(p, slot::PROP_SET).unwrap_or(Value::NONE);
                if setter.is_none() {
                    return Err(self.attribute_error(format!("can't set attribute '{name}'")));
                }
                self.call(setter, &[obj, v])?;
                return Ok(());
            }
        }
        let stored = match obj.obj_id() {
            Some(id) => match self.heap.get_mut(id).attr_dict_mut() {
                Some(d) => {
                    d.insert(name.clone(), v);
                    true
                }
                None => false,
            },
            None => false,
        };
        if stored {
            Ok(())
        } else {
            Err(self.no_attribute(obj, &name))
        }
    }

    pub(crate) fn delattr(&mut self, obj: Value, name: &str) -> PyResult<()> {
        let removed = obj
            .obj_id()
            .and_then(|id| self.heap.get_mut(id).attr_dict_mut())
            .and_then(|d| d.shift_remove(name));
        match removed {
            Some(_) => Ok(()),
            None => Err(self.no_attribute(obj, name)),
        }
    }

    fn indexable(&self, obj: Value) -> Indexable {
        match self.payload(obj) {
            Some(ObjPayload::List(items)) => Indexable::List(items.clone()),
            Some(ObjPayload::Tuple(items)) => Indexable::Tuple(items.to_vec()),
            Some(ObjPayload::Str(s)) => Indexable::Str(s.clone()),
            Some(ObjPayload::Bytes(b)) => Indexable::Bytes(b.clone()),
            Some(ObjPayload::Range(r)) => Indexable::Range(*r),
            Some(ObjPayload::Dict(_)) => Indexable::Dict,
            _ => Indexable::Other,
        }
    }

    pub fn getitem(&mut self, obj: Value, key: Value) -> PyResult<Value> {
        let is_slice = key.ty() == tp::SLICE;
        match self.indexable(obj) {
            Indexable::List(items) | Indexable::Tuple(items) if is_slice => {
                let picked: Vec<Value> = self
                    .slice_indices(key, items.len())?
                    .into_iter()
                    .map(|i| items[i])
                    .collect();
                Ok(if obj.ty() == tp::LIST {
                    self.new_list(picked)
                } else {
                    self.new_tuple(picked)
                })
            }
            Indexable::List(items) => {
                let i = self.index_operand(key, "list")?;
                let i = self.normalize_index(i, items.len(), "list")?;
                Ok(items[i])
            }
            Indexable::Tuple(items) => {
                let i = self.index_operand(key, "tuple")?;
                let i = self.normalize_index(i, items.len(), "tuple")?;
                Ok(items[i])
            }
            Indexable::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                if is_slice {
                    let picked: String = self
                        .slice_indices(key, chars.len())?
                        .into_iter()
                        .map(|i| chars[i])
                        .collect();
                    return Ok(self.new_str(&picked));
                }
                let i = self.index_operand(key, "string")?;
                let i = self.normalize_index(i, chars.len(), "string")?;
                let mut buf = [0u8; 4];
                Ok(self.new_str(chars[i].encode_utf8(&mut buf)))
            }
            Indexable::Bytes(b) => {
                if is_slice {
                    let picked: Vec<u8> = self
                        .slice_indices(key, b.len())?
                        .into_iter()
                        .map(|i| b[i])
                        .collect();
                    return Ok(self.new_bytes(&picked));
                }
                let i = self.index_operand(key, "bytes")?;
                let i = self.normalize_index(i, b.len(), "bytes")?;
                Ok(Value::int(b[i] as i64))
            }
            Indexable::Range(r) => {
                if is_slice {
                    let picked: Vec<Value> = self
                        .slice_indices(key, r.len())?
                        .into_iter()
                        .map(|i| Value::int(r.start + i as i64 * r.step))
                        .collect();
                    return Ok(self.new_list(picked));
                }
                let i = self.index_operand(key, "range")?;
                let i = self.normalize_index(i, r.len(), "range object")?;
                Ok(Value::int(r.start + i as i64 * r.step))
            }
            Indexable::Dict => {
                let k = self.dict_key(key)?;
                let found = match self.payload(obj) {
                    Some(ObjPayload::Dict(d)) => d.get(&k),
                    _ => None,
                };
                match found {
                    Some(v) => Ok(v),
                    None => Err(self.key_error(key)),
                }
            }
            Indexable::Other => match self.call_magic(obj, "__getitem__", &[key])? {
                Some(v) => Ok(v),
                None => {
                    let tn = self.type_name(obj);
                    Err(self.type_error(format!("'{tn}' object is not subscriptable")))
                }
            },
        }
    }

    pub fn setitem(&mut self, obj: Value, key: Value, value: Value) -> PyResult<()> {
        match obj.ty() {
            tp::LIST if key.ty() == tp::SLICE => self.set_list_slice(obj, key, value),
            tp::LIST => {
                let len = match self.payload(obj) {
                    Some(ObjPayload::List(items)) => items.len(),
                    _ => 0,
                };
                let i = self.index_operand(key, "list")?;
                let i = self.normalize_index(i, len, "list assignment")?;
                if let Some(ObjPayload::List(items)) = self.payload_mut(obj) {
                    items[i] = value;
                }
                Ok(())
            }
            tp::DICT => self.dict_set(obj, key, value),
            _ => match self.call_magic(obj, "__setitem__", &[key, value])? {
                Some(_) => Ok(()),
                None => {
                    let tn = self.type_name(obj);
                    Err(self.type_error(format!(
                        "'{tn}' object does not support item assignment"
                    )))
                }
            },
        }
    }

    fn set_list_slice(&mut self, list: Value, key: Value, value: Value) -> PyResult<()> {
        let len = match self.payload(list) {
            Some(ObjPayload::List(items)) => items.len(),
            _ => 0,
        };
        let (start, stop, step) = self.slice_bounds(key)?;
        let values = self.collect_values(value)?;
        if step == 1 {
            let clamp = |v: Option<i64>, default: usize| match v {
                None => default,
                Some(v) if v < 0 => (v + len as i64).max(0) as usize,
                Some(v) => (v as usize).min(len),
            };
            let lo = clamp(start, 0);
            let hi = clamp(stop, len).max(lo);
            if let Some(ObjPayload::List(items)) = self.payload_mut(list) {
                items.splice(lo..hi, values);
            }
            return Ok(());
        }
        let positions = super::collection::slice_positions(start, stop, step, len);
        if positions.len() != values.len() {
            return Err(self.value_error(format!(
                "attempt to assign sequence of size {} to extended slice of size {}",
                values.len(),
                positions.len()
            )));
        }
        if let Some(ObjPayload::List(items)) = self.payload_mut(list) {
            for (i, v) in positions.into_iter().zip(values) {
                items[i] = v;
            }
        }
        Ok(())
    }

    pub(crate) fn delitem(&mut self, obj: Value, key: Value) -> PyResult<()> {
        match obj.ty() {
            tp::LIST => {
                let len = match self.payload(obj) {
                    Some(ObjPayload::List(items)) => items.len(),
                    _ => 0,
                };
                let mut doomed = if key.ty() == tp::SLICE {
                    self.slice_indices(key, len)?
                } else {
                    let i = self.index_operand(key, "list")?;
                    vec![self.normalize_index(i, len, "list assignment")?]
                };
                doomed.sort_unstable_by(|a, b| b.cmp(a));
                if let Some(ObjPayload::List(items)) = self.payload_mut(obj) {
                    for i in doomed {
                        items.remove(i);
                    }
                }
                Ok(())
            }
            tp::DICT => {
                let k = self.dict_key(key)?;
                let removed = match self.payload_mut(obj) {
                    Some(ObjPayload::Dict(d)) => d.remove(&k),
                    _ => None,
                };
                match removed {
                    Some(_) => Ok(()),
                    None => Err(self.key_error(key)),
                }
            }
            _ => match self.call_magic(obj, "__delitem__", &[key])? {
                Some(_) => Ok(()),
                None => {
                    let tn = self.type_name(obj);
                    Err(self.type_error(format!("'{tn}' object doesn't support item deletion")))
                }
            },
        }
    }
}
