//! Hash containers: attribute dictionaries, `dict` and `set`.
//!
//! Keys are reduced to a `DictKey` so that `1`, `1.0` and `True` collide the way the language
//! requires; the original key value is kept next to the entry for iteration.
use std::rc::Rc;

use indexmap::IndexMap;

use super::heap::ObjectId;
use super::value::{TypeId, Value};

/// Name -> value map used for module globals, class namespaces, instance attributes and
/// closures. Insertion order is preserved.
pub type NameDict = IndexMap<Rc<str>, Value, ahash::RandomState>;

pub fn new_name_dict() -> NameDict {
    NameDict::with_hasher(ahash::RandomState::new())
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DictKey {
    None,
    Int(i64),
    /// Non-integral floats by bit pattern; integral ones fold into `Int`.
    Float(u64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Tuple(Box<[DictKey]>),
    /// Payload-less singletons other than `None`.
    Singleton(TypeId),
    /// Everything hashed by identity.
    Id(ObjectId),
}

impl DictKey {
    pub fn from_float(v: f64) -> DictKey {
        if v.fract() == 0.0 && v.is_finite() && v.abs() < 9.0e18 {
            DictKey::Int(v as i64)
        } else {
            DictKey::Float(v.to_bits())
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Dict {
    map: IndexMap<DictKey, (Value, Value), ahash::RandomState>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, key: &DictKey) -> Option<Value> {
        self.map.get(key).map(|(_, v)| *v)
    }

    pub fn contains(&self, key: &DictKey) -> bool {
        self.map.contains_key(key)
    }

    /// Keeps the first-inserted key object when overwriting, like the language does.
    pub fn insert(&mut self, key: DictKey, key_value: Value, value: Value) {
        match self.map.get_mut(&key) {
            Some(entry) => entry.1 = value,
            None => {
                self.map.insert(key, (key_value, value));
            }
        }
    }

    pub fn remove(&mut self, key: &DictKey) -> Option<Value> {
        self.map.shift_remove(key).map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = Value> + '_ {
        self.map.values().map(|(k, _)| *k)
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.map.values().map(|(_, v)| *v)
    }

    pub fn items(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.map.values().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&DictKey, Value, Value)> + '_ {
        self.map.iter().map(|(k, (kv, v))| (k, *kv, *v))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Set {
    map: IndexMap<DictKey, Value, ahash::RandomState>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &DictKey) -> bool {
        self.map.contains_key(key)
    }

    /// Returns false when the key was already present.
    pub fn insert(&mut self, key: DictKey, value: Value) -> bool {
        if self.map.contains_key(&key) {
            return false;
        }
        self.map.insert(key, value);
        true
    }

    pub fn remove(&mut self, key: &DictKey) -> bool {
        self.map.shift_remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.map.values().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&DictKey, Value)> + '_ {
        self.map.iter().map(|(k, v)| (k, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_keys_fold_together() {
        assert_eq!(DictKey::from_float(1.0), DictKey::Int(1));
        assert_ne!(DictKey::from_float(1.5), DictKey::Int(1));

        let mut d = Dict::new();
        d.insert(DictKey::Int(1), Value::int(1), Value::int(10));
        d.insert(DictKey::from_float(1.0), Value::float(1.0), Value::int(20));
        assert_eq!(d.len(), 1);
        assert_eq!(d.get(&DictKey::Int(1)), Some(Value::int(20)));
        // the original key object survives the overwrite
        assert_eq!(d.keys().next(), Some(Value::int(1)));
    }

    #[test]
    fn removal_keeps_insertion_order() {
        let mut d = Dict::new();
        for i in 0..4 {
            d.insert(DictKey::Int(i), Value::int(i), Value::NONE);
        }
        d.remove(&DictKey::Int(1));
        let keys: Vec<_> = d.keys().filter_map(Value::as_int).collect();
        assert_eq!(keys, vec![0, 2, 3]);
    }
}
