//! `dict` and `set` methods.
use crate::builtins::{check_argc, check_self};
use crate::core::{Args, ObjPayload, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

pub(super) fn register(vm: &mut Vm) {
    vm.def_method(tp::DICT, "keys", 1, dict_keys);
    vm.def_method(tp::DICT, "values", 1, dict_values);
    vm.def_method(tp::DICT, "items", 1, dict_items);
    vm.def_method(tp::DICT, "get", -1, dict_get);
    vm.def_method(tp::DICT, "pop", -1, dict_pop);
    vm.def_method(tp::DICT, "setdefault", -1, dict_setdefault);
    vm.def_method_kw(tp::DICT, "update", dict_update);
    vm.def_method(tp::DICT, "clear", 1, dict_clear);
    vm.def_method(tp::DICT, "copy", 1, dict_copy);

    vm.def_method(tp::SET, "add", 2, set_add);
    vm.def_method(tp::SET, "remove", 2, set_remove);
    vm.def_method(tp::SET, "discard", 2, set_discard);
    vm.def_method(tp::SET, "update", 2, set_update);
    vm.def_method(tp::SET, "clear", 1, set_clear);
    vm.def_method(tp::SET, "copy", 1, set_copy);
}

// Views are materialised as lists.

fn dict_keys(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::DICT, "keys")?;
    let keys = match vm.payload(this) {
        Some(ObjPayload::Dict(d)) => d.keys().collect(),
        _ => Vec::new(),
    };
    Ok(vm.new_list(keys))
}

fn dict_values(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::DICT, "values")?;
    let values = match vm.payload(this) {
        Some(ObjPayload::Dict(d)) => d.values().collect(),
        _ => Vec::new(),
    };
    Ok(vm.new_list(values))
}

fn dict_items(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::DICT, "items")?;
    let pairs = vm.mapping_items(this)?;
    let list = vm.new_list(Vec::with_capacity(pairs.len()));
    for (k, v) in pairs {
        let pair = vm.new_tuple(vec![k, v]);
        if let Some(ObjPayload::List(items)) = vm.payload_mut(list) {
            items.push(pair);
        }
    }
    Ok(list)
}

fn dict_lookup(vm: &mut Vm, this: Value, k: Value) -> PyResult<Option<Value>> {
    let key = vm.dict_key(k)?;
    Ok(match vm.payload(this) {
        Some(ObjPayload::Dict(d)) => d.get(&key),
        _ => None,
    })
}

fn dict_get(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 2, 3, "get")?;
    let this = check_self(vm, args, tp::DICT, "get")?;
    Ok(dict_lookup(vm, this, args.at(1))?.unwrap_or(args.at(2)))
}

fn dict_pop(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 2, 3, "pop")?;
    let this = check_self(vm, args, tp::DICT, "pop")?;
    let k = args.at(1);
    let key = vm.dict_key(k)?;
    let removed = match vm.payload_mut(this) {
        Some(ObjPayload::Dict(d)) => d.remove(&key),
        _ => None,
    };
    match (removed, args.get(2)) {
        (Some(v), _) => Ok(v),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(vm.key_error(k)),
    }
}

fn dict_setdefault(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 2, 3, "setdefault")?;
    let this = check_self(vm, args, tp::DICT, "setdefault")?;
    if let Some(v) = dict_lookup(vm, this, args.at(1))? {
        return Ok(v);
    }
    let default = args.at(2);
    vm.dict_set(this, args.at(1), default)?;
    Ok(default)
}

fn dict_update(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 2, "update")?;
    let this = check_self(vm, args, tp::DICT, "update")?;
    if let Some(src) = args.get(1) {
        if src.ty() == tp::DICT {
            for (k, v) in vm.mapping_items(src)? {
                vm.dict_set(this, k, v)?;
            }
        } else {
            for item in vm.collect_values(src)? {
                let (k, v) = vm.pair_of(item)?;
                vm.dict_set(this, k, v)?;
            }
        }
    }
    for (k, v) in &args.kw {
        let key = vm.new_str_rc(k.clone());
        vm.dict_set(this, key, *v)?;
    }
    Ok(Value::NONE)
}

fn dict_clear(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::DICT, "clear")?;
    if let Some(ObjPayload::Dict(d)) = vm.payload_mut(this) {
        d.clear();
    }
    Ok(Value::NONE)
}

fn dict_copy(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::DICT, "copy")?;
    let copy = match vm.payload(this) {
        Some(ObjPayload::Dict(d)) => d.clone(),
        _ => Default::default(),
    };
    Ok(vm.new_dict(copy))
}

fn set_add(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::SET, "add")?;
    let v = args.at(1);
    let key = vm.dict_key(v)?;
    if let Some(ObjPayload::Set(s)) = vm.payload_mut(this) {
        s.insert(key, v);
    }
    Ok(Value::NONE)
}

fn set_take(vm: &mut Vm, args: &Args, method: &str) -> PyResult<bool> {
    let this = check_self(vm, args, tp::SET, method)?;
    let key = vm.dict_key(args.at(1))?;
    Ok(match vm.payload_mut(this) {
        Some(ObjPayload::Set(s)) => s.remove(&key),
        _ => false,
    })
}

fn set_remove(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    if set_take(vm, args, "remove")? {
        Ok(Value::NONE)
    } else {
        Err(vm.key_error(args.at(1)))
    }
}

fn set_discard(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    set_take(vm, args, "discard")?;
    Ok(Value::NONE)
}

fn set_update(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::SET, "update")?;
    for v in vm.collect_values(args.at(1))? {
        let key = vm.dict_key(v)?;
        if let Some(ObjPayload::Set(s)) = vm.payload_mut(this) {
            s.insert(key, v);
        }
    }
    Ok(Value::NONE)
}

fn set_clear(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::SET, "clear")?;
    if let Some(ObjPayload::Set(s)) = vm.payload_mut(this) {
        s.clear();
    }
    Ok(Value::NONE)
}

fn set_copy(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::SET, "copy")?;
    let copy = match vm.payload(this) {
        Some(ObjPayload::Set(s)) => s.clone(),
        _ => Default::default(),
    };
    Ok(vm.new_set(copy))
}
