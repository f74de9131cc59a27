use crate::builtins::{arg_int, check_argc, check_self, kwargs_only};
use crate::core::{Args, ObjPayload, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

pub(super) fn register(vm: &mut Vm) {
    vm.def_method(tp::LIST, "append", 2, list_append);
    vm.def_method(tp::LIST, "extend", 2, list_extend);
    vm.def_method(tp::LIST, "insert", 3, list_insert);
    vm.def_method(tp::LIST, "pop", -1, list_pop);
    vm.def_method(tp::LIST, "remove", 2, list_remove);
    vm.def_method(tp::LIST, "index", 2, seq_index);
    vm.def_method(tp::LIST, "count", 2, seq_count);
    vm.def_method(tp::LIST, "reverse", 1, list_reverse);
    vm.def_method_kw(tp::LIST, "sort", list_sort);
    vm.def_method(tp::LIST, "clear", 1, list_clear);
    vm.def_method(tp::LIST, "copy", 1, list_copy);
    vm.def_method(tp::TUPLE, "index", 2, seq_index);
    vm.def_method(tp::TUPLE, "count", 2, seq_count);
}

fn with_list<T>(vm: &mut Vm, list: Value, f: impl FnOnce(&mut Vec<Value>) -> T) -> Option<T> {
    match vm.payload_mut(list) {
        Some(ObjPayload::List(items)) => Some(f(items)),
        _ => None,
    }
}

fn list_append(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::LIST, "append")?;
    let v = args.at(1);
    with_list(vm, this, |items| items.push(v));
    Ok(Value::NONE)
}

fn list_extend(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::LIST, "extend")?;
    let more = vm.collect_values(args.at(1))?;
    with_list(vm, this, |items| items.extend(more));
    Ok(Value::NONE)
}

/// Out-of-range positions clamp to the ends.
fn list_insert(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::LIST, "insert")?;
    let index = arg_int(vm, args.at(1))?;
    let v = args.at(2);
    with_list(vm, this, |items| {
        let len = items.len() as i64;
        let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
        items.insert(at as usize, v);
    });
    Ok(Value::NONE)
}

fn list_pop(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 2, "pop")?;
    let this = check_self(vm, args, tp::LIST, "pop")?;
    let index = match args.get(1) {
        Some(v) => arg_int(vm, v)?,
        None => -1,
    };
    let len = with_list(vm, this, |items| items.len()).unwrap_or(0);
    if len == 0 {
        return Err(vm.index_error("pop from empty list"));
    }
    let at = vm.normalize_index(index, len, "pop")?;
    Ok(with_list(vm, this, |items| items.remove(at)).unwrap_or(Value::NONE))
}

/// Position of the first item equal to `needle`. Comparisons may run scripted code, so the
/// items are re-read on every step.
fn position_of(vm: &mut Vm, seq: Value, needle: Value) -> PyResult<Option<usize>> {
    let mut i = 0;
    while let Some(item) = item_at(vm, seq, i) {
        if item.is(needle) || vm.py_eq(item, needle)? {
            return Ok(Some(i));
        }
        i += 1;
    }
    Ok(None)
}

fn item_at(vm: &Vm, seq: Value, i: usize) -> Option<Value> {
    match vm.payload(seq)? {
        ObjPayload::List(items) => items.get(i).copied(),
        ObjPayload::Tuple(items) => items.get(i).copied(),
        _ => None,
    }
}

fn list_remove(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::LIST, "remove")?;
    match position_of(vm, this, args.at(1))? {
        Some(i) => {
            with_list(vm, this, |items| {
                if i < items.len() {
                    items.remove(i);
                }
            });
            Ok(Value::NONE)
        }
        None => Err(vm.value_error("list.remove(x): x not in list")),
    }
}

fn seq_index(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = args.at(0);
    if !matches!(this.ty(), tp::LIST | tp::TUPLE) {
        check_self(vm, args, tp::LIST, "index")?;
    }
    match position_of(vm, this, args.at(1))? {
        Some(i) => Ok(Value::int(i as i64)),
        None => {
            let tn = vm.type_name(this);
            Err(vm.value_error(format!("{tn}.index(x): x not in {tn}")))
        }
    }
}

fn seq_count(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = args.at(0);
    if !matches!(this.ty(), tp::LIST | tp::TUPLE) {
        check_self(vm, args, tp::LIST, "count")?;
    }
    let needle = args.at(1);
    let mut n = 0;
    let mut i = 0;
    while let Some(item) = item_at(vm, this, i) {
        if item.is(needle) || vm.py_eq(item, needle)? {
            n += 1;
        }
        i += 1;
    }
    Ok(Value::int(n))
}

fn list_reverse(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::LIST, "reverse")?;
    with_list(vm, this, |items| items.reverse());
    Ok(Value::NONE)
}

fn list_sort(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 1, "sort")?;
    kwargs_only(vm, args, &["key", "reverse"], "sort")?;
    let this = check_self(vm, args, tp::LIST, "sort")?;
    let key = args.kwarg("key").filter(|k| !k.is_none());
    let reverse = match args.kwarg("reverse") {
        Some(r) => vm.py_bool(r)?,
        None => false,
    };
    let mut items = vm.seq_items(this).unwrap_or_default();
    vm.sort_values(&mut items, key, reverse)?;
    with_list(vm, this, |dst| *dst = items);
    Ok(Value::NONE)
}

fn list_clear(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::LIST, "clear")?;
    with_list(vm, this, |items| items.clear());
    Ok(Value::NONE)
}

fn list_copy(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let this = check_self(vm, args, tp::LIST, "copy")?;
    let items = vm.seq_items(this).unwrap_or_default();
    Ok(vm.new_list(items))
}
