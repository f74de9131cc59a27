//! Container constructors and the iteration helpers built on them.
use crate::core::object::{IterState, RangeObj};
use crate::core::{Args, Dict, Value, tp};
use crate::errors::PyResult;
use crate::vm::Vm;

use super::common::{arg_int, check_argc, kwargs_only};

pub(super) fn register(vm: &mut Vm) {
    vm.set_ctor(tp::LIST, builtin_list);
    vm.set_ctor(tp::TUPLE, builtin_tuple);
    vm.set_ctor(tp::DICT, builtin_dict);
    vm.set_ctor(tp::SET, builtin_set);
    vm.set_ctor(tp::RANGE, builtin_range);
    vm.def_builtin("enumerate", -1, builtin_enumerate);
    vm.def_builtin("zip", -1, builtin_zip);
    vm.def_builtin("reversed", 1, builtin_reversed);
    vm.def_builtin_kw("sorted", builtin_sorted);
    vm.def_builtin("any", 1, builtin_any);
    vm.def_builtin("all", 1, builtin_all);
}

impl Vm {
    /// Stable merge sort over `items`, comparing `key(item)` (or the item) with `<`. Comparisons
    /// may run scripted code and fail, so the standard library sort is not usable here.
    pub(crate) fn sort_values(
        &mut self,
        items: &mut Vec<Value>,
        key: Option<Value>,
        reverse: bool,
    ) -> PyResult<()> {
        self.with_gc_locked(|vm| {
            let keys = match key {
                Some(f) => {
                    let mut keys = Vec::with_capacity(items.len());
                    for &x in items.iter() {
                        keys.push(vm.call(f, &[x])?);
                    }
                    keys
                }
                None => items.clone(),
            };
            let order = merge_order(vm, &keys, reverse)?;
            let sorted: Vec<Value> = order.iter().map(|&i| items[i]).collect();
            *items = sorted;
            Ok(())
        })
    }
}

/// Bottom-up merge sort of indices into `keys`. An element from the right run only moves ahead
/// of the left one when it is strictly smaller (strictly larger when reversed).
fn merge_order(vm: &mut Vm, keys: &[Value], reverse: bool) -> PyResult<Vec<usize>> {
    let n = keys.len();
    let mut idx: Vec<usize> = (0..n).collect();
    let mut buf = vec![0usize; n];
    let mut width = 1;
    while width < n {
        let mut lo = 0;
        while lo < n {
            let mid = (lo + width).min(n);
            let hi = (lo + 2 * width).min(n);
            let (mut i, mut j, mut k) = (lo, mid, lo);
            while i < mid && j < hi {
                let (left, right) = (keys[idx[i]], keys[idx[j]]);
                let right_first = if reverse {
                    vm.py_lt(left, right)?
                } else {
                    vm.py_lt(right, left)?
                };
                if right_first {
                    buf[k] = idx[j];
                    j += 1;
                } else {
                    buf[k] = idx[i];
                    i += 1;
                }
                k += 1;
            }
            let rest_left = mid - i;
            buf[k..k + rest_left].copy_from_slice(&idx[i..mid]);
            k += rest_left;
            buf[k..hi].copy_from_slice(&idx[j..hi]);
            lo = hi;
        }
        std::mem::swap(&mut idx, &mut buf);
        width *= 2;
    }
    Ok(idx)
}

fn builtin_list(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 1, "list")?;
    let items = match args.get(0) {
        Some(v) => vm.collect_values(v)?,
        None => Vec::new(),
    };
    Ok(vm.new_list(items))
}

fn builtin_tuple(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 1, "tuple")?;
    let items = match args.get(0) {
        Some(v) if v.ty() == tp::TUPLE => return Ok(v),
        Some(v) => vm.collect_values(v)?,
        None => Vec::new(),
    };
    Ok(vm.new_tuple(items))
}

fn builtin_set(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 1, "set")?;
    let items = match args.get(0) {
        Some(v) => vm.collect_values(v)?,
        None => Vec::new(),
    };
    vm.build_set(&items)
}

fn fill_dict(vm: &mut Vm, d: Value, args: &Args) -> PyResult<()> {
    if let Some(src) = args.get(0) {
        if src.ty() == tp::DICT {
            for (k, v) in vm.mapping_items(src)? {
                vm.dict_set(d, k, v)?;
            }
        } else {
            for item in vm.collect_values(src)? {
                let (k, v) = vm.pair_of(item)?;
                vm.dict_set(d, k, v)?;
            }
        }
    }
    for (k, v) in &args.kw {
        let key = vm.new_str_rc(k.clone());
        vm.dict_set(d, key, *v)?;
    }
    Ok(())
}

fn builtin_dict(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 0, 1, "dict")?;
    let d = vm.new_dict(Dict::new());
    vm.stack.push(d);
    let r = fill_dict(vm, d, args);
    vm.stack.pop();
    r.map(|_| d)
}

fn builtin_range(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 3, "range")?;
    kwargs_only(vm, args, &[], "range")?;
    let mut nums = [0i64, 0, 1];
    for (i, v) in args.pos.iter().enumerate() {
        nums[i] = arg_int(vm, *v)?;
    }
    let (start, stop, step) = match args.len() {
        1 => (0, nums[0], 1),
        _ => (nums[0], nums[1], nums[2]),
    };
    if step == 0 {
        return Err(vm.value_error("range() arg 3 must not be zero"));
    }
    Ok(vm.new_range(RangeObj { start, stop, step }))
}

fn builtin_enumerate(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 2, "enumerate")?;
    let count = match args.get(1) {
        Some(v) => arg_int(vm, v)?,
        None => 0,
    };
    let inner = vm.get_iter(args.at(0))?;
    Ok(vm.new_iter(IterState::Enumerate { inner, count }))
}

fn builtin_zip(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    vm.with_gc_locked(|vm| {
        let mut inners = Vec::with_capacity(args.len());
        for &v in &args.pos {
            inners.push(vm.get_iter(v)?);
        }
        Ok(vm.new_iter(IterState::Zip {
            inners: inners.into_boxed_slice(),
        }))
    })
}

fn builtin_reversed(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    let mut items = vm.collect_values(args.at(0))?;
    items.reverse();
    Ok(vm.new_iter(IterState::Values { items, index: 0 }))
}

fn builtin_sorted(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    check_argc(vm, args, 1, 1, "sorted")?;
    kwargs_only(vm, args, &["key", "reverse"], "sorted")?;
    let key = args.kwarg("key").filter(|k| !k.is_none());
    let reverse = match args.kwarg("reverse") {
        Some(r) => vm.py_bool(r)?,
        None => false,
    };
    let mut items = vm.collect_values(args.at(0))?;
    vm.sort_values(&mut items, key, reverse)?;
    Ok(vm.new_list(items))
}

/// Shared loop of `any` and `all`: stops at the first item whose truth equals `stop_on`.
fn find_truth(vm: &mut Vm, iterable: Value, stop_on: bool) -> PyResult<bool> {
    let it = vm.get_iter(iterable)?;
    vm.stack.push(it);
    let found = loop {
        match vm.next_value(it) {
            Ok(Some(x)) => match vm.py_bool(x) {
                Ok(b) if b == stop_on => break Ok(true),
                Ok(_) => {}
                Err(e) => break Err(e),
            },
            Ok(None) => break Ok(false),
            Err(e) => break Err(e),
        }
    };
    vm.stack.pop();
    found
}

fn builtin_any(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    Ok(Value::bool(find_truth(vm, args.at(0), true)?))
}

fn builtin_all(vm: &mut Vm, args: &Args) -> PyResult<Value> {
    Ok(Value::bool(!find_truth(vm, args.at(0), false)?))
}
