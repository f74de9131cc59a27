mod common;

use common::capture_vm;
use pk_runtime::{ObjectLayout, Value, VmConfig, tp};

fn small_heap() -> VmConfig {
    VmConfig {
        gc_min_threshold: 64,
        ..VmConfig::default()
    }
}

#[test]
fn reachable_objects_survive_automatic_collections() {
    let (mut vm, out) = capture_vm(small_heap());
    vm.exec(
        r#"
def pair(i):
    return [i, str(i)]

keep = {}
for i in range(2000):
    p = pair(i)
    if i % 100 == 0:
        keep[i] = p
print(len(keep), keep[1900], keep[0][1])
"#,
        "main.py",
    )
    .unwrap();
    assert!(vm.gc_collections() > 0);
    assert_eq!(*out.borrow(), "20 [1900, '1900'] 0\n");
}

#[test]
fn explicit_collection_frees_garbage() {
    let (mut vm, out) = capture_vm(VmConfig::default());
    vm.exec("keep = [[i] for i in range(50)]\n", "main.py").unwrap();
    vm.exec("gc_collect()\n", "main.py").unwrap();
    let baseline = vm.live_objects();
    vm.exec(
        "tmp = [[i] for i in range(1000)]\ntmp = None\ngc_collect()\n",
        "main.py",
    )
    .unwrap();
    assert!(
        vm.live_objects() <= baseline + 8,
        "{} live after collection, baseline {baseline}",
        vm.live_objects()
    );
    vm.exec("print(len(keep), keep[49])\n", "main.py").unwrap();
    assert_eq!(*out.borrow(), "50 [49]\n");
}

#[test]
fn suspended_generators_keep_their_locals() {
    let (mut vm, out) = capture_vm(small_heap());
    vm.exec(
        r#"
def counter():
    items = ["x" + str(i) for i in range(3)]
    for item in items:
        yield item

g = counter()
first = next(g)
junk = [[i] for i in range(500)]
print(first, next(g), next(g), next(g, None))
"#,
        "main.py",
    )
    .unwrap();
    assert!(vm.gc_collections() > 0);
    assert_eq!(*out.borrow(), "x0 x1 x2 None\n");
}

#[test]
fn disabled_collector_only_runs_on_request() {
    let config = VmConfig {
        gc_enabled: false,
        ..small_heap()
    };
    let (mut vm, _) = capture_vm(config);
    vm.exec("for i in range(500):\n    x = str(i)\n", "main.py").unwrap();
    assert_eq!(vm.gc_collections(), 0);
    vm.exec("gc_collect()\n", "main.py").unwrap();
    assert_eq!(vm.gc_collections(), 1);
}

#[test]
fn only_the_rooted_object_survives_above_the_default_threshold() {
    let (mut vm, _) = capture_vm(VmConfig::default());
    let point = vm.new_type("Point", tp::OBJECT);
    vm.gc_collect();
    let baseline = vm.live_objects();

    let n = VmConfig::GC_MIN_THRESHOLD + 4000;
    let mut kept = None;
    for i in 0..n {
        let p = vm.new_object(point, ObjectLayout::Slots(2));
        vm.set_slot(p, 0, Value::int(i as i64));
        vm.set_slot(p, 1, Value::float(i as f64 / 2.0));
        if i == 1234 {
            kept = Some(p);
        }
    }
    let kept = kept.unwrap();
    vm.set_global("kept", kept);
    assert_eq!(vm.live_objects(), baseline + n);

    let freed = vm.gc_collect();
    assert_eq!(freed, n - 1);
    assert_eq!(vm.live_objects(), baseline + 1);
    assert_eq!(vm.slot(kept, 0), Some(Value::int(1234)));
    assert_eq!(vm.slot(kept, 1), Some(Value::float(617.0)));
    assert_eq!(vm.get_global("kept"), Some(kept));
}

#[test]
fn a_dropped_suspended_generator_is_freed_once() {
    let (mut vm, _) = capture_vm(VmConfig::default());
    vm.exec(
        r#"
def walk():
    rows = [[i] for i in range(100)]
    for r in rows:
        yield r

g = walk()
next(g)
"#,
        "main.py",
    )
    .unwrap();
    vm.gc_collect();
    let with_generator = vm.live_objects();

    vm.exec("g = None\n", "main.py").unwrap();
    let freed = vm.gc_collect();
    // the generator, its row list, the rows and the list iterator
    assert!(freed >= 103, "freed {freed}");
    assert!(vm.live_objects() + 103 <= with_generator);
    assert_eq!(vm.gc_collect(), 0);
}
