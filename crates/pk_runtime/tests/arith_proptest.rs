mod common;

use common::{capture_vm, run};
use pk_runtime::{Value, VmConfig};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

fn list_literal(xs: &[i64]) -> String {
    let parts: Vec<String> = xs.iter().map(|x| x.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48, max_shrink_iters: 100, .. ProptestConfig::default()
    })]

    #[test]
    fn floor_division_and_modulo_agree(a in -10_000i64..10_000, b in -200i64..200) {
        prop_assume!(b != 0);
        let (mut vm, _) = capture_vm(VmConfig::default());
        vm.set_global("a", Value::int(a));
        vm.set_global("b", Value::int(b));
        vm.exec("q = a // b\nr = a % b\n", "main.py").unwrap();
        let q = vm.get_global("q").and_then(Value::as_int).unwrap();
        let r = vm.get_global("r").and_then(Value::as_int).unwrap();
        let expected_q = (a as f64 / b as f64).floor() as i64;
        prop_assert_eq!(q, expected_q);
        prop_assert_eq!(q * b + r, a);
        prop_assert!(r == 0 || (r < 0) == (b < 0));
    }

    #[test]
    fn sorted_matches_a_stable_sort(xs in proptest::collection::vec(-50i64..50, 0..40)) {
        let out = run(&format!("print(sorted({}))\n", list_literal(&xs)));
        let mut expected = xs.clone();
        expected.sort();
        prop_assert_eq!(out, format!("{}\n", list_literal(&expected)));
    }
}
