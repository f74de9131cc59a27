use std::collections::HashMap;

use pk_core::{ArenaConfig, FixedPool, MultiPool};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

#[derive(Clone, Debug)]
enum Step {
    Alloc(usize),
    Free(usize),
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    proptest::collection::vec(
        prop_oneof![
            3 => (1usize..300).prop_map(Step::Alloc),
            2 => any::<usize>().prop_map(Step::Free),
        ],
        1..400,
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32, max_shrink_iters: 200, .. ProptestConfig::default()
    })]

    #[test]
    fn multi_pool_live_blocks_never_alias(ops in steps()) {
        let mut pool = MultiPool::new(ArenaConfig {
            arena_bytes: 512,
            min_arenas: 1,
            ..ArenaConfig::default()
        });
        // address -> (size, stamp)
        let mut live: HashMap<usize, (usize, u8)> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();
        let mut stamp = 0u8;
        for op in ops {
            match op {
                Step::Alloc(size) => {
                    let p = pool.alloc(size);
                    let addr = p.as_ptr() as usize;
                    for (&other, &(other_size, _)) in &live {
                        prop_assert!(addr + size <= other || other + other_size <= addr);
                    }
                    stamp = stamp.wrapping_add(1);
                    unsafe { std::ptr::write_bytes(p.as_ptr(), stamp, size) };
                    live.insert(addr, (size, stamp));
                    order.push(addr);
                }
                Step::Free(pick) => {
                    if order.is_empty() {
                        continue;
                    }
                    let addr = order.swap_remove(pick % order.len());
                    let (size, st) = live.remove(&addr).unwrap();
                    let bytes = unsafe { std::slice::from_raw_parts(addr as *const u8, size) };
                    prop_assert!(bytes.iter().all(|&b| b == st));
                    let p = std::ptr::NonNull::new(addr as *mut u8).unwrap();
                    unsafe { pool.dealloc(p) };
                }
            }
        }
        prop_assert_eq!(pool.stats().live_blocks + pool.stats().big_allocs, live.len());
        for addr in order {
            unsafe { pool.dealloc(std::ptr::NonNull::new(addr as *mut u8).unwrap()) };
        }
        pool.shrink_to_fit();
        prop_assert!(pool.stats().arenas <= 1);
    }

    #[test]
    fn fixed_pool_live_blocks_never_alias(ops in steps()) {
        let pool: FixedPool<[u64; 3]> = FixedPool::new(16);
        let mut live = Vec::new();
        let mut next = 0u64;
        for op in ops {
            match op {
                Step::Alloc(_) => {
                    next += 1;
                    live.push((pool.alloc([next; 3]), next));
                }
                Step::Free(pick) => {
                    if !live.is_empty() {
                        let (b, v) = live.swap_remove(pick % live.len());
                        prop_assert_eq!(*b, [v; 3]);
                    }
                }
            }
            for (b, v) in &live {
                prop_assert_eq!(**b, [*v; 3]);
            }
        }
        let spilled = live.len().saturating_sub(16);
        prop_assert!(pool.exceeded_bytes() >= spilled * 24);
    }
}
