//! Size-classed arena pool.
//!
//! Requests are rounded up to a multiple of the granularity and served from arenas of equal
//! blocks. Each class keeps arenas with free blocks apart from full ones so allocation always
//! pops from a partially free arena in O(1). A 16-byte header in front of every block records
//! the owning arena (or, for oversized requests, the allocation size).
use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use crate::ArenaConfig;

const HEADER: usize = 16;
const ALIGN: usize = 16;

struct Arena {
    data: NonNull<u8>,
    layout: Layout,
    class: usize,
    block_size: usize,
    block_count: usize,
    unused: Vec<u16>,
    full: bool,
    /// Position inside the class list it currently sits in.
    slot: usize,
}

struct SizeClass {
    block_size: usize,
    block_count: usize,
    available: Vec<NonNull<Arena>>,
    full: Vec<NonNull<Arena>>,
}

impl SizeClass {
    fn arena_count(&self) -> usize {
        self.available.len() + self.full.len()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub arenas: usize,
    pub full_arenas: usize,
    pub live_blocks: usize,
    pub big_allocs: usize,
}

pub struct MultiPool {
    config: ArenaConfig,
    classes: Vec<SizeClass>,
    big_allocs: usize,
}

impl MultiPool {
    pub fn new(config: ArenaConfig) -> Self {
        let classes = (0..config.class_count)
            .map(|i| {
                let block_size = config.granularity * (i + 1);
                let block_count = (config.arena_bytes / block_size).clamp(1, u16::MAX as usize);
                SizeClass {
                    block_size,
                    block_count,
                    available: Vec::new(),
                    full: Vec::new(),
                }
            })
            .collect();
        Self {
            config,
            classes,
            big_allocs: 0,
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Allocates `size` bytes aligned to 16. Never fails short of global allocator failure.
    pub fn alloc(&mut self, size: usize) -> NonNull<u8> {
        let total = size + HEADER;
        if total > self.config.max_pooled_size() {
            return self.alloc_big(total);
        }
        let ci = self.config.class_index(total);
        let class = &mut self.classes[ci];
        if class.available.is_empty() {
            let arena = new_arena(ci, class.block_size, class.block_count);
            // SAFETY: freshly boxed arena.
            unsafe { (*arena.as_ptr()).slot = 0 };
            class.available.push(arena);
            tracing::debug!(
                target: "pk::pool",
                class = ci,
                block_size = class.block_size,
                arenas = class.arena_count(),
                "new arena"
            );
        }
        let Some(&arena_ptr) = class.available.last() else {
            return self.alloc_big(total);
        };
        // SAFETY: arenas in the class lists are live until `free_arena`.
        let arena = unsafe { &mut *arena_ptr.as_ptr() };
        let Some(idx) = arena.unused.pop() else {
            return self.alloc_big(total);
        };
        if arena.unused.is_empty() {
            class.available.pop();
            arena.full = true;
            arena.slot = class.full.len();
            class.full.push(arena_ptr);
        }
        // SAFETY: `idx < block_count`; the header fits inside the block.
        unsafe {
            let block = arena.data.add(idx as usize * arena.block_size);
            ptr::write(block.as_ptr().cast::<*mut Arena>(), arena_ptr.as_ptr());
            block.add(HEADER)
        }
    }

    fn alloc_big(&mut self, total: usize) -> NonNull<u8> {
        let layout = match Layout::from_size_align(total, ALIGN) {
            Ok(l) => l,
            Err(_) => alloc::handle_alloc_error(Layout::new::<u8>()),
        };
        // SAFETY: non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(block) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout)
        };
        self.big_allocs += 1;
        // SAFETY: header lies inside the allocation.
        unsafe {
            ptr::write(block.as_ptr().cast::<*mut Arena>(), ptr::null_mut());
            ptr::write(block.as_ptr().add(8).cast::<usize>(), total);
            block.add(HEADER)
        }
    }

    /// Returns memory obtained from `alloc`.
    ///
    /// # Safety
    /// `p` must come from `self.alloc` and not have been released already.
    pub unsafe fn dealloc(&mut self, p: NonNull<u8>) {
        // SAFETY: every pointer handed out sits `HEADER` bytes past its block start.
        unsafe {
            let block = p.sub(HEADER);
            let arena_ptr = ptr::read(block.as_ptr().cast::<*mut Arena>());
            let Some(arena_ptr) = NonNull::new(arena_ptr) else {
                let total = ptr::read(block.as_ptr().add(8).cast::<usize>());
                alloc::dealloc(block.as_ptr(), Layout::from_size_align_unchecked(total, ALIGN));
                self.big_allocs -= 1;
                return;
            };
            let arena = &mut *arena_ptr.as_ptr();
            let idx = (block.as_ptr() as usize - arena.data.as_ptr() as usize) / arena.block_size;
            arena.unused.push(idx as u16);
            if arena.full {
                let class = &mut self.classes[arena.class];
                let slot = arena.slot;
                class.full.swap_remove(slot);
                if let Some(moved) = class.full.get(slot) {
                    (*moved.as_ptr()).slot = slot;
                }
                arena.full = false;
                arena.slot = class.available.len();
                class.available.push(arena_ptr);
            }
        }
    }

    /// Releases completely unused arenas while more than `min_arenas` exist.
    pub fn shrink_to_fit(&mut self) -> usize {
        let mut total: usize = self.classes.iter().map(SizeClass::arena_count).sum();
        let mut released = 0;
        for class in &mut self.classes {
            let mut i = 0;
            while i < class.available.len() {
                if total <= self.config.min_arenas {
                    break;
                }
                let arena_ptr = class.available[i];
                // SAFETY: live arena owned by this class.
                let empty = unsafe { (*arena_ptr.as_ptr()).unused.len() == class.block_count };
                if !empty {
                    i += 1;
                    continue;
                }
                class.available.swap_remove(i);
                if let Some(moved) = class.available.get(i) {
                    // SAFETY: live arena.
                    unsafe { (*moved.as_ptr()).slot = i };
                }
                // SAFETY: no block of this arena is handed out.
                unsafe { free_arena(arena_ptr) };
                total -= 1;
                released += 1;
            }
        }
        if released > 0 {
            tracing::debug!(target: "pk::pool", released, remaining = total, "arenas released");
        }
        released
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            big_allocs: self.big_allocs,
            ..PoolStats::default()
        };
        for class in &self.classes {
            stats.arenas += class.arena_count();
            stats.full_arenas += class.full.len();
            for arena in class.available.iter().chain(class.full.iter()) {
                // SAFETY: live arena.
                let a = unsafe { &*arena.as_ptr() };
                stats.live_blocks += a.block_count - a.unused.len();
            }
        }
        stats
    }
}

impl Default for MultiPool {
    fn default() -> Self {
        Self::new(ArenaConfig::default())
    }
}

impl Drop for MultiPool {
    fn drop(&mut self) {
        for class in &mut self.classes {
            for arena in class.available.drain(..).chain(class.full.drain(..)) {
                // SAFETY: the pool owns every arena; outstanding blocks die with it.
                unsafe { free_arena(arena) };
            }
        }
    }
}

fn new_arena(class: usize, block_size: usize, block_count: usize) -> NonNull<Arena> {
    let layout = match Layout::from_size_align(block_size * block_count, ALIGN) {
        Ok(l) => l,
        Err(_) => alloc::handle_alloc_error(Layout::new::<u8>()),
    };
    // SAFETY: non-zero size.
    let raw = unsafe { alloc::alloc(layout) };
    let Some(data) = NonNull::new(raw) else {
        alloc::handle_alloc_error(layout)
    };
    let arena = Box::new(Arena {
        data,
        layout,
        class,
        block_size,
        block_count,
        unused: (0..block_count as u16).rev().collect(),
        full: false,
        slot: 0,
    });
    NonNull::from(Box::leak(arena))
}

/// # Safety
/// `arena` must come from `new_arena` and be freed once.
unsafe fn free_arena(arena: NonNull<Arena>) {
    // SAFETY: reclaims the box leaked in `new_arena`.
    unsafe {
        let arena = Box::from_raw(arena.as_ptr());
        alloc::dealloc(arena.data.as_ptr(), arena.layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> ArenaConfig {
        ArenaConfig {
            arena_bytes: 256,
            min_arenas: 1,
            ..ArenaConfig::default()
        }
    }

    #[test]
    fn size_classes_and_headers() {
        let mut pool = MultiPool::new(small());
        let a = pool.alloc(10);
        let b = pool.alloc(100);
        assert_eq!(a.as_ptr() as usize % 16, 0);
        assert_eq!(b.as_ptr() as usize % 16, 0);
        assert_eq!(pool.stats().arenas, 2);
        unsafe {
            pool.dealloc(a);
            pool.dealloc(b);
        }
        assert_eq!(pool.stats().live_blocks, 0);
    }

    #[test]
    fn arenas_move_between_lists() {
        // 32-byte class, 256-byte arenas: 8 blocks each.
        let mut pool = MultiPool::new(small());
        let blocks: Vec<_> = (0..8).map(|_| pool.alloc(8)).collect();
        assert_eq!(pool.stats().full_arenas, 1);
        let extra = pool.alloc(8);
        assert_eq!(pool.stats().arenas, 2);
        unsafe { pool.dealloc(blocks[3]) };
        assert_eq!(pool.stats().full_arenas, 0);
        for (i, b) in blocks.into_iter().enumerate() {
            if i != 3 {
                unsafe { pool.dealloc(b) };
            }
        }
        unsafe { pool.dealloc(extra) };
        assert_eq!(pool.shrink_to_fit(), 1);
        assert_eq!(pool.stats().arenas, 1);
    }

    #[test]
    fn oversized_requests_bypass_arenas() {
        let mut pool = MultiPool::new(small());
        let big = pool.alloc(4096);
        assert_eq!(pool.stats().big_allocs, 1);
        assert_eq!(pool.stats().arenas, 0);
        unsafe { pool.dealloc(big) };
        assert_eq!(pool.stats().big_allocs, 0);
    }
}
