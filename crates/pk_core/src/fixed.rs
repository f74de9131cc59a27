//! Fixed-size block pools.
//!
//! One contiguous buffer carved into equal blocks with a flat free list. When every block is
//! taken, allocation falls back to the global allocator and the spill is counted in
//! `exceeded_bytes`; the pool never grows.
use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::rc::Rc;

pub struct FixedMemoryPool {
    block: Layout,
    block_count: usize,
    data: Option<NonNull<u8>>,
    data_layout: Option<Layout>,
    free: Vec<u32>,
    exceeded_bytes: usize,
}

impl FixedMemoryPool {
    /// A pool of `block_count` blocks, each fitting `layout`.
    pub fn new(layout: Layout, block_count: usize) -> Self {
        let block = Layout::from_size_align(layout.size().max(1), layout.align())
            .map(|l| l.pad_to_align())
            .unwrap_or(layout);
        let data_layout = block
            .size()
            .checked_mul(block_count)
            .filter(|&n| n > 0)
            .and_then(|n| Layout::from_size_align(n, block.align()).ok());
        let data = data_layout.and_then(|l| {
            // SAFETY: `l` has non-zero size.
            NonNull::new(unsafe { alloc::alloc(l) })
        });
        let free = if data.is_some() {
            (0..block_count as u32).rev().collect()
        } else {
            Vec::new()
        };
        Self {
            block,
            block_count,
            data,
            data_layout,
            free,
            exceeded_bytes: 0,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block.size()
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Blocks currently handed out from the buffer (spilled blocks not included).
    pub fn used_blocks(&self) -> usize {
        if self.data.is_some() {
            self.block_count - self.free.len()
        } else {
            0
        }
    }

    /// Bytes currently served by the global allocator because the buffer was full.
    pub fn exceeded_bytes(&self) -> usize {
        self.exceeded_bytes
    }

    fn owns(&self, p: NonNull<u8>) -> Option<usize> {
        let base = self.data?.as_ptr() as usize;
        let addr = p.as_ptr() as usize;
        let end = base + self.block.size() * self.block_count;
        (base..end)
            .contains(&addr)
            .then(|| (addr - base) / self.block.size())
    }

    pub fn alloc(&mut self) -> NonNull<u8> {
        if let Some(base) = self.data {
            if let Some(i) = self.free.pop() {
                // SAFETY: `i < block_count`, so the offset stays inside the buffer.
                return unsafe { base.add(i as usize * self.block.size()) };
            }
        }
        self.exceeded_bytes += self.block.size();
        if self.exceeded_bytes == self.block.size() {
            tracing::debug!(
                target: "pk::pool",
                block_size = self.block.size(),
                block_count = self.block_count,
                "fixed pool exhausted; spilling to the global allocator"
            );
        }
        // SAFETY: `block` has non-zero size.
        let p = unsafe { alloc::alloc(self.block) };
        NonNull::new(p).unwrap_or_else(|| alloc::handle_alloc_error(self.block))
    }

    /// Returns a block obtained from `alloc` on this pool.
    ///
    /// # Safety
    /// `p` must come from `self.alloc()` and not have been freed already.
    pub unsafe fn dealloc(&mut self, p: NonNull<u8>) {
        match self.owns(p) {
            Some(i) => self.free.push(i as u32),
            None => {
                self.exceeded_bytes -= self.block.size();
                // SAFETY: spilled blocks were allocated with `self.block`.
                unsafe { alloc::dealloc(p.as_ptr(), self.block) };
            }
        }
    }
}

impl Drop for FixedMemoryPool {
    fn drop(&mut self) {
        if let (Some(data), Some(layout)) = (self.data, self.data_layout) {
            // SAFETY: allocated in `new` with this layout.
            unsafe { alloc::dealloc(data.as_ptr(), layout) };
        }
    }
}

impl fmt::Debug for FixedMemoryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedMemoryPool")
            .field("block_size", &self.block.size())
            .field("block_count", &self.block_count)
            .field("used", &self.used_blocks())
            .field("exceeded_bytes", &self.exceeded_bytes)
            .finish()
    }
}

/// Typed handle over a shared `FixedMemoryPool` sized for `T`.
pub struct FixedPool<T> {
    inner: Rc<RefCell<FixedMemoryPool>>,
    _marker: PhantomData<T>,
}

impl<T> Clone for FixedPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> FixedPool<T> {
    pub fn new(block_count: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(FixedMemoryPool::new(
                Layout::new::<T>(),
                block_count,
            ))),
            _marker: PhantomData,
        }
    }

    pub fn alloc(&self, value: T) -> PoolBox<T> {
        let ptr = self.inner.borrow_mut().alloc().cast::<T>();
        // SAFETY: the block is sized and aligned for `T` and currently unused.
        unsafe { ptr.as_ptr().write(value) };
        PoolBox {
            ptr,
            pool: self.inner.clone(),
        }
    }

    pub fn used_blocks(&self) -> usize {
        self.inner.borrow().used_blocks()
    }

    pub fn exceeded_bytes(&self) -> usize {
        self.inner.borrow().exceeded_bytes()
    }
}

/// Owning pointer into a `FixedPool`; the block returns to the pool on drop.
pub struct PoolBox<T> {
    ptr: NonNull<T>,
    pool: Rc<RefCell<FixedMemoryPool>>,
}

impl<T> PoolBox<T> {
    /// Moves the value out and releases the block.
    pub fn into_inner(this: Self) -> T {
        let this = ManuallyDrop::new(this);
        // SAFETY: the value is initialized and read exactly once; the block is then released
        // and `this` is never dropped.
        unsafe {
            let value = ptr::read(this.ptr.as_ptr());
            let pool = ptr::read(&this.pool);
            pool.borrow_mut().dealloc(this.ptr.cast());
            value
        }
    }

    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr()
    }
}

impl<T> Deref for PoolBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: initialized in `FixedPool::alloc`, uniquely owned by this box.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for PoolBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for PoolBox<T> {
    fn drop(&mut self) {
        // SAFETY: the value is live until here; children may return their own blocks while it
        // drops, so the pool is borrowed only afterwards.
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
            self.pool.borrow_mut().dealloc(self.ptr.cast());
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_reused() {
        let pool: FixedPool<[u64; 4]> = FixedPool::new(2);
        let a = pool.alloc([1; 4]);
        let pa = PoolBox::as_ptr(&a);
        drop(a);
        let b = pool.alloc([2; 4]);
        assert_eq!(PoolBox::as_ptr(&b), pa);
        assert_eq!(pool.used_blocks(), 1);
    }

    #[test]
    fn exhaustion_spills_and_recovers() {
        let pool: FixedPool<u64> = FixedPool::new(2);
        let a = pool.alloc(1);
        let b = pool.alloc(2);
        let c = pool.alloc(3);
        assert_eq!(pool.exceeded_bytes(), 8);
        assert_eq!((*a, *b, *c), (1, 2, 3));
        drop(c);
        assert_eq!(pool.exceeded_bytes(), 0);
        drop((a, b));
        assert_eq!(pool.used_blocks(), 0);
    }

    #[test]
    fn nested_boxes_drop_cleanly() {
        struct Node {
            _child: Option<PoolBox<Node>>,
            _label: String,
        }
        let pool: FixedPool<Node> = FixedPool::new(4);
        let leaf = pool.alloc(Node {
            _child: None,
            _label: "leaf".to_string(),
        });
        let root = pool.alloc(Node {
            _child: Some(leaf),
            _label: "root".to_string(),
        });
        assert_eq!(pool.used_blocks(), 2);
        drop(root);
        assert_eq!(pool.used_blocks(), 0);
    }

    #[test]
    fn into_inner_releases_block() {
        let pool: FixedPool<String> = FixedPool::new(1);
        let s = pool.alloc("x".to_string());
        assert_eq!(PoolBox::into_inner(s), "x");
        assert_eq!(pool.used_blocks(), 0);
    }

    #[test]
    fn zero_block_pool_always_spills() {
        let pool: FixedPool<u32> = FixedPool::new(0);
        let a = pool.alloc(7);
        assert_eq!(*a, 7);
        assert_eq!(pool.exceeded_bytes(), 4);
    }
}
