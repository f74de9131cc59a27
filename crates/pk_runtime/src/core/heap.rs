//! Managed heap and mark-sweep collection.
//!
//! Objects live in `MultiPool` blocks and are addressed by `ObjectId`, an index into the slot
//! table. Objects allocated with `no_gc` (types, built-in functions, modules) are never swept
//! but are traced as roots. Everything else joins the `generation` list and survives a collection
//! only if it was reached from a root.
use std::ptr::NonNull;

use pk_core::{ArenaConfig, MultiPool, PoolStats};

use super::object::HeapObject;

/// Handle to a heap-allocated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

pub struct ManagedHeap {
    pool: MultiPool,
    objects: Vec<Option<NonNull<HeapObject>>>,
    free_list: Vec<u32>,
    no_gc: Vec<ObjectId>,
    generation: Vec<ObjectId>,
    /// Allocations since the last collection.
    pub(crate) gc_counter: usize,
    pub(crate) gc_threshold: usize,
    min_threshold: usize,
    /// While non-zero, automatic collection is skipped.
    gc_lock: usize,
    collections: usize,
}

impl ManagedHeap {
    pub fn new(min_threshold: usize) -> Self {
        Self {
            pool: MultiPool::new(ArenaConfig::default()),
            objects: Vec::with_capacity(1024),
            free_list: Vec::new(),
            no_gc: Vec::new(),
            generation: Vec::new(),
            gc_counter: 0,
            gc_threshold: min_threshold,
            min_threshold,
            gc_lock: 0,
            collections: 0,
        }
    }

    /// Allocates a managed object. `no_gc` objects are permanent.
    pub fn alloc(&mut self, obj: HeapObject, no_gc: bool) -> ObjectId {
        let ptr = self.pool.alloc(size_of::<HeapObject>()).cast::<HeapObject>();
        // SAFETY: the block is at least `size_of::<HeapObject>()` bytes, 16-byte aligned and
        // unused.
        unsafe { ptr.as_ptr().write(obj) };

        let id = match self.free_list.pop() {
            Some(i) => {
                self.objects[i as usize] = Some(ptr);
                ObjectId(i)
            }
            None => {
                self.objects.push(Some(ptr));
                ObjectId((self.objects.len() - 1) as u32)
            }
        };
        if no_gc {
            self.no_gc.push(id);
        } else {
            self.generation.push(id);
            self.gc_counter += 1;
        }
        id
    }

    pub fn get(&self, id: ObjectId) -> &HeapObject {
        match self.objects.get(id.index()).copied().flatten() {
            // SAFETY: live slots point at initialised objects owned by this heap.
            Some(p) => unsafe { p.as_ref() },
            None => panic!("object #{} was garbage collected", id.0),
        }
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut HeapObject {
        match self.objects.get(id.index()).copied().flatten() {
            // SAFETY: as in `get`; `&mut self` makes the borrow exclusive.
            Some(mut p) => unsafe { p.as_mut() },
            None => panic!("object #{} was garbage collected", id.0),
        }
    }

    pub fn is_alive(&self, id: ObjectId) -> bool {
        matches!(self.objects.get(id.index()), Some(Some(_)))
    }

    pub fn live_objects(&self) -> usize {
        self.generation.len() + self.no_gc.len()
    }

    pub fn collections(&self) -> usize {
        self.collections
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn should_collect(&self) -> bool {
        self.gc_lock == 0 && self.gc_counter >= self.gc_threshold
    }

    pub fn lock(&mut self) {
        self.gc_lock += 1;
    }

    pub fn unlock(&mut self) {
        self.gc_lock = self.gc_lock.saturating_sub(1);
    }

    /// Marks everything reachable from `roots` and from the permanent objects.
    pub fn mark(&mut self, roots: impl IntoIterator<Item = ObjectId>) {
        let mut pending: Vec<ObjectId> = roots.into_iter().collect();
        pending.extend(self.no_gc.iter().copied());
        while let Some(id) = pending.pop() {
            let Some(Some(mut p)) = self.objects.get(id.index()).copied() else {
                continue;
            };
            // SAFETY: live object owned by this heap; no other reference is held across this
            // block.
            let obj = unsafe { p.as_mut() };
            if obj.gc_marked {
                continue;
            }
            obj.gc_marked = true;
            obj.trace(&mut pending);
        }
    }

    /// Frees unmarked `generation` objects and clears all marks. Returns the number freed.
    pub fn sweep(&mut self) -> usize {
        let before = self.generation.len();
        let mut alive = Vec::with_capacity(before);
        for id in std::mem::take(&mut self.generation) {
            let Some(Some(p)) = self.objects.get(id.index()).copied() else {
                continue;
            };
            // SAFETY: live object owned by this heap.
            let marked = unsafe { (*p.as_ptr()).gc_marked };
            if marked {
                // SAFETY: as above.
                unsafe { (*p.as_ptr()).gc_marked = false };
                alive.push(id);
            } else {
                self.objects[id.index()] = None;
                self.free_list.push(id.0);
                // SAFETY: unreachable from any root; the slot no longer refers to it.
                unsafe { self.release(p) };
            }
        }
        for &id in &self.no_gc {
            if let Some(Some(p)) = self.objects.get(id.index()).copied() {
                // SAFETY: permanent object owned by this heap.
                unsafe { (*p.as_ptr()).gc_marked = false };
            }
        }
        let freed = before - alive.len();
        self.generation = alive;
        self.pool.shrink_to_fit();
        freed
    }

    /// Runs a full cycle and recomputes the trigger threshold from the survivors.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjectId>) -> usize {
        self.mark(roots);
        let freed = self.sweep();
        self.gc_counter = 0;
        self.gc_threshold = (self.generation.len() * 2).max(self.min_threshold);
        self.collections += 1;
        tracing::debug!(
            target: "pk::gc",
            freed,
            survivors = self.generation.len(),
            permanent = self.no_gc.len(),
            threshold = self.gc_threshold,
            "collection finished"
        );
        freed
    }

    /// # Safety
    /// `p` must be a live object of this heap that no slot refers to any more.
    unsafe fn release(&mut self, p: NonNull<HeapObject>) {
        // SAFETY: guaranteed by the caller.
        unsafe {
            std::ptr::drop_in_place(p.as_ptr());
            self.pool.dealloc(p.cast());
        }
    }
}

impl Drop for ManagedHeap {
    fn drop(&mut self) {
        for slot in std::mem::take(&mut self.objects) {
            if let Some(p) = slot {
                // SAFETY: every live slot owns its object exactly once.
                unsafe { self.release(p) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::object::{ObjPayload, ObjectLayout};
    use crate::core::value::{TypeId, Value, tp};

    fn list(items: Vec<Value>) -> HeapObject {
        HeapObject::new(tp::LIST, ObjectLayout::Plain, ObjPayload::List(items))
    }

    #[test]
    fn unreachable_objects_are_freed() {
        let mut heap = ManagedHeap::new(4);
        let kept = heap.alloc(list(vec![]), false);
        let dropped = heap.alloc(list(vec![]), false);
        let freed = heap.collect([kept]);
        assert_eq!(freed, 1);
        assert!(heap.is_alive(kept));
        assert!(!heap.is_alive(dropped));
    }

    #[test]
    fn marking_follows_references() {
        let mut heap = ManagedHeap::new(4);
        let inner = heap.alloc(list(vec![]), false);
        let outer = heap.alloc(list(vec![Value::obj(tp::LIST, inner)]), false);
        heap.collect([outer]);
        assert!(heap.is_alive(inner));
        // marks are cleared, so a second cycle sees the same graph
        heap.collect([outer]);
        assert!(heap.is_alive(inner));
    }

    #[test]
    fn permanent_objects_survive_and_keep_children() {
        let mut heap = ManagedHeap::new(4);
        let child = heap.alloc(list(vec![]), false);
        let perm = heap.alloc(list(vec![Value::obj(tp::LIST, child)]), true);
        heap.collect([]);
        assert!(heap.is_alive(perm));
        assert!(heap.is_alive(child));
    }

    #[test]
    fn threshold_doubles_survivors_with_floor() {
        let mut heap = ManagedHeap::new(4);
        let ids: Vec<_> = (0..10).map(|_| heap.alloc(list(vec![]), false)).collect();
        heap.collect(ids.iter().copied());
        assert_eq!(heap.gc_threshold, 20);
        heap.collect([]);
        assert_eq!(heap.gc_threshold, 4);
        assert_eq!(heap.gc_counter, 0);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut heap = ManagedHeap::new(4);
        let a = heap.alloc(list(vec![]), false);
        heap.collect([]);
        let b = heap.alloc(
            HeapObject::new(TypeId(1), ObjectLayout::Dict, ObjPayload::Empty),
            false,
        );
        assert_eq!(a, b);
        assert_eq!(heap.get(b).ty, TypeId(1));
    }

    #[test]
    fn lock_defers_automatic_collection() {
        let mut heap = ManagedHeap::new(1);
        heap.alloc(list(vec![]), false);
        assert!(heap.should_collect());
        heap.lock();
        assert!(!heap.should_collect());
        heap.unlock();
        assert!(heap.should_collect());
    }
}
