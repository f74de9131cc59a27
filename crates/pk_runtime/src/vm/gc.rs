use crate::core::{ObjectId, Value};
use crate::errors::PyResult;

use super::Vm;

impl Vm {
    /// Collects when enough allocations happened since the last cycle. Called before CALL.
    pub(crate) fn collect_if_needed(&mut self) {
        if self.config.gc_enabled && self.heap.should_collect() {
            self.gc_collect();
        }
    }

    /// Runs a full mark-sweep cycle and returns the number of objects freed.
    pub fn gc_collect(&mut self) -> usize {
        let roots = self.gc_roots();
        let freed = self.heap.collect(roots);
        #[cfg(target_os = "linux")]
        if freed > 0 {
            // SAFETY: malloc_trim only returns unused heap pages to the OS.
            unsafe {
                libc::malloc_trim(0);
            }
        }
        freed
    }

    fn gc_roots(&self) -> Vec<ObjectId> {
        let mut roots: Vec<ObjectId> = Vec::with_capacity(self.stack.len() + 16);
        let mut push = |v: Value| {
            if let Some(id) = v.obj_id() {
                roots.push(id);
            }
        };
        self.stack.iter().copied().for_each(&mut push);
        for frame in &self.frames {
            push(frame.function);
        }
        if let Some(exc) = self.pending {
            push(exc);
        }
        push(self.ret);
        roots.extend(self.frames.iter().map(|f| f.module));
        roots.extend(self.modules.values().copied());
        roots.extend(self.types.iter().map(|t| t.obj));
        roots.push(self.builtins);
        roots.push(self.main);
        roots
    }

    /// Runs `f` with automatic collection suspended, for natives that hold values in Rust
    /// locals across calls back into scripted code.
    pub(crate) fn with_gc_locked<T>(&mut self, f: impl FnOnce(&mut Vm) -> PyResult<T>) -> PyResult<T> {
        self.heap.lock();
        let r = f(self);
        self.heap.unlock();
        r
    }
}
