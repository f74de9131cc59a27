//! VM configuration.

/// Knobs fixed at VM construction.
#[derive(Clone, Debug)]
pub struct VmConfig {
    /// Floor for the allocation count that triggers an automatic collection.
    pub gc_min_threshold: usize,
    /// When false, only `gc_collect()` collects.
    pub gc_enabled: bool,
    /// Frames kept in the fixed pool before falling back to the global allocator.
    pub frame_pool_blocks: usize,
    /// Scripted frames allowed on the frame stack at once.
    pub max_recursion_depth: usize,
    /// Step loops allowed to nest on the host stack, one per call a native makes back into
    /// scripted code.
    pub max_nested_calls: usize,
    /// Emit a `trace!` event for every executed instruction.
    pub trace_steps: bool,
}

impl VmConfig {
    pub const GC_MIN_THRESHOLD: usize = 16384;
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            gc_min_threshold: Self::GC_MIN_THRESHOLD,
            gc_enabled: true,
            frame_pool_blocks: 256,
            max_recursion_depth: 1000,
            max_nested_calls: 32,
            trace_steps: false,
        }
    }
}
