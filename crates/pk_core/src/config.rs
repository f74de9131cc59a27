/// Geometry of the size-classed arena pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Size-class granularity in bytes.
    pub granularity: usize,
    /// Number of size classes; requests above `granularity * class_count` bypass the pool.
    pub class_count: usize,
    /// Bytes per arena.
    pub arena_bytes: usize,
    /// Arenas kept across `shrink_to_fit` even when empty.
    pub min_arenas: usize,
}

impl ArenaConfig {
    pub const GRANULARITY: usize = 32;
    pub const CLASS_COUNT: usize = 8;
    pub const ARENA_BYTES: usize = 32 * 1024;
    pub const MIN_ARENAS: usize = 4;

    pub fn max_pooled_size(&self) -> usize {
        self.granularity * self.class_count
    }

    /// `(size - 1) >> 5` for the default 32-byte granularity.
    pub fn class_index(&self, size: usize) -> usize {
        (size.max(1) - 1) / self.granularity
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            granularity: Self::GRANULARITY,
            class_count: Self::CLASS_COUNT,
            arena_bytes: Self::ARENA_BYTES,
            min_arenas: Self::MIN_ARENAS,
        }
    }
}
