/// Configuration settings for a [`crate::Heap`].
#[derive(Copy, Clone, Debug)]
pub struct HeapConfig {
    /// Number of segregated size classes. Class k holds free blocks whose
    /// size falls in one power of two range above the minimum block, with
    /// the bottom and top classes catching everything below and above.
    /// A single class degenerates to one global free list.
    pub size_classes: usize,

    /// Round small requests up to the next power of two before alignment.
    /// This improves reuse on workloads that cycle through many similarly
    /// sized requests, at the cost of internal fragmentation, so it is off
    /// unless a workload is known to profit from it.
    pub pow2_rounding: bool,

    /// Requests at or above this many bytes are never power of two
    /// rounded.
    pub pow2_threshold: usize,

    /// Hard ceiling on arena growth in bytes. A request that would push
    /// the arena past this fails instead of extending.
    pub arena_limit: usize,
}

pub const HEAP_CONFIG_DEFAULT_SIZE_CLASSES: usize = 8;
pub const HEAP_CONFIG_DEFAULT_POW2_THRESHOLD: usize = 512;
pub const HEAP_CONFIG_DEFAULT_ARENA_LIMIT: usize = 1 << 30;

impl Default for HeapConfig {
    /// Creates a default HeapConfig. Good for most use cases.
    fn default() -> Self {
        HeapConfig {
            size_classes: HEAP_CONFIG_DEFAULT_SIZE_CLASSES,
            pow2_rounding: false,
            pow2_threshold: HEAP_CONFIG_DEFAULT_POW2_THRESHOLD,
            arena_limit: HEAP_CONFIG_DEFAULT_ARENA_LIMIT,
        }
    }
}
