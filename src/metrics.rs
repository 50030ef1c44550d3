/// A snapshot of a heap's operation counters.
///
/// Obtained by calling [`crate::Heap::metrics`].
#[derive(Copy, Clone, Debug, Default)]
pub struct HeapMetrics {
    /// Allocate calls that returned a block.
    pub allocations: u64,

    /// Deallocate calls that freed a block.
    pub deallocations: u64,

    /// Reallocate calls that resized a live block, whichever path they
    /// took.
    pub reallocations: u64,

    /// Times the arena was extended.
    pub extensions: u64,

    /// Total bytes the arena has grown by, extension requests only.
    pub grown_bytes: u64,
}
