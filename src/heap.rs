use crate::arena::Arena;
use crate::check;
use crate::config::HeapConfig;
use crate::constants::{DWORD, FIRST_PAYLOAD, MIN_BLOCK, WORD};
use crate::debug::heap_debug;
use crate::error::HeapError;
use crate::free_list::FreeLists;
use crate::metrics::HeapMetrics;
use crate::tag;

/// Handle to an allocated block: the byte offset of its payload within
/// the heap's arena. Stays valid until the block is deallocated or moved
/// by [`Heap::reallocate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockRef(pub(crate) usize);

impl BlockRef {
    /// Byte offset of the block's payload within the arena.
    pub fn offset(&self) -> usize {
        self.0
    }
}

/// A heap serving allocate, deallocate, and reallocate requests out of a
/// single growable arena.
///
/// Every block carries a boundary tag at both ends, so freeing coalesces
/// with physical neighbors in constant time. Free blocks are threaded
/// into circular lists segregated by size class and reused first fit.
/// The arena only ever grows; freed bytes return through reuse, never to
/// the operating system.
pub struct Heap {
    pub(crate) arena: Arena,
    pub(crate) free: FreeLists,
    config: HeapConfig,
    metrics: HeapMetrics,
}

impl Heap {
    /// Creates a heap with the default configuration.
    pub fn new() -> Result<Heap, HeapError> {
        Self::with_config(HeapConfig::default())
    }

    /// Creates a heap laid out as a prologue block and an epilogue
    /// marker, ready to serve requests. Fails when the arena cannot
    /// supply even the initial words.
    pub fn with_config(config: HeapConfig) -> Result<Heap, HeapError> {
        let mut arena = Arena::new(config.arena_limit);
        arena.grow(FIRST_PAYLOAD)?;

        arena.set_word(0, 0); // alignment padding
        arena.set_word(WORD, tag::pack(DWORD, true)); // prologue header
        arena.set_word(2 * WORD, tag::pack(DWORD, true)); // prologue footer
        arena.set_word(3 * WORD, tag::pack(0, true)); // epilogue
        heap_debug("heap initialized");

        Ok(Heap {
            arena,
            free: FreeLists::new(config.size_classes),
            config,
            metrics: HeapMetrics::default(),
        })
    }

    /// Allocates a block with at least `size` usable bytes.
    ///
    /// Returns `None` when `size` is zero, when the adjusted size cannot
    /// be represented, or when the arena cannot grow to fit the request.
    pub fn allocate(&mut self, size: usize) -> Option<BlockRef> {
        if size == 0 {
            return None;
        }

        match self.alloc_block(size) {
            Ok(payload) => {
                self.metrics.allocations += 1;
                Some(BlockRef(payload))
            }
            Err(_) => {
                heap_debug("allocation failed");
                None
            }
        }
    }

    /// Frees a previously allocated block, eagerly coalescing it with any
    /// free physical neighbor. `None` is accepted and ignored.
    ///
    /// Handles that do not name a live allocated block (stale, double
    /// freed, or interior) are rejected with [`HeapError::InvalidBlock`]
    /// and the heap is left untouched.
    pub fn deallocate(&mut self, block: Option<BlockRef>) -> Result<(), HeapError> {
        let payload = match block {
            Some(block) => block.0,
            None => return Ok(()),
        };
        self.validate(payload)?;

        let size = tag::block_size(&self.arena, payload);
        tag::set_tags(&mut self.arena, payload, size, false);
        let merged = self.coalesce(payload);
        self.free.insert(&mut self.arena, merged);

        self.metrics.deallocations += 1;
        Ok(())
    }

    /// Resizes a block, moving it only when it cannot grow in place.
    ///
    /// `None` behaves as [`Heap::allocate`]; a `new_size` of zero behaves
    /// as [`Heap::deallocate`] and yields `Ok(None)`. On exhaustion the
    /// result is `Ok(None)` and the original block's bytes are forfeited
    /// to the free lists; `Err` is reserved for invalid handles.
    pub fn reallocate(
        &mut self,
        block: Option<BlockRef>,
        new_size: usize,
    ) -> Result<Option<BlockRef>, HeapError> {
        if new_size == 0 {
            self.deallocate(block)?;
            return Ok(None);
        }

        let payload = match block {
            Some(block) => block.0,
            None => return Ok(self.allocate(new_size)),
        };
        self.validate(payload)?;

        let adjusted = match adjust(new_size) {
            Some(adjusted) => adjusted,
            None => return Ok(None),
        };
        let old_size = tag::block_size(&self.arena, payload);

        let moved = if adjusted == old_size {
            Some(payload)
        } else if adjusted < old_size {
            Some(self.shrink(payload, adjusted, old_size))
        } else {
            self.grow_block(payload, new_size, adjusted, old_size)
        };

        self.metrics.reallocations += 1;
        Ok(moved.map(BlockRef))
    }

    /// Usable bytes of an allocated block.
    pub fn payload(&self, block: BlockRef) -> Result<&[u8], HeapError> {
        self.validate(block.0)?;

        let len = tag::block_size(&self.arena, block.0) - DWORD;
        Ok(self.arena.bytes(block.0, len))
    }

    /// Usable bytes of an allocated block, writable.
    pub fn payload_mut(&mut self, block: BlockRef) -> Result<&mut [u8], HeapError> {
        self.validate(block.0)?;

        let len = tag::block_size(&self.arena, block.0) - DWORD;
        Ok(self.arena.bytes_mut(block.0, len))
    }

    /// Audits the heap's consistency invariants. Read only and brute
    /// force by intent; meant for tests and debugging, never for the
    /// allocation path.
    pub fn check(&self) -> bool {
        check::audit(self)
    }

    /// Snapshot of the operation counters.
    pub fn metrics(&self) -> HeapMetrics {
        self.metrics
    }

    /// Current arena length in bytes, including block metadata and the
    /// prologue/epilogue framing.
    pub fn arena_size(&self) -> usize {
        self.arena.len()
    }

    fn alloc_block(&mut self, size: usize) -> Result<usize, HeapError> {
        let request = self.rounded_request(size);
        let adjusted = adjust(request).ok_or(HeapError::RequestOverflow)?;

        if let Some(payload) = self.find_fit(adjusted) {
            self.free.remove(&mut self.arena, payload);
            self.place(payload, adjusted);
            return Ok(payload);
        }

        let payload = self.extend(adjusted)?;
        self.place(payload, adjusted);
        Ok(payload)
    }

    /// Power of two pre-rounding for small requests, when configured.
    fn rounded_request(&self, size: usize) -> usize {
        if self.config.pow2_rounding && size < self.config.pow2_threshold {
            size.next_power_of_two()
        } else {
            size
        }
    }

    /// First fit within a class ascending search: scan each candidate
    /// list once around from its head and take the first block that is
    /// big enough.
    fn find_fit(&self, adjusted: usize) -> Option<usize> {
        for class in self.free.class_of(adjusted)..self.free.class_count() {
            if let Some(head) = self.free.head(class) {
                let mut payload = head;
                loop {
                    if tag::block_size(&self.arena, payload) >= adjusted {
                        return Some(payload);
                    }
                    payload = FreeLists::next_of(&self.arena, payload);
                    if payload == head {
                        break;
                    }
                }
            }
        }

        None
    }

    /// Marks the block at `payload` allocated for `adjusted` bytes,
    /// splitting the leftover off as a new free block when it is big
    /// enough to stand alone. The block must not be list resident.
    fn place(&mut self, payload: usize, adjusted: usize) {
        let size = tag::block_size(&self.arena, payload);
        let leftover = size - adjusted;

        if leftover >= MIN_BLOCK {
            tag::set_tags(&mut self.arena, payload, adjusted, true);
            let split = payload + adjusted;
            tag::set_tags(&mut self.arena, split, leftover, false);
            self.free.insert(&mut self.arena, split);
        } else {
            tag::set_tags(&mut self.arena, payload, size, true);
        }
    }

    /// Grows the arena by `bytes`, retagging the old epilogue as the
    /// header of one new free block and terminating the arena with a
    /// fresh epilogue. Returns the new block's payload offset.
    fn extend(&mut self, bytes: usize) -> Result<usize, HeapError> {
        let payload = self.arena.grow(bytes)?;
        tag::set_tags(&mut self.arena, payload, bytes, false);
        let epilogue = tag::next_block(&self.arena, payload);
        self.arena
            .set_word(tag::header_of(epilogue), tag::pack(0, true));

        self.metrics.extensions += 1;
        self.metrics.grown_bytes += bytes as u64;
        heap_debug(&format!("arena extended to {} bytes", self.arena.len()));

        Ok(payload)
    }

    /// Merges the free block at `payload` with whichever physical
    /// neighbors are free, unlinking them first, and returns the merged
    /// block's payload offset. The caller decides whether the merged
    /// block goes back into the registry.
    fn coalesce(&mut self, payload: usize) -> usize {
        let prev = tag::prev_block(&self.arena, payload);
        let next = tag::next_block(&self.arena, payload);
        let prev_free = !tag::block_allocated(&self.arena, prev);
        let next_free = !tag::block_allocated(&self.arena, next);
        let mut size = tag::block_size(&self.arena, payload);

        match (prev_free, next_free) {
            (false, false) => payload,
            (false, true) => {
                self.free.remove(&mut self.arena, next);
                size += tag::block_size(&self.arena, next);
                tag::set_tags(&mut self.arena, payload, size, false);
                payload
            }
            (true, false) => {
                self.free.remove(&mut self.arena, prev);
                size += tag::block_size(&self.arena, prev);
                tag::set_tags(&mut self.arena, prev, size, false);
                prev
            }
            (true, true) => {
                self.free.remove(&mut self.arena, prev);
                self.free.remove(&mut self.arena, next);
                size += tag::block_size(&self.arena, prev) + tag::block_size(&self.arena, next);
                tag::set_tags(&mut self.arena, prev, size, false);
                prev
            }
        }
    }

    /// Shrinks an allocated block in place. The trimmed tail becomes a
    /// new free block when it can stand alone, merged with its successor
    /// so no two free blocks end up adjacent; otherwise the block simply
    /// stays oversized.
    fn shrink(&mut self, payload: usize, adjusted: usize, old_size: usize) -> usize {
        let leftover = old_size - adjusted;

        if leftover >= MIN_BLOCK {
            tag::set_tags(&mut self.arena, payload, adjusted, true);
            let tail = payload + adjusted;
            tag::set_tags(&mut self.arena, tail, leftover, false);
            let merged = self.coalesce(tail);
            self.free.insert(&mut self.arena, merged);
        }

        payload
    }

    /// Grows a block, preferring in place expansion into free neighbors
    /// over moving. Returns `None` on exhaustion; every free byte ends up
    /// registry reachable no matter which path is taken.
    fn grow_block(
        &mut self,
        payload: usize,
        new_size: usize,
        adjusted: usize,
        old_size: usize,
    ) -> Option<usize> {
        // The block cannot satisfy the request as is. Free it and merge
        // with its neighbors to see whether the combined region can.
        tag::set_tags(&mut self.arena, payload, old_size, false);
        let merged = self.coalesce(payload);
        let merged_size = tag::block_size(&self.arena, merged);
        let payload_len = old_size - DWORD;

        if merged_size >= adjusted {
            // The old payload may overlap the merged region's start.
            self.arena.copy_within(payload, merged, payload_len);
            self.place(merged, adjusted);
            return Some(merged);
        }

        // Still not enough room even merged. Fall back to a fresh
        // allocation; the merged region stays out of the lists until the
        // copy is done so the search cannot hand it back to us.
        let moved = self.alloc_block(new_size).ok();
        if let Some(moved) = moved {
            self.arena.copy_within(payload, moved, payload_len);
        }
        self.free.insert(&mut self.arena, merged);

        moved
    }

    /// A handle is valid when it names a correctly tagged allocated block
    /// inside the arena. Catches stale handles, double frees, and
    /// interior offsets before they can corrupt anything.
    fn validate(&self, payload: usize) -> Result<(), HeapError> {
        let len = self.arena.len();
        if payload < FIRST_PAYLOAD || payload >= len || payload % DWORD != 0 {
            return Err(HeapError::InvalidBlock);
        }

        let header = self.arena.word(tag::header_of(payload));
        let size = tag::size(header);
        if size < MIN_BLOCK || size % DWORD != 0 {
            return Err(HeapError::InvalidBlock);
        }
        match payload.checked_add(size) {
            Some(end) if end <= len => {}
            _ => return Err(HeapError::InvalidBlock),
        }

        let footer = self.arena.word(tag::footer_of(&self.arena, payload));
        if footer != header || !tag::is_allocated(header) {
            return Err(HeapError::InvalidBlock);
        }

        Ok(())
    }
}

/// Rounds a request up to a legal block size: payload plus tag overhead,
/// aligned to the double word, never below the minimum block.
pub(crate) fn adjust(request: usize) -> Option<usize> {
    if request <= DWORD {
        Some(MIN_BLOCK)
    } else {
        let padded = request.checked_add(DWORD + (DWORD - 1))?;
        Some(DWORD * (padded / DWORD))
    }
}
