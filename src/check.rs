//! Heap consistency audit.
//!
//! Five independently checkable properties over the arena and the
//! registry, preceded by a structural walk of the physical block
//! sequence. Everything here is brute force by intent: the audit runs
//! under test instrumentation only and favors obviousness over speed.
//! Nothing is ever mutated or repaired.

use crate::constants::{DWORD, FIRST_PAYLOAD, MIN_BLOCK, WORD};
use crate::free_list::FreeLists;
use crate::heap::Heap;
use crate::tag;

struct BlockView {
    payload: usize,
    size: usize,
    allocated: bool,
}

pub(crate) fn audit(heap: &Heap) -> bool {
    let blocks = match walk(heap) {
        Some(blocks) => blocks,
        None => return false,
    };
    let lists = match collect_lists(heap) {
        Some(lists) => lists,
        None => return false,
    };

    listed_blocks_are_free(heap, &lists)
        && no_adjacent_free_blocks(&blocks)
        && free_blocks_are_listed(&blocks, &lists)
        && list_entries_resolve(heap, &lists)
        && no_overlap(&blocks)
}

/// Walks the physical block sequence from the first block to the
/// epilogue, validating structural sanity as it goes. Returns `None`
/// when the walk itself is broken: a bad size, a header/footer mismatch,
/// or a missing epilogue.
fn walk(heap: &Heap) -> Option<Vec<BlockView>> {
    let len = heap.arena.len();
    let mut blocks = Vec::new();
    let mut payload = FIRST_PAYLOAD;

    loop {
        if payload > len {
            return None;
        }

        let header = heap.arena.word(tag::header_of(payload));
        let size = tag::size(header);

        if size == 0 {
            // epilogue: allocated, zero size, in the arena's last word
            if tag::is_allocated(header) && tag::header_of(payload) == len - WORD {
                return Some(blocks);
            }
            return None;
        }

        if size < MIN_BLOCK || size % DWORD != 0 {
            return None;
        }
        let end = payload.checked_add(size)?;
        if end > len {
            return None;
        }
        if heap.arena.word(end - DWORD) != header {
            return None;
        }

        blocks.push(BlockView {
            payload,
            size,
            allocated: tag::is_allocated(header),
        });
        payload = end;
    }
}

/// True when a list link can be dereferenced at all: a double word
/// aligned offset whose header and link words lie inside the arena.
fn link_target_ok(heap: &Heap, payload: usize) -> bool {
    payload >= FIRST_PAYLOAD && payload % DWORD == 0 && payload + DWORD <= heap.arena.len()
}

/// Collects every class list into a vector of member offsets. Returns
/// `None` when a list fails to close into a consistent circular chain
/// with `prev`/`next` symmetry.
fn collect_lists(heap: &Heap) -> Option<Vec<Vec<usize>>> {
    // A well formed list can never hold more blocks than fit in the arena.
    let cap = heap.arena.len() / MIN_BLOCK + 1;
    let mut lists = Vec::with_capacity(heap.free.class_count());

    for class in 0..heap.free.class_count() {
        let mut members = Vec::new();

        if let Some(head) = heap.free.head(class) {
            if !link_target_ok(heap, head) {
                return None;
            }

            let mut payload = head;
            loop {
                members.push(payload);
                if members.len() > cap {
                    return None;
                }

                let next = FreeLists::next_of(&heap.arena, payload);
                if !link_target_ok(heap, next) {
                    return None;
                }
                if FreeLists::prev_of(&heap.arena, next) != payload {
                    return None;
                }

                payload = next;
                if payload == head {
                    break;
                }
            }
        }

        lists.push(members);
    }

    Some(lists)
}

/// Every block reachable from a free list has its allocated flag clear.
fn listed_blocks_are_free(heap: &Heap, lists: &[Vec<usize>]) -> bool {
    lists
        .iter()
        .flatten()
        .all(|&payload| !tag::block_allocated(&heap.arena, payload))
}

/// No two free blocks touch. The walk yields blocks in physical order,
/// so only consecutive pairs can be adjacent.
fn no_adjacent_free_blocks(blocks: &[BlockView]) -> bool {
    blocks
        .windows(2)
        .all(|pair| pair[0].allocated || pair[1].allocated)
}

/// Every free block in the arena sits in exactly one free list.
fn free_blocks_are_listed(blocks: &[BlockView], lists: &[Vec<usize>]) -> bool {
    blocks.iter().filter(|block| !block.allocated).all(|block| {
        let memberships: usize = lists
            .iter()
            .map(|list| list.iter().filter(|&&payload| payload == block.payload).count())
            .sum();
        memberships == 1
    })
}

/// Every offset stored in a free list resolves to a block whose tags are
/// consistent and unallocated.
fn list_entries_resolve(heap: &Heap, lists: &[Vec<usize>]) -> bool {
    lists.iter().flatten().all(|&payload| {
        let header = heap.arena.word(tag::header_of(payload));
        let size = tag::size(header);

        if size < MIN_BLOCK || size % DWORD != 0 {
            return false;
        }
        let end = match payload.checked_add(size) {
            Some(end) if end <= heap.arena.len() => end,
            _ => return false,
        };

        heap.arena.word(end - DWORD) == header && !tag::is_allocated(header)
    })
}

/// No two blocks overlap in address range, header through footer.
fn no_overlap(blocks: &[BlockView]) -> bool {
    for (i, a) in blocks.iter().enumerate() {
        let a_start = a.payload - WORD;
        let a_end = a_start + a.size;

        for b in &blocks[i + 1..] {
            let b_start = b.payload - WORD;
            let b_end = b_start + b.size;

            if a_start < b_end && b_start < a_end {
                return false;
            }
        }
    }

    true
}
