//! Boundary tag codec.
//!
//! Every block carries a one word tag at both ends packing its size with
//! an allocated flag. Blocks are named by payload offset; the header sits
//! one word below the payload and the footer fills the block's last word.
//! Footers stay valid for allocated blocks too, which is what makes the
//! backward neighbor reachable in O(1).

use crate::arena::Arena;
use crate::constants::{DWORD, WORD};

const ALLOCATED: usize = 0x1;
const SIZE_MASK: usize = !(DWORD - 1);

/// Packs a block size and allocated flag into one tag word. The size must
/// be a multiple of the alignment unit, which keeps the low bits free.
pub(crate) fn pack(size: usize, allocated: bool) -> usize {
    debug_assert_eq!(size & !SIZE_MASK, 0);

    size | allocated as usize
}

pub(crate) fn size(tag: usize) -> usize {
    tag & SIZE_MASK
}

pub(crate) fn is_allocated(tag: usize) -> bool {
    tag & ALLOCATED != 0
}

/// Offset of the header word for the block at `payload`.
pub(crate) fn header_of(payload: usize) -> usize {
    payload - WORD
}

/// Offset of the footer word for the block at `payload`, computed from the
/// size its header records.
pub(crate) fn footer_of(arena: &Arena, payload: usize) -> usize {
    payload + block_size(arena, payload) - DWORD
}

pub(crate) fn block_size(arena: &Arena, payload: usize) -> usize {
    size(arena.word(header_of(payload)))
}

pub(crate) fn block_allocated(arena: &Arena, payload: usize) -> bool {
    is_allocated(arena.word(header_of(payload)))
}

/// Writes a matching header/footer pair for the block at `payload`.
pub(crate) fn set_tags(arena: &mut Arena, payload: usize, size: usize, allocated: bool) {
    let tag = pack(size, allocated);

    arena.set_word(header_of(payload), tag);
    arena.set_word(payload + size - DWORD, tag);
}

/// Payload offset of the physically next block.
pub(crate) fn next_block(arena: &Arena, payload: usize) -> usize {
    payload + block_size(arena, payload)
}

/// Payload offset of the physically previous block, found through its
/// footer.
pub(crate) fn prev_block(arena: &Arena, payload: usize) -> usize {
    payload - size(arena.word(payload - DWORD))
}
