use std::mem::size_of;

/// Machine word size in bytes. Boundary tags and free list links are one
/// word each.
pub const WORD: usize = size_of::<usize>();

/// Double word size, the alignment unit. Every block size is a multiple of
/// this and every payload starts on a double word boundary.
pub const DWORD: usize = 2 * WORD;

pub const MIN_BLOCK_POW: usize = 5;

/// Smallest legal block: room for a header, two link words, and a footer.
pub const MIN_BLOCK: usize = 1 << MIN_BLOCK_POW;

/// Payload offset of the first real block. The arena opens with one
/// padding word, the prologue header/footer pair, and the initial epilogue.
pub const FIRST_PAYLOAD: usize = 4 * WORD;

const _: () = assert!(MIN_BLOCK >= 2 * DWORD);
const _: () = assert!(MIN_BLOCK % DWORD == 0);
