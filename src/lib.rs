//! A segregated free list heap allocator over a single growable arena.
//!
//! `mortar` manages one contiguous byte arena and serves allocate,
//! deallocate, and reallocate requests from it. Every block carries a
//! boundary tag at both ends, so freeing coalesces with physical
//! neighbors in constant time; free blocks are threaded into circular
//! lists segregated by size class and handed back out first fit. The
//! arena only ever grows, so freed bytes come back through reuse rather
//! than returning to the operating system.
//!
//! Blocks are addressed by [`BlockRef`] handles (arena offsets rather
//! than raw pointers), and the usable bytes of a live block are reached
//! through [`Heap::payload`] and [`Heap::payload_mut`]:
//!
//! ```rust
//! use mortar::Heap;
//!
//! let mut heap = Heap::new().unwrap();
//!
//! let block = heap.allocate(64).unwrap();
//! heap.payload_mut(block).unwrap()[..5].copy_from_slice(b"hello");
//! assert_eq!(&heap.payload(block).unwrap()[..5], b"hello");
//!
//! heap.deallocate(Some(block)).unwrap();
//! assert!(heap.check());
//! ```
//!
//! A heap is an ordinary owned value, so independent heaps can coexist;
//! each one is single threaded by design and needs an external lock to
//! be shared. [`Heap::check`] audits the structural invariants of the
//! whole heap and is meant for tests and debugging rather than the
//! allocation path.

mod arena;
mod check;
mod config;
mod constants;
mod debug;
mod error;
mod free_list;
mod heap;
mod metrics;
mod tag;

pub use config::HeapConfig;
pub use error::HeapError;
pub use heap::{BlockRef, Heap};
pub use metrics::HeapMetrics;
