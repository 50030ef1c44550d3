//! Segregated free lists.
//!
//! Free blocks are threaded into circular doubly linked lists through two
//! link words stored at the start of their payload, so the registry costs
//! no memory beyond its head array. Lists are segregated by size class:
//! each class spans one power of two range of block sizes, saturating at
//! both ends. Insertion is LIFO at the head, which makes a first fit
//! search prefer the most recently freed block of a class.

use crate::arena::Arena;
use crate::constants::{MIN_BLOCK, MIN_BLOCK_POW, WORD};
use crate::tag;

pub(crate) struct FreeLists {
    heads: Vec<Option<usize>>,
}

impl FreeLists {
    pub fn new(classes: usize) -> FreeLists {
        assert!(classes >= 1);

        FreeLists {
            heads: vec![None; classes],
        }
    }

    pub fn class_count(&self) -> usize {
        self.heads.len()
    }

    pub fn head(&self, class: usize) -> Option<usize> {
        self.heads[class]
    }

    /// Size class for a block of `size` bytes. Monotonic and saturating:
    /// everything at or below the minimum block lands in class 0 and
    /// everything past the largest boundary lands in the top class.
    pub fn class_of(&self, size: usize) -> usize {
        debug_assert!(size >= MIN_BLOCK);

        let mut index: usize = 0;
        let mut rest = size - 1;
        while rest != 0 {
            rest >>= 1;
            index += 1;
        }

        index.saturating_sub(MIN_BLOCK_POW).min(self.heads.len() - 1)
    }

    /// Link word reads for list traversal.
    pub fn prev_of(arena: &Arena, payload: usize) -> usize {
        arena.word(payload)
    }

    pub fn next_of(arena: &Arena, payload: usize) -> usize {
        arena.word(payload + WORD)
    }

    fn set_links(arena: &mut Arena, payload: usize, prev: usize, next: usize) {
        arena.set_word(payload, prev);
        arena.set_word(payload + WORD, next);
    }

    /// Pushes the free block at `payload` onto the head of its class's
    /// list. O(1).
    pub fn insert(&mut self, arena: &mut Arena, payload: usize) {
        let class = self.class_of(tag::block_size(arena, payload));

        match self.heads[class] {
            None => {
                Self::set_links(arena, payload, payload, payload);
            }
            Some(head) => {
                let tail = Self::prev_of(arena, head);
                Self::set_links(arena, payload, tail, head);
                arena.set_word(tail + WORD, payload);
                arena.set_word(head, payload);
            }
        }

        self.heads[class] = Some(payload);
    }

    /// Unlinks the free block at `payload` from its class's list. O(1).
    pub fn remove(&mut self, arena: &mut Arena, payload: usize) {
        let class = self.class_of(tag::block_size(arena, payload));
        let next = Self::next_of(arena, payload);

        // only block in its list
        if next == payload {
            self.heads[class] = None;
            return;
        }

        let prev = Self::prev_of(arena, payload);
        arena.set_word(prev + WORD, next);
        arena.set_word(next, prev);

        if self.heads[class] == Some(payload) {
            self.heads[class] = Some(next);
        }
    }
}
