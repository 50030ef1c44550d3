use mortar::{Heap, HeapConfig, HeapError};
use rand::prelude::*;

#[test]
fn zero_size_and_null_requests() {
    let mut heap = Heap::new().unwrap();

    assert!(heap.allocate(0).is_none());
    heap.deallocate(None).unwrap();
    assert!(heap.check());

    // a null handle turns reallocate into allocate
    let block = heap.reallocate(None, 64).unwrap().unwrap();
    assert!(heap.payload(block).unwrap().len() >= 64);

    // a zero size turns reallocate into deallocate
    assert_eq!(heap.reallocate(Some(block), 0).unwrap(), None);
    assert!(heap.check());

    // the freed block is reused rather than the arena growing
    let size_before = heap.arena_size();
    let again = heap.allocate(64).unwrap();
    assert_eq!(again.offset(), block.offset());
    assert_eq!(heap.arena_size(), size_before);
}

#[test]
fn writes_survive_until_deallocation() {
    let mut heap = Heap::new().unwrap();
    let sizes = [1, 7, 16, 24, 100, 200, 512, 1000];

    let blocks: Vec<_> = sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| {
            let block = heap.allocate(size).unwrap();
            for byte in heap.payload_mut(block).unwrap()[..size].iter_mut() {
                *byte = (i * 31) as u8;
            }
            block
        })
        .collect();

    assert!(heap.check());

    // every region still holds its own pattern, so none of them alias
    for (i, (&size, &block)) in sizes.iter().zip(&blocks).enumerate() {
        let expected = (i * 31) as u8;
        assert!(heap.payload(block).unwrap()[..size]
            .iter()
            .all(|&byte| byte == expected));
    }

    // freeing every other block must not disturb the survivors
    for &block in blocks.iter().step_by(2) {
        heap.deallocate(Some(block)).unwrap();
        assert!(heap.check());
    }
    for (i, (&size, &block)) in sizes.iter().zip(&blocks).enumerate().skip(1).step_by(2) {
        let expected = (i * 31) as u8;
        assert!(heap.payload(block).unwrap()[..size]
            .iter()
            .all(|&byte| byte == expected));
    }
}

#[test]
fn freed_block_is_carved_for_a_smaller_request() {
    let mut heap = Heap::new().unwrap();

    let a = heap.allocate(100).unwrap();
    assert!(heap.check());
    let b = heap.allocate(200).unwrap();
    assert!(heap.check());

    heap.deallocate(Some(a)).unwrap();
    assert!(heap.check());

    let size_before = heap.arena_size();
    let c = heap.allocate(50).unwrap();
    assert!(heap.check());

    // the smaller request is carved out of a's freed block
    assert_eq!(c.offset(), a.offset());
    assert_eq!(heap.arena_size(), size_before);

    heap.deallocate(Some(b)).unwrap();
    heap.deallocate(Some(c)).unwrap();
    assert!(heap.check());
}

#[test]
fn steady_state_churn_does_not_grow_the_arena() {
    let mut heap = Heap::new().unwrap();

    let warmup = heap.allocate(64).unwrap();
    heap.deallocate(Some(warmup)).unwrap();
    let size_after_first = heap.arena_size();

    for _ in 0..1000 {
        let block = heap.allocate(64).unwrap();
        heap.deallocate(Some(block)).unwrap();
    }

    assert_eq!(heap.arena_size(), size_after_first);
    assert_eq!(heap.metrics().extensions, 1);
    assert!(heap.check());
}

#[test]
fn shrink_then_grow_preserves_the_prefix() {
    let mut heap = Heap::new().unwrap();

    let block = heap.allocate(100).unwrap();
    for (i, byte) in heap.payload_mut(block).unwrap()[..100].iter_mut().enumerate() {
        *byte = i as u8;
    }

    let shrunk = heap.reallocate(Some(block), 50).unwrap().unwrap();
    assert_eq!(shrunk.offset(), block.offset());
    assert!(heap.check());

    let grown = heap.reallocate(Some(shrunk), 100).unwrap().unwrap();
    assert!(heap.check());

    let payload = heap.payload(grown).unwrap();
    for i in 0..50 {
        assert_eq!(payload[i], i as u8);
    }
}

#[test]
fn resizing_within_the_same_block_is_identity() {
    let mut heap = Heap::new().unwrap();

    let block = heap.allocate(100).unwrap();
    let same = heap.reallocate(Some(block), 100).unwrap().unwrap();
    assert_eq!(same.offset(), block.offset());

    // a request that adjusts to the same block size changes nothing
    let still = heap.reallocate(Some(same), 112).unwrap().unwrap();
    assert_eq!(still.offset(), block.offset());
    assert!(heap.check());
}

#[test]
fn grows_into_the_next_free_neighbor_in_place() {
    let mut heap = Heap::new().unwrap();

    let block = heap.allocate(100).unwrap();
    let neighbor = heap.allocate(100).unwrap();
    for (i, byte) in heap.payload_mut(block).unwrap()[..100].iter_mut().enumerate() {
        *byte = i as u8;
    }

    heap.deallocate(Some(neighbor)).unwrap();
    let size_before = heap.arena_size();

    let grown = heap.reallocate(Some(block), 200).unwrap().unwrap();
    assert!(heap.check());

    // the merged region starts where the block already was
    assert_eq!(grown.offset(), block.offset());
    assert_eq!(heap.arena_size(), size_before);

    let payload = heap.payload(grown).unwrap();
    for i in 0..100 {
        assert_eq!(payload[i], i as u8);
    }
}

#[test]
fn grows_backward_into_the_previous_free_neighbor() {
    let mut heap = Heap::new().unwrap();

    let front = heap.allocate(100).unwrap();
    let block = heap.allocate(100).unwrap();
    for (i, byte) in heap.payload_mut(block).unwrap()[..100].iter_mut().enumerate() {
        *byte = i as u8;
    }

    heap.deallocate(Some(front)).unwrap();
    let size_before = heap.arena_size();

    // the payload slides backward over its own old bytes
    let grown = heap.reallocate(Some(block), 150).unwrap().unwrap();
    assert!(heap.check());

    assert_eq!(grown.offset(), front.offset());
    assert_eq!(heap.arena_size(), size_before);

    let payload = heap.payload(grown).unwrap();
    for i in 0..100 {
        assert_eq!(payload[i], i as u8);
    }
}

#[test]
fn exhaustion_returns_null_and_reuse_still_works() {
    let config = HeapConfig {
        arena_limit: 256,
        ..HeapConfig::default()
    };
    let mut heap = Heap::with_config(config).unwrap();

    let block = heap.allocate(100).unwrap();
    assert!(heap.allocate(100).is_none());
    assert!(heap.check());

    heap.deallocate(Some(block)).unwrap();
    let again = heap.allocate(100).unwrap();
    assert_eq!(again.offset(), block.offset());
    assert!(heap.check());
}

#[test]
fn pow2_rounding_promotes_reuse_of_uneven_requests() {
    let config = HeapConfig {
        pow2_rounding: true,
        ..HeapConfig::default()
    };
    let mut heap = Heap::with_config(config).unwrap();

    let first = heap.allocate(33).unwrap();
    heap.deallocate(Some(first)).unwrap();
    let second = heap.allocate(60).unwrap();

    // both requests round to the same power of two block
    assert_eq!(second.offset(), first.offset());
    assert!(heap.check());

    // without the heuristic the second request outgrows the freed block
    let mut plain = Heap::new().unwrap();
    let first = plain.allocate(33).unwrap();
    plain.deallocate(Some(first)).unwrap();
    let second = plain.allocate(60).unwrap();

    assert_ne!(second.offset(), first.offset());
    assert!(plain.check());
}

#[test]
fn single_class_baseline_serves_mixed_requests() {
    let config = HeapConfig {
        size_classes: 1,
        ..HeapConfig::default()
    };
    let mut heap = Heap::with_config(config).unwrap();

    let big = heap.allocate(100).unwrap();
    heap.deallocate(Some(big)).unwrap();

    // the single global list still serves a smaller request by splitting
    let small = heap.allocate(40).unwrap();
    assert_eq!(small.offset(), big.offset());
    assert!(heap.check());

    let other = heap.allocate(300).unwrap();
    let resized = heap.reallocate(Some(small), 80).unwrap().unwrap();
    assert!(heap.check());

    heap.deallocate(Some(other)).unwrap();
    heap.deallocate(Some(resized)).unwrap();
    assert!(heap.check());
}

#[test]
fn stale_handle_after_a_move_is_rejected() {
    let mut heap = Heap::new().unwrap();

    let block = heap.allocate(20).unwrap();
    heap.payload_mut(block).unwrap()[..20].copy_from_slice(&[9; 20]);
    let _guard = heap.allocate(200).unwrap();

    let moved = heap.reallocate(Some(block), 500).unwrap().unwrap();
    assert_ne!(moved.offset(), block.offset());
    assert_eq!(&heap.payload(moved).unwrap()[..20], &[9; 20]);

    assert_eq!(heap.deallocate(Some(block)), Err(HeapError::InvalidBlock));
    assert!(heap.check());
}

#[test]
fn double_free_is_rejected() {
    let mut heap = Heap::new().unwrap();

    let block = heap.allocate(64).unwrap();
    heap.deallocate(Some(block)).unwrap();

    assert_eq!(heap.deallocate(Some(block)), Err(HeapError::InvalidBlock));
    assert!(heap.check());
}

#[test]
fn metrics_count_operations() {
    let mut heap = Heap::new().unwrap();

    let a = heap.allocate(100).unwrap();
    let b = heap.allocate(100).unwrap();
    heap.deallocate(Some(a)).unwrap();
    heap.reallocate(Some(b), 300).unwrap().unwrap();

    let metrics = heap.metrics();
    assert_eq!(metrics.allocations, 2);
    assert_eq!(metrics.deallocations, 1);
    assert_eq!(metrics.reallocations, 1);
    assert_eq!(metrics.extensions, 3);
    assert_eq!(metrics.grown_bytes, heap.arena_size() as u64 - 32);
}

#[test]
fn random_churn_keeps_the_heap_consistent() {
    let mut rng = rand::thread_rng();
    let mut heap = Heap::new().unwrap();
    let mut live: Vec<(mortar::BlockRef, Vec<u8>)> = Vec::new();

    for round in 0..2000 {
        match rng.gen_range(0..10) {
            0..=4 => {
                let size = rng.gen_range(1..700);
                if let Some(block) = heap.allocate(size) {
                    let mut data = vec![0u8; size];
                    rng.fill_bytes(&mut data);
                    heap.payload_mut(block).unwrap()[..size].copy_from_slice(&data);
                    live.push((block, data));
                }
            }
            5..=7 => {
                if !live.is_empty() {
                    let (block, data) = live.swap_remove(rng.gen_range(0..live.len()));
                    assert_eq!(&heap.payload(block).unwrap()[..data.len()], &data[..]);
                    heap.deallocate(Some(block)).unwrap();
                }
            }
            _ => {
                if !live.is_empty() {
                    let index = rng.gen_range(0..live.len());
                    let new_size = rng.gen_range(1..900);
                    let (block, data) = live[index].clone();

                    let moved = heap.reallocate(Some(block), new_size).unwrap().unwrap();
                    let keep = data.len().min(new_size);
                    assert_eq!(&heap.payload(moved).unwrap()[..keep], &data[..keep]);

                    let mut data = vec![0u8; new_size];
                    rng.fill_bytes(&mut data);
                    heap.payload_mut(moved).unwrap()[..new_size].copy_from_slice(&data);
                    live[index] = (moved, data);
                }
            }
        }

        if round % 100 == 0 {
            assert!(heap.check());
        }
    }

    for (block, data) in live.drain(..) {
        assert_eq!(&heap.payload(block).unwrap()[..data.len()], &data[..]);
        heap.deallocate(Some(block)).unwrap();
    }
    assert!(heap.check());
}
