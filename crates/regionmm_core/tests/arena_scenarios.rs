//! Integration tests for page carving and page release.

#![allow(unsafe_code)]

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use regionmm_core::{
    round_to_word, ArenaError, FnSource, HeapRegion, HeapSource, LocalArena, PageSource,
    RegionAllocator, WORD,
};

/// Counts the page-sized regions handed back to the source.
#[allow(clippy::type_complexity)]
fn counting_arena(
    page_size: usize,
) -> (
    LocalArena<FnSource<HeapRegion, impl Fn(usize) -> Option<HeapRegion>, impl Fn(HeapRegion)>>,
    Rc<Cell<usize>>,
) {
    let released = Rc::new(Cell::new(0));
    let counter = Rc::clone(&released);

    let arena = LocalArena::init_with(
        Some(|size: usize| HeapSource.acquire(size)),
        Some(move |region: HeapRegion| {
            if region.len() == page_size {
                counter.set(counter.get() + 1);
            }
        }),
        page_size,
    )
    .unwrap();

    (arena, released)
}

fn addr(ptr: std::ptr::NonNull<u8>) -> usize {
    ptr.as_ptr() as usize
}

#[test]
fn test_init_requires_both_callbacks() {
    let no_acquire = LocalArena::<FnSource<HeapRegion, fn(usize) -> Option<HeapRegion>, _>>::init_with(
        None,
        Some(drop::<HeapRegion>),
        64,
    );
    assert!(matches!(no_acquire, Err(ArenaError::InvalidArgument(_))));

    let no_release = LocalArena::<FnSource<HeapRegion, _, fn(HeapRegion)>>::init_with(
        Some(|size: usize| HeapSource.acquire(size)),
        None,
        64,
    );
    assert!(matches!(no_release, Err(ArenaError::InvalidArgument(_))));
}

#[test]
fn test_init_fails_when_control_block_refused() {
    let result = LocalArena::init_with(
        Some(|_: usize| None::<HeapRegion>),
        Some(drop::<HeapRegion>),
        64,
    );
    assert!(matches!(result, Err(ArenaError::OutOfMemory { .. })));
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_boundary_scenario_forces_second_page() {
    let (arena, released) = counting_arena(64);

    // 1 rounds to 8 and lands at the base of page 1.
    let first = arena.malloc(1).unwrap();
    // 50 rounds to 56; 8 + 56 == 64 is not < 64, so page 2 is created.
    let second = arena.malloc(50).unwrap();

    assert_eq!(arena.page_count(), 2);
    assert_ne!(addr(second), addr(first) + 8);
    assert_eq!(arena.stats().live_allocations, 2);

    arena.free(first);
    assert_eq!(released.get(), 1);
    assert_eq!(arena.page_count(), 1);
    assert!(arena.owns(second));
    assert!(!arena.owns(first));
}

#[test]
fn test_exact_boundary_never_reuses_page() {
    let page_size = 8 * WORD;
    let (arena, _) = counting_arena(page_size);

    arena.malloc(WORD).unwrap();
    // cursor + len == page_size exactly.
    arena.malloc(7 * WORD).unwrap();
    assert_eq!(arena.page_count(), 2);

    // One word short of the boundary still fits the first page.
    let (arena, _) = counting_arena(page_size);
    let a = arena.malloc(WORD).unwrap();
    let b = arena.malloc(6 * WORD).unwrap();
    assert_eq!(arena.page_count(), 1);
    assert_eq!(addr(b), addr(a) + WORD);
}

#[test]
fn test_allocations_below_page_size_share_one_page() {
    let page_size = 32 * WORD;
    let (arena, _) = counting_arena(page_size);
    let requests = [1, WORD, 3 * WORD - 1, 2 * WORD, 5, 7 * WORD];

    let ptrs: Vec<_> = requests.iter().map(|&len| arena.malloc(len).unwrap()).collect();

    assert_eq!(arena.page_count(), 1);
    let base = addr(ptrs[0]);
    let mut expected = base;
    for (ptr, &len) in ptrs.iter().zip(&requests) {
        assert_eq!(addr(*ptr), expected);
        assert_eq!(addr(*ptr) % WORD, base % WORD);
        expected += round_to_word(len).unwrap();
    }
    assert!(expected - base < page_size);
}

#[test]
fn test_single_allocation_free_releases_page() {
    let (arena, released) = counting_arena(256);
    let before = arena.page_count();

    let ptr = arena.zalloc(40).unwrap();
    assert_eq!(arena.page_count(), before + 1);

    arena.free(ptr);
    assert_eq!(arena.page_count(), before);
    assert_eq!(released.get(), 1);
}

#[test]
fn test_zalloc_zeroes_requested_bytes() {
    let arena = LocalArena::init_with(
        Some(|size: usize| {
            HeapSource.acquire(size).map(|mut region| {
                region.fill(0x5A);
                region
            })
        }),
        Some(drop::<HeapRegion>),
        512,
    )
    .unwrap();

    for len in [1, 7, 8, 33, 200] {
        let ptr = arena.zalloc(len).unwrap();
        let zeroed = arena
            .with_bytes_mut(ptr, len, |bytes| bytes.iter().all(|&b| b == 0))
            .unwrap();
        assert!(zeroed, "zalloc({len}) left non-zero bytes");
    }
}

#[test]
fn test_freed_space_is_not_reused_while_page_live() {
    let (arena, _) = counting_arena(16 * WORD);

    let keep = arena.malloc(WORD).unwrap();
    let dropped = arena.malloc(WORD).unwrap();
    arena.free(dropped);
    let next = arena.malloc(WORD).unwrap();

    assert_eq!(addr(next), addr(dropped) + WORD);
    assert_eq!(arena.stats().live_allocations, 2);
    assert!(arena.owns(keep));
}

#[test]
fn test_unowned_free_is_silent() {
    let (arena, released) = counting_arena(128);
    let live = arena.malloc(16).unwrap();

    let mut elsewhere = [0u8; 16];
    arena.free(std::ptr::NonNull::from(&mut elsewhere).cast());

    assert_eq!(arena.page_count(), 1);
    assert_eq!(released.get(), 0);
    assert_eq!(arena.stats().ignored_frees, 1);
    assert!(arena.owns(live));
}

#[test]
fn test_oversized_request_is_rejected() {
    let (arena, _) = counting_arena(64);

    assert!(matches!(arena.malloc(64), Err(ArenaError::InvalidArgument(_))));
    assert!(matches!(arena.zalloc(1 << 20), Err(ArenaError::InvalidArgument(_))));
    assert_eq!(arena.page_count(), 0);
}

#[test]
fn test_shutdown_releases_live_pages() {
    let (arena, released) = counting_arena(64);
    arena.malloc(40).unwrap();
    arena.malloc(40).unwrap();
    arena.malloc(40).unwrap();
    assert_eq!(arena.page_count(), 3);

    arena.shutdown();
    assert_eq!(released.get(), 3);
}

#[test]
fn test_blocks_stay_writable_across_later_carves() {
    let arena = LocalArena::init(HeapSource, 64 * WORD).unwrap();

    let blocks: Vec<_> = (0..8)
        .map(|i| {
            let ptr = if i % 2 == 0 {
                arena.malloc(WORD).unwrap()
            } else {
                arena.zalloc(WORD).unwrap()
            };
            let slot = ptr.cast::<usize>();
            // SAFETY: a fresh, pointer-aligned block of one word.
            unsafe { slot.as_ptr().write(i) };
            slot
        })
        .collect();
    assert_eq!(arena.page_count(), 1);

    for (i, slot) in blocks.iter().enumerate() {
        // SAFETY: every block is still live.
        unsafe { slot.as_ptr().write(slot.as_ptr().read() + 100 * i) };
    }
    for (i, slot) in blocks.iter().enumerate() {
        assert_eq!(unsafe { slot.as_ptr().read() }, i + 100 * i);
    }

    for slot in blocks {
        arena.free(slot.cast());
    }
    assert_eq!(arena.page_count(), 0);
}

#[test]
fn test_heap_source_blocks_are_pointer_aligned() {
    let arena = LocalArena::init(HeapSource, 4096).unwrap();
    for len in [1, 3, 9, 17, 100] {
        let ptr = arena.malloc(len).unwrap();
        assert_eq!(addr(ptr) % WORD, 0, "malloc({len})");
    }
}

proptest! {
    #[test]
    fn prop_page_released_exactly_on_last_free(
        (sizes, order) in prop::collection::vec(0usize..=4 * WORD, 1..24)
            .prop_flat_map(|sizes| {
                let n = sizes.len();
                (Just(sizes), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
            })
    ) {
        let (arena, released) = counting_arena(1024 * WORD);
        let ptrs: Vec<_> = sizes.iter().map(|&len| arena.malloc(len).unwrap()).collect();
        prop_assert_eq!(arena.page_count(), 1);

        for (step, &i) in order.iter().enumerate() {
            prop_assert_eq!(released.get(), 0);
            arena.free(ptrs[i]);
            if step + 1 < order.len() {
                prop_assert_eq!(arena.page_count(), 1);
            }
        }

        prop_assert_eq!(released.get(), 1);
        prop_assert_eq!(arena.page_count(), 0);
    }
}
