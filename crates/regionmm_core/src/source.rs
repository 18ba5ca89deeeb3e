//! # Page Sources
//!
//! The backing capability an arena draws its pages from. An arena never
//! reaches for an allocator on its own: every byte it hands out was acquired
//! from the [`PageSource`] supplied at construction, and goes back to that
//! same source when the page is released.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ArenaError, ArenaResult};
use crate::memory::WORD;

/// Injected acquire/release capability backing an arena.
///
/// `acquire` returns `None` when the source is exhausted. Regions are handed
/// back through `release` exactly once, either when their page empties or when
/// the arena shuts down.
pub trait PageSource {
    /// An owned byte region.
    ///
    /// Pointers carved from a region outlive moves of the region value, so the
    /// bytes must stay put and moving the value must not claim them
    /// exclusively. Raw-pointer owners such as [`HeapRegion`] qualify;
    /// `Box<[u8]>` does not, since every move of a `Box` asserts uniqueness.
    type Region: DerefMut<Target = [u8]>;

    /// Acquires a region of at least `size` bytes.
    fn acquire(&self, size: usize) -> Option<Self::Region>;

    /// Returns a region previously obtained from `acquire`.
    fn release(&self, region: Self::Region);
}

/// A zeroed, [`WORD`]-aligned block from the global allocator.
pub struct HeapRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the block is uniquely owned and holds plain bytes.
unsafe impl Send for HeapRegion {}
// SAFETY: shared access only ever yields `&[u8]`.
unsafe impl Sync for HeapRegion {}

impl HeapRegion {
    fn layout(len: usize) -> Option<Layout> {
        Layout::from_size_align(len.max(1), WORD).ok()
    }

    fn zeroed(len: usize) -> Option<Self> {
        let layout = Self::layout(len)?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = NonNull::new(unsafe { alloc::alloc_zeroed(layout) })?;
        Some(Self { ptr, len })
    }
}

impl Deref for HeapRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr` is live for `len` initialized bytes until drop.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for HeapRegion {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for HeapRegion {
    fn drop(&mut self) {
        if let Some(layout) = Self::layout(self.len) {
            // SAFETY: allocated in `zeroed` with this same layout.
            unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

/// Page source backed by the global allocator.
///
/// Regions are zeroed and [`WORD`]-aligned, so every carved address is
/// pointer-aligned. Exhaustion surfaces as `None` rather than an abort inside
/// the allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapSource;

impl PageSource for HeapSource {
    type Region = HeapRegion;

    fn acquire(&self, size: usize) -> Option<Self::Region> {
        HeapRegion::zeroed(size)
    }

    fn release(&self, region: Self::Region) {
        drop(region);
    }
}

/// Page source built from a caller-supplied closure pair.
///
/// # Example
///
/// ```rust,ignore
/// let source = FnSource::new(
///     Some(|size| HeapSource.acquire(size)),
///     Some(|region| HeapSource.release(region)),
/// )?;
/// ```
pub struct FnSource<R, A, F> {
    acquire: A,
    release: F,
    _region: PhantomData<fn() -> R>,
}

impl<R, A, F> FnSource<R, A, F>
where
    R: DerefMut<Target = [u8]>,
    A: Fn(usize) -> Option<R>,
    F: Fn(R),
{
    /// Builds a source from an acquire/release pair.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidArgument`] if either callback is missing.
    pub fn new(acquire: Option<A>, release: Option<F>) -> ArenaResult<Self> {
        let acquire = acquire.ok_or(ArenaError::InvalidArgument("missing acquire callback"))?;
        let release = release.ok_or(ArenaError::InvalidArgument("missing release callback"))?;

        Ok(Self {
            acquire,
            release,
            _region: PhantomData,
        })
    }
}

impl<R, A, F> PageSource for FnSource<R, A, F>
where
    R: DerefMut<Target = [u8]>,
    A: Fn(usize) -> Option<R>,
    F: Fn(R),
{
    type Region = R;

    #[inline]
    fn acquire(&self, size: usize) -> Option<R> {
        (self.acquire)(size)
    }

    #[inline]
    fn release(&self, region: R) {
        (self.release)(region);
    }
}

/// Wraps another source and refuses requests past a fixed byte budget.
///
/// Outstanding bytes are tracked atomically, so a budget may be shared by a
/// [`SharedArena`](crate::SharedArena) used from many threads.
pub struct BudgetSource<S> {
    inner: S,
    budget: usize,
    outstanding: AtomicUsize,
}

impl<S: PageSource> BudgetSource<S> {
    /// Creates a budgeted wrapper around `inner`.
    #[must_use]
    pub const fn new(inner: S, budget: usize) -> Self {
        Self {
            inner,
            budget,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Returns the budget in bytes.
    #[inline]
    #[must_use]
    pub const fn budget(&self) -> usize {
        self.budget
    }

    /// Returns the bytes currently acquired and not yet released.
    #[inline]
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Adds `bytes` to the outstanding total unless that passes the budget.
    fn charge(&self, bytes: usize) -> Option<usize> {
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(bytes).filter(|&total| total <= self.budget)
            })
            .ok()
    }
}

impl<S: PageSource> PageSource for BudgetSource<S> {
    type Region = S::Region;

    fn acquire(&self, size: usize) -> Option<Self::Region> {
        self.charge(size)?;

        let Some(region) = self.inner.acquire(size) else {
            self.outstanding.fetch_sub(size, Ordering::AcqRel);
            return None;
        };

        // Charge what was actually handed out so release refunds it exactly.
        let surplus = region.len().saturating_sub(size);
        if surplus > 0 && self.charge(surplus).is_none() {
            self.outstanding.fetch_sub(size, Ordering::AcqRel);
            self.inner.release(region);
            return None;
        }
        Some(region)
    }

    fn release(&self, region: Self::Region) {
        self.outstanding.fetch_sub(region.len(), Ordering::AcqRel);
        self.inner.release(region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_source_acquire() {
        let region = HeapSource.acquire(128).unwrap();
        assert_eq!(region.len(), 128);
        assert!(region.iter().all(|&b| b == 0));
        HeapSource.release(region);
    }

    #[test]
    fn test_heap_regions_are_word_aligned() {
        for size in [1, 3, 17, 4096] {
            let region = HeapSource.acquire(size).unwrap();
            assert_eq!(region.as_ptr() as usize % WORD, 0, "size {size}");
        }
        assert_eq!(HeapSource.acquire(0).map(|r| r.len()), Some(0));
    }

    #[test]
    fn test_fn_source_requires_both_callbacks() {
        let acquire = |size: usize| HeapSource.acquire(size);
        let release = |region: HeapRegion| HeapSource.release(region);

        let missing_release = FnSource::<HeapRegion, _, fn(HeapRegion)>::new(Some(acquire), None);
        assert_eq!(
            missing_release.err(),
            Some(ArenaError::InvalidArgument("missing release callback"))
        );

        let missing_acquire =
            FnSource::<HeapRegion, fn(usize) -> Option<HeapRegion>, _>::new(None, Some(release));
        assert_eq!(
            missing_acquire.err(),
            Some(ArenaError::InvalidArgument("missing acquire callback"))
        );

        let source = FnSource::new(Some(acquire), Some(release)).unwrap();
        let region = source.acquire(16).unwrap();
        assert_eq!(region.len(), 16);
        source.release(region);
    }

    #[test]
    fn test_budget_source_refuses_past_budget() {
        let source = BudgetSource::new(HeapSource, 100);

        let first = source.acquire(60).unwrap();
        assert_eq!(source.outstanding(), 60);
        assert!(source.acquire(60).is_none());
        assert_eq!(source.outstanding(), 60);

        source.release(first);
        assert_eq!(source.outstanding(), 0);
        assert!(source.acquire(100).is_some());
    }

    #[test]
    fn test_budget_source_counts_oversized_regions() {
        let doubling = FnSource::new(
            Some(|size: usize| HeapSource.acquire(size * 2)),
            Some(|region: HeapRegion| HeapSource.release(region)),
        )
        .unwrap();
        let source = BudgetSource::new(doubling, 100);

        let first = source.acquire(40).unwrap();
        assert_eq!(source.outstanding(), 80);

        // 15 more fits the budget, the 30 bytes actually returned do not.
        assert!(source.acquire(15).is_none());
        assert_eq!(source.outstanding(), 80);
        assert!(source.outstanding() <= source.budget());

        source.release(first);
        assert_eq!(source.outstanding(), 0);
    }
}
