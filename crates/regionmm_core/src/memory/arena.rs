//! # Local Arena
//!
//! The unsynchronized arena variant.

use std::cell::RefCell;
use std::ptr::NonNull;

use tracing::info;

use super::{ArenaCore, RegionAllocator};
use crate::error::ArenaResult;
use crate::source::{FnSource, PageSource};
use crate::stats::ArenaStats;

/// A page arena for use from a single thread.
///
/// Interior mutability goes through a `RefCell`, which makes the type `!Sync`:
/// sharing one across threads is rejected at compile time rather than being
/// a contract the caller has to keep.
///
/// # Example
///
/// ```rust,ignore
/// let arena = LocalArena::init(HeapSource, 4096)?;
///
/// let header = arena.malloc(24)?;
/// let body = arena.zalloc(512)?;
///
/// arena.free(header);
/// arena.free(body); // last allocation on the page: page released
/// ```
pub struct LocalArena<S: PageSource> {
    core: RefCell<ArenaCore<S>>,
}

impl<S: PageSource> LocalArena<S> {
    /// Creates an arena drawing `page_size`-byte pages from `source`.
    ///
    /// # Errors
    ///
    /// [`ArenaError::OutOfMemory`](crate::ArenaError::OutOfMemory) if the
    /// source cannot supply the control block.
    pub fn init(source: S, page_size: usize) -> ArenaResult<Self> {
        let core = ArenaCore::new(source, page_size)?;
        info!(page_size, thread_safe = false, "arena initialized");
        Ok(Self {
            core: RefCell::new(core),
        })
    }

    /// Creates an arena that holds no control reservation of its own.
    ///
    /// For hosts that place the arena value itself in a block acquired from
    /// the same source and release that block after shutdown.
    #[must_use]
    pub fn hosted(source: S, page_size: usize) -> Self {
        info!(page_size, thread_safe = false, "hosted arena initialized");
        Self {
            core: RefCell::new(ArenaCore::hosted(source, page_size)),
        }
    }
}

impl<R, A, F> LocalArena<FnSource<R, A, F>>
where
    R: std::ops::DerefMut<Target = [u8]>,
    A: Fn(usize) -> Option<R>,
    F: Fn(R),
{
    /// Creates an arena from an acquire/release closure pair.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidArgument`](crate::ArenaError::InvalidArgument) if
    /// either callback is missing, otherwise as [`LocalArena::init`].
    pub fn init_with(acquire: Option<A>, release: Option<F>, page_size: usize) -> ArenaResult<Self> {
        Self::init(FnSource::new(acquire, release)?, page_size)
    }
}

impl<S: PageSource> RegionAllocator for LocalArena<S> {
    #[inline]
    fn page_size(&self) -> usize {
        self.core.borrow().page_size()
    }

    fn malloc(&self, len: usize) -> ArenaResult<NonNull<u8>> {
        self.core.borrow_mut().carve(len, false)
    }

    fn zalloc(&self, len: usize) -> ArenaResult<NonNull<u8>> {
        self.core.borrow_mut().carve(len, true)
    }

    fn free(&self, ptr: NonNull<u8>) {
        self.core.borrow_mut().free(ptr);
    }

    fn owns(&self, ptr: NonNull<u8>) -> bool {
        self.core.borrow().owns(ptr)
    }

    #[inline]
    fn page_count(&self) -> usize {
        self.core.borrow().page_count()
    }

    fn stats(&self) -> ArenaStats {
        self.core.borrow().stats()
    }

    fn with_bytes_mut<T>(
        &self,
        ptr: NonNull<u8>,
        len: usize,
        f: impl FnOnce(&mut [u8]) -> T,
    ) -> Option<T> {
        let mut core = self.core.borrow_mut();
        core.bytes_mut(ptr, len).map(f)
    }

    fn shutdown(self) {
        let stats = self.stats();
        info!(
            live_pages = stats.live_pages,
            live_allocations = stats.live_allocations,
            "arena shut down"
        );
        drop(self);
    }
}
