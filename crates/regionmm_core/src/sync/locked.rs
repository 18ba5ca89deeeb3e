//! # Shared Arena
//!
//! Mutex-guarded arena for use from many threads.
//!
//! ```text
//!   thread A ──malloc──┐
//!   thread B ──free────┼──► Mutex<ArenaCore> ──► PageSource
//!   thread C ──zalloc──┘        (one lock per arena, no per-page locks)
//! ```
//!
//! `malloc`, `zalloc` and `free` never interleave on the same arena. Shutdown
//! consumes the arena, so it cannot race with any of them.

use std::ptr::NonNull;

use parking_lot::Mutex;
use tracing::info;

use crate::error::ArenaResult;
use crate::memory::{ArenaCore, RegionAllocator};
use crate::source::{FnSource, PageSource};
use crate::stats::ArenaStats;

/// A page arena serialized by a single lock.
///
/// `Send + Sync` whenever the page source and its regions are `Send`, so it
/// can be shared behind an `Arc`.
///
/// # Example
///
/// ```rust,ignore
/// let arena = Arc::new(SharedArena::init(HeapSource, 64 * 1024)?);
///
/// let worker = Arc::clone(&arena);
/// std::thread::spawn(move || {
///     let scratch = worker.zalloc(256)?;
///     // ...
///     worker.free(scratch);
/// });
/// ```
pub struct SharedArena<S: PageSource> {
    core: Mutex<ArenaCore<S>>,
}

impl<S: PageSource> SharedArena<S> {
    /// Creates an arena drawing `page_size`-byte pages from `source`.
    ///
    /// # Errors
    ///
    /// [`ArenaError::OutOfMemory`](crate::ArenaError::OutOfMemory) if the
    /// source cannot supply the control block.
    pub fn init(source: S, page_size: usize) -> ArenaResult<Self> {
        let core = ArenaCore::new(source, page_size)?;
        info!(page_size, thread_safe = true, "arena initialized");
        Ok(Self {
            core: Mutex::new(core),
        })
    }

    /// Creates an arena that holds no control reservation of its own.
    ///
    /// For hosts that place the arena value itself in a block acquired from
    /// the same source and release that block after shutdown.
    #[must_use]
    pub fn hosted(source: S, page_size: usize) -> Self {
        info!(page_size, thread_safe = true, "hosted arena initialized");
        Self {
            core: Mutex::new(ArenaCore::hosted(source, page_size)),
        }
    }
}

impl<R, A, F> SharedArena<FnSource<R, A, F>>
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
    /// either callback is missing, otherwise as [`SharedArena::init`].
    pub fn init_with(acquire: Option<A>, release: Option<F>, page_size: usize) -> ArenaResult<Self> {
        Self::init(FnSource::new(acquire, release)?, page_size)
    }
}

impl<S: PageSource> RegionAllocator for SharedArena<S> {
    #[inline]
    fn page_size(&self) -> usize {
        self.core.lock().page_size()
    }

    fn malloc(&self, len: usize) -> ArenaResult<NonNull<u8>> {
        self.core.lock().carve(len, false)
    }

    fn zalloc(&self, len: usize) -> ArenaResult<NonNull<u8>> {
        self.core.lock().carve(len, true)
    }

    fn free(&self, ptr: NonNull<u8>) {
        self.core.lock().free(ptr);
    }

    fn owns(&self, ptr: NonNull<u8>) -> bool {
        self.core.lock().owns(ptr)
    }

    #[inline]
    fn page_count(&self) -> usize {
        self.core.lock().page_count()
    }

    fn stats(&self) -> ArenaStats {
        self.core.lock().stats()
    }

    fn with_bytes_mut<T>(
        &self,
        ptr: NonNull<u8>,
        len: usize,
        f: impl FnOnce(&mut [u8]) -> T,
    ) -> Option<T> {
        let mut core = self.core.lock();
        core.bytes_mut(ptr, len).map(f)
    }

    fn shutdown(self) {
        let core = self.core.into_inner();
        let stats = core.stats();
        info!(
            live_pages = stats.live_pages,
            live_allocations = stats.live_allocations,
            "arena shut down"
        );
        drop(core);
    }
}
