//! # Memory Management
//!
//! Page arenas carved by bump pointers and reclaimed a whole page at a time.
//!
//! ## Design Philosophy
//!
//! - Requests are rounded to pointer width and carved from the first page
//!   with room, in creation order
//! - Freed space inside a page is never reused
//! - A page goes back to its source the moment its last allocation is freed

mod arena;
mod engine;
mod page;

use std::ptr::NonNull;

use crate::error::ArenaResult;
use crate::stats::ArenaStats;

pub use arena::LocalArena;
pub(crate) use engine::ArenaCore;
pub use page::{round_to_word, WORD};

/// Operation contract shared by every arena variant.
///
/// Returned pointers stay valid until they are freed or the arena shuts down,
/// whatever is carved or zeroed on the same page in between. Each is aligned
/// to [`WORD`] relative to its page base, so absolutely aligned whenever the
/// source's regions are (as [`HeapSource`](crate::HeapSource)'s are), and
/// addresses at least the requested length rounded up to [`WORD`].
pub trait RegionAllocator {
    /// Fixed page size in bytes.
    fn page_size(&self) -> usize;

    /// Carves at least `len` bytes.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidArgument`](crate::ArenaError::InvalidArgument) if
    /// the rounded length cannot fit a page,
    /// [`ArenaError::OutOfMemory`](crate::ArenaError::OutOfMemory) if a new
    /// page was needed and the source refused it.
    fn malloc(&self, len: usize) -> ArenaResult<NonNull<u8>>;

    /// Like [`malloc`](Self::malloc), with the first `len` bytes zeroed.
    ///
    /// # Errors
    ///
    /// Same as [`malloc`](Self::malloc).
    fn zalloc(&self, len: usize) -> ArenaResult<NonNull<u8>>;

    /// Releases one allocation. Unowned addresses are ignored.
    fn free(&self, ptr: NonNull<u8>);

    /// Whether a live page contains `ptr`.
    fn owns(&self, ptr: NonNull<u8>) -> bool;

    /// Number of live pages.
    fn page_count(&self) -> usize;

    /// Occupancy snapshot.
    fn stats(&self) -> ArenaStats;

    /// Runs `f` over `len` bytes of a live allocation at `ptr`.
    ///
    /// Returns `None` if no page owns `ptr` or the range runs past the
    /// carved part of its page. `f` runs with the arena borrowed and must not
    /// call back into it.
    fn with_bytes_mut<T>(&self, ptr: NonNull<u8>, len: usize, f: impl FnOnce(&mut [u8]) -> T)
        -> Option<T>;

    /// Releases every page and the control block, whatever is still live.
    fn shutdown(self)
    where
        Self: Sized;
}
