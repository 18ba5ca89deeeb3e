//! # Foreign Page Source
//!
//! Page source over a C `alloc`/`release` function-pointer pair.

use std::ffi::c_void;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use regionmm_core::{ArenaError, ArenaResult, PageSource};

/// C allocation callback: returns at least `size` bytes, or NULL.
pub type AllocFn = unsafe extern "C" fn(size: usize) -> *mut c_void;

/// C release callback: takes back a pointer returned by the matching [`AllocFn`].
pub type ReleaseFn = unsafe extern "C" fn(ptr: *mut c_void);

/// A block returned by the foreign allocator.
///
/// Never freed on drop: the arena always hands it back through
/// [`ForeignSource::release`]. Moving it moves only the address, so blocks
/// carved from it stay valid.
pub struct ForeignRegion {
    ptr: NonNull<u8>,
    len: usize,
}

impl ForeignRegion {
    /// Start of the block.
    #[inline]
    #[must_use]
    pub const fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }
}

// SAFETY: the region is exclusively owned by the page holding it, and C
// allocators hand out blocks usable from any thread.
unsafe impl Send for ForeignRegion {}

impl Deref for ForeignRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr` came from the foreign allocator for `len` bytes and is
        // live until released.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for ForeignRegion {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access. A page
        // takes this view once, at creation, and carves from its base after.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// Page source that forwards to caller-supplied C functions.
#[derive(Clone, Copy)]
pub struct ForeignSource {
    alloc: AllocFn,
    release: ReleaseFn,
}

impl ForeignSource {
    /// Wraps a possibly-NULL callback pair.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidArgument`] if either pointer is NULL.
    ///
    /// # Safety
    ///
    /// `alloc` must return NULL or a block of at least the requested size,
    /// valid until passed to `release`, and `release` must accept every such
    /// block exactly once.
    pub unsafe fn new(alloc: Option<AllocFn>, release: Option<ReleaseFn>) -> ArenaResult<Self> {
        match (alloc, release) {
            (Some(alloc), Some(release)) => Ok(Self { alloc, release }),
            (None, _) => Err(ArenaError::InvalidArgument("alloc callback is NULL")),
            (_, None) => Err(ArenaError::InvalidArgument("release callback is NULL")),
        }
    }
}

impl PageSource for ForeignSource {
    type Region = ForeignRegion;

    fn acquire(&self, size: usize) -> Option<ForeignRegion> {
        // SAFETY: contract accepted in `ForeignSource::new`.
        let raw = unsafe { (self.alloc)(size) };
        NonNull::new(raw.cast::<u8>()).map(|ptr| ForeignRegion { ptr, len: size })
    }

    fn release(&self, region: ForeignRegion) {
        // SAFETY: `region` came from `self.alloc` and is released once.
        unsafe { (self.release)(region.ptr.as_ptr().cast::<c_void>()) };
    }
}
