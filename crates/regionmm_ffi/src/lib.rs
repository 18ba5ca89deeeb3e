//! # REGIONMM C ABI
//!
//! Exposes the page arena to C programs. Declarations live in
//! `include/regionmm.h`.
//!
//! ## Safety Note
//!
//! This crate dereferences handles and calls function pointers supplied by C.
//! Every unsafe block states the caller obligation it relies on.
//!
//! ## Example
//!
//! ```c
//! regionmm_arena *mm = regionmm_init(malloc, free, 4096);
//! if (!mm)
//!     return regionmm_last_error();
//!
//! char *buf = regionmm_zalloc(mm, 100);
//! regionmm_free(mm, buf);
//! regionmm_shutdown(mm);
//! ```

#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod foreign;
pub mod last_error;

use std::ffi::{c_int, c_void};
use std::mem;
use std::ptr::{self, NonNull};

use regionmm_core::{
    ArenaConfig, ArenaError, ArenaResult, ConfiguredArena, PageSource, RegionAllocator,
};

pub use foreign::{AllocFn, ForeignRegion, ForeignSource, ReleaseFn};
pub use last_error::{code_of, REGIONMM_EINVAL, REGIONMM_ENOMEM, REGIONMM_OK};

/// Opaque arena handle handed to C.
///
/// The handle is the arena's control block: it lives in a block from the
/// caller's `alloc` and goes back through `release` after every page.
pub struct RegionmmArena {
    inner: ConfiguredArena<ForeignSource>,
    source: ForeignSource,
    control: ForeignRegion,
}

fn build_arena(
    alloc: Option<AllocFn>,
    release: Option<ReleaseFn>,
    page_size: usize,
    thread_safe: bool,
) -> ArenaResult<NonNull<RegionmmArena>> {
    // SAFETY: the C caller of `regionmm_init*` vouches for the callbacks.
    let source = unsafe { ForeignSource::new(alloc, release)? };

    let size = mem::size_of::<RegionmmArena>();
    let control = source
        .acquire(size)
        .ok_or(ArenaError::OutOfMemory { requested: size })?;
    #[allow(clippy::cast_ptr_alignment)]
    let slot = control.as_ptr().cast::<RegionmmArena>();
    if slot.as_ptr() as usize % mem::align_of::<RegionmmArena>() != 0 {
        source.release(control);
        return Err(ArenaError::InvalidArgument("alloc returned a misaligned block"));
    }

    let inner = ArenaConfig {
        page_size,
        thread_safe,
    }
    .build_hosted(source);
    // SAFETY: `slot` is aligned and `control` spans `size` bytes for it.
    unsafe {
        slot.as_ptr().write(RegionmmArena {
            inner,
            source,
            control,
        });
    }
    Ok(slot)
}

fn init_arena(
    alloc: Option<AllocFn>,
    release: Option<ReleaseFn>,
    page_size: usize,
    thread_safe: bool,
) -> *mut RegionmmArena {
    match build_arena(alloc, release, page_size, thread_safe) {
        Ok(arena) => arena.as_ptr(),
        Err(err) => {
            last_error::record(&err);
            ptr::null_mut()
        }
    }
}

/// Creates a thread-safe arena.
///
/// Returns NULL on failure; see [`regionmm_last_error`].
///
/// # Safety
///
/// `alloc` must return NULL or a block of at least the requested size that
/// stays valid until passed to `release`. Both must be callable from every
/// thread that uses the arena.
#[no_mangle]
pub unsafe extern "C" fn regionmm_init(
    alloc: Option<AllocFn>,
    release: Option<ReleaseFn>,
    page_size: usize,
) -> *mut RegionmmArena {
    init_arena(alloc, release, page_size, true)
}

/// Creates an arena without a lock. It must only be used from one thread.
///
/// # Safety
///
/// As [`regionmm_init`], and the caller must keep every use of the returned
/// arena on a single thread.
#[no_mangle]
pub unsafe extern "C" fn regionmm_init_unlocked(
    alloc: Option<AllocFn>,
    release: Option<ReleaseFn>,
    page_size: usize,
) -> *mut RegionmmArena {
    init_arena(alloc, release, page_size, false)
}

/// Releases every page and the arena itself. NULL is ignored.
///
/// # Safety
///
/// `arena` must be NULL or a live handle from `regionmm_init*`. No other
/// call on it may run concurrently or follow, and no pointer it returned may
/// be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn regionmm_shutdown(arena: *mut RegionmmArena) {
    if arena.is_null() {
        return;
    }
    // SAFETY: non-null handles were written by `build_arena`; the value is
    // moved out once, before its block goes back to the caller.
    let RegionmmArena {
        inner,
        source,
        control,
    } = unsafe { arena.read() };
    inner.shutdown();
    source.release(control);
}

unsafe fn carve(arena: *mut RegionmmArena, len: usize, zeroed: bool) -> *mut c_void {
    // SAFETY: caller passes NULL or a live handle.
    let Some(arena) = (unsafe { arena.as_ref() }) else {
        last_error::set(REGIONMM_EINVAL);
        return ptr::null_mut();
    };

    let result = if zeroed {
        arena.inner.zalloc(len)
    } else {
        arena.inner.malloc(len)
    };

    match result {
        Ok(ptr) => ptr.as_ptr().cast::<c_void>(),
        Err(err) => {
            last_error::record(&err);
            ptr::null_mut()
        }
    }
}

/// Allocates at least `len` bytes, rounded up to pointer size.
///
/// Returns NULL on failure; see [`regionmm_last_error`].
///
/// # Safety
///
/// `arena` must be NULL or a live handle. The returned block may be written
/// up to `len` rounded to pointer size.
#[no_mangle]
pub unsafe extern "C" fn regionmm_malloc(arena: *mut RegionmmArena, len: usize) -> *mut c_void {
    unsafe { carve(arena, len, false) }
}

/// Like [`regionmm_malloc`], with the first `len` bytes zeroed.
///
/// # Safety
///
/// As [`regionmm_malloc`].
#[no_mangle]
pub unsafe extern "C" fn regionmm_zalloc(arena: *mut RegionmmArena, len: usize) -> *mut c_void {
    unsafe { carve(arena, len, true) }
}

/// Frees one allocation. NULL and addresses the arena does not own are ignored.
///
/// # Safety
///
/// `arena` must be NULL or a live handle. `ptr` must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn regionmm_free(arena: *mut RegionmmArena, ptr: *mut c_void) {
    // SAFETY: caller passes NULL or a live handle.
    let Some(arena) = (unsafe { arena.as_ref() }) else {
        return;
    };
    if let Some(ptr) = NonNull::new(ptr.cast::<u8>()) {
        arena.inner.free(ptr);
    }
}

/// Number of live pages, or 0 for a NULL handle.
///
/// # Safety
///
/// `arena` must be NULL or a live handle.
#[no_mangle]
pub unsafe extern "C" fn regionmm_page_count(arena: *const RegionmmArena) -> usize {
    // SAFETY: caller passes NULL or a live handle.
    unsafe { arena.as_ref() }.map_or(0, |arena| arena.inner.page_count())
}

/// Code of the last failure on the calling thread.
#[no_mangle]
pub extern "C" fn regionmm_last_error() -> c_int {
    last_error::get()
}
