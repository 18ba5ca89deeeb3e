//! # Pages
//!
//! A page is one region from the page source, carved front to back by a
//! cursor that never moves backwards. Space is only reclaimed when the whole
//! page goes back to its source.
//!
//! ## Safety Note
//!
//! Carved blocks are handed out as raw pointers and stay writable while later
//! blocks are carved from the same page. Every address is therefore derived
//! from one base pointer taken when the page is created; the region itself is
//! never borrowed again until it goes back to its source.

#![allow(unsafe_code)]

use std::mem;
use std::ops::DerefMut;
use std::ptr::{self, NonNull};
use std::slice;

/// Allocation granularity: every request is rounded up to a pointer width.
pub const WORD: usize = mem::size_of::<usize>();

/// Rounds `len` up to the next multiple of [`WORD`].
///
/// Returns `None` if the rounded length does not fit in `usize`.
#[inline]
#[must_use]
pub const fn round_to_word(len: usize) -> Option<usize> {
    match len.checked_add(WORD - 1) {
        Some(padded) => Some(padded & !(WORD - 1)),
        None => None,
    }
}

/// A bump-pointer page.
///
/// `cursor` is a byte offset from `base`. After every carve it stays strictly
/// below the arena's page size.
pub(crate) struct Page<R> {
    /// Start of the region, taken once at creation.
    base: NonNull<u8>,
    /// Usable bytes from `base`: the smaller of page size and region length.
    span: usize,
    /// Owned region from the page source. Not touched until release.
    region: R,
    /// Offset of the next free byte.
    cursor: usize,
    /// Allocations carved here and not yet freed.
    alloc_cnt: usize,
}

// SAFETY: `base` points into `region`, which the page owns. Sending the page
// sends the region with it.
unsafe impl<R: Send> Send for Page<R> {}

impl<R> Page<R>
where
    R: DerefMut<Target = [u8]>,
{
    /// Wraps a freshly acquired region usable up to `page_size` bytes.
    pub(crate) fn new(mut region: R, page_size: usize) -> Self {
        let span = page_size.min(region.len());
        let base = NonNull::from(&mut *region).cast::<u8>();
        Self {
            base,
            span,
            region,
            cursor: 0,
            alloc_cnt: 0,
        }
    }

    /// Offset of the next free byte.
    #[inline]
    pub(crate) const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Live allocations carved from this page.
    #[inline]
    pub(crate) const fn alloc_cnt(&self) -> usize {
        self.alloc_cnt
    }

    /// Whether a rounded request of `len` bytes lands strictly inside the page.
    ///
    /// A request ending exactly on the page boundary does not fit.
    #[inline]
    pub(crate) fn fits(&self, len: usize, page_size: usize) -> bool {
        self.cursor
            .checked_add(len)
            .is_some_and(|end| end < page_size)
    }

    /// Carves `len` bytes at the cursor and returns their address.
    ///
    /// The caller must have checked [`Page::fits`].
    pub(crate) fn carve(&mut self, len: usize) -> NonNull<u8> {
        debug_assert!(self.cursor + len <= self.span);
        let offset = self.cursor;
        self.cursor += len;
        self.alloc_cnt += 1;
        // SAFETY: `offset <= cursor <= span`, so the address stays inside the
        // region or one past its end, and cannot be null.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }

    /// Zeroes `len` carved bytes starting at `offset`.
    ///
    /// The range must lie inside the carved part of the page.
    pub(crate) fn zero(&mut self, offset: usize, len: usize) {
        debug_assert!(offset + len <= self.cursor, "zero past the cursor");
        // SAFETY: the range lies inside the carved part of the region, and
        // writing through `base` keeps earlier carved pointers valid.
        unsafe { ptr::write_bytes(self.base.as_ptr().add(offset), 0, len) };
    }

    /// Decrements the live count, returning true when the page is now empty.
    #[inline]
    pub(crate) fn release_one(&mut self) -> bool {
        self.alloc_cnt -= 1;
        self.alloc_cnt == 0
    }

    /// Offset of `ptr` within `[base, base + page_size)`, if it lies there.
    pub(crate) fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let base = self.base.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        (base..base + self.span).contains(&addr).then(|| addr - base)
    }

    /// Mutable view of `len` bytes starting at `offset`, limited to the carved part.
    pub(crate) fn carved_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        let end = offset.checked_add(len)?;
        if end > self.cursor {
            return None;
        }
        // SAFETY: `[offset, end)` is carved and inside the region. `&mut self`
        // keeps the view unique for its lifetime.
        Some(unsafe { slice::from_raw_parts_mut(self.base.as_ptr().add(offset), len) })
    }

    /// Gives the region back for release to its source.
    #[inline]
    pub(crate) fn into_region(self) -> R {
        self.region
    }
}
