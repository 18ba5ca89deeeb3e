//! # Arena Engine
//!
//! The unsynchronized page engine shared by both arena variants. Every method
//! takes `&mut self`; the wrappers decide how exclusive access is obtained.

use std::mem;
use std::ptr::NonNull;

use tracing::{debug, trace};

use super::page::{round_to_word, Page};
use crate::error::{ArenaError, ArenaResult};
use crate::source::PageSource;
use crate::stats::ArenaStats;

/// Page collection plus the source it draws from.
///
/// Pages are kept in creation order. Both allocation and release scan that
/// order linearly, and the first fitting page wins.
pub(crate) struct ArenaCore<S: PageSource> {
    /// Backing acquire/release capability.
    source: S,
    /// Fixed page size in bytes.
    page_size: usize,
    /// Live pages, oldest first. None of them is ever empty.
    pages: Vec<Page<S::Region>>,
    /// Control reservation held from the source until shutdown. `None` when
    /// the host already placed the arena in memory from the same source.
    control: Option<S::Region>,
    /// Pages acquired over the arena's lifetime.
    pages_created: u64,
    /// Pages released after their last free.
    pages_released: u64,
    /// Frees that matched no live page.
    ignored_frees: u64,
}

impl<S: PageSource> ArenaCore<S> {
    /// Reserves the control block from the source and builds an empty arena.
    ///
    /// `page_size` is stored as given. Sizes that cannot hold a single word
    /// simply make every later allocation fail with `InvalidArgument`.
    pub(crate) fn new(source: S, page_size: usize) -> ArenaResult<Self> {
        let control_size = mem::size_of::<Self>();
        let control = source
            .acquire(control_size)
            .ok_or(ArenaError::OutOfMemory { requested: control_size })?;

        let mut core = Self::hosted(source, page_size);
        core.control = Some(control);
        Ok(core)
    }

    /// Builds an empty arena without a control reservation.
    ///
    /// For hosts that store the arena itself in a block from `source`.
    pub(crate) const fn hosted(source: S, page_size: usize) -> Self {
        Self {
            source,
            page_size,
            pages: Vec::new(),
            control: None,
            pages_created: 0,
            pages_released: 0,
            ignored_frees: 0,
        }
    }

    #[inline]
    pub(crate) const fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub(crate) fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Carves a pointer-aligned block of at least `len` bytes.
    ///
    /// When `zeroed` is set, the first `len` bytes (not the rounded length)
    /// are cleared before the address is returned.
    pub(crate) fn carve(&mut self, len: usize, zeroed: bool) -> ArenaResult<NonNull<u8>> {
        let rounded = round_to_word(len)
            .filter(|&rounded| rounded < self.page_size)
            .ok_or(ArenaError::InvalidArgument("request does not fit in a page"))?;

        let index = match self.pages.iter().position(|p| p.fits(rounded, self.page_size)) {
            Some(index) => index,
            None => self.grow()?,
        };

        let page = &mut self.pages[index];
        let offset = page.cursor();
        let ptr = page.carve(rounded);
        if zeroed {
            page.zero(offset, len);
        }

        trace!(page = index, offset, len = rounded, "carved allocation");
        Ok(ptr)
    }

    /// Acquires a new page and appends it, returning its index.
    fn grow(&mut self) -> ArenaResult<usize> {
        let region = self
            .source
            .acquire(self.page_size)
            .ok_or(ArenaError::OutOfMemory { requested: self.page_size })?;

        if region.len() < self.page_size {
            self.source.release(region);
            return Err(ArenaError::OutOfMemory { requested: self.page_size });
        }

        self.pages.push(Page::new(region, self.page_size));
        self.pages_created += 1;
        debug!(pages = self.pages.len(), page_size = self.page_size, "page acquired");
        Ok(self.pages.len() - 1)
    }

    /// Drops one reference on the page owning `ptr`.
    ///
    /// The page is released in the same call that empties it. An address no
    /// live page owns is ignored.
    pub(crate) fn free(&mut self, ptr: NonNull<u8>) {
        let Some(index) = self
            .pages
            .iter()
            .position(|p| p.offset_of(ptr).is_some())
        else {
            self.ignored_frees += 1;
            debug!(addr = ?ptr, "ignoring free of unowned address");
            return;
        };

        if self.pages[index].release_one() {
            let page = self.pages.remove(index);
            self.source.release(page.into_region());
            self.pages_released += 1;
            debug!(pages = self.pages.len(), "page released");
        }
    }

    /// Whether a live page's range contains `ptr`.
    pub(crate) fn owns(&self, ptr: NonNull<u8>) -> bool {
        self.pages.iter().any(|p| p.offset_of(ptr).is_some())
    }

    /// Mutable view of `len` carved bytes starting at `ptr`.
    pub(crate) fn bytes_mut(&mut self, ptr: NonNull<u8>, len: usize) -> Option<&mut [u8]> {
        self.pages.iter_mut().find_map(|p| {
            let offset = p.offset_of(ptr)?;
            p.carved_mut(offset, len)
        })
    }

    pub(crate) fn stats(&self) -> ArenaStats {
        ArenaStats {
            live_pages: self.pages.len(),
            live_allocations: self.pages.iter().map(Page::alloc_cnt).sum(),
            reserved_bytes: self.pages.len() * self.page_size,
            carved_bytes: self.pages.iter().map(Page::cursor).sum(),
            pages_created: self.pages_created,
            pages_released: self.pages_released,
            ignored_frees: self.ignored_frees,
        }
    }

    /// Returns every remaining page, then the control block, to the source.
    fn release_all(&mut self) {
        let outstanding = self.pages.len();
        for page in self.pages.drain(..) {
            self.source.release(page.into_region());
        }
        if let Some(control) = self.control.take() {
            self.source.release(control);
        }
        if outstanding > 0 {
            debug!(pages = outstanding, "force-released pages at shutdown");
        }
    }
}

impl<S: PageSource> Drop for ArenaCore<S> {
    fn drop(&mut self) {
        self.release_all();
    }
}
