//! # Arena Statistics
//!
//! Point-in-time snapshot of an arena's page collection and lifetime counters.

/// Snapshot of arena occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Pages currently in the collection.
    pub live_pages: usize,
    /// Allocations carved and not yet freed, summed over all pages.
    pub live_allocations: usize,
    /// Bytes held from the page source for pages (`live_pages * page_size`).
    pub reserved_bytes: usize,
    /// Bytes consumed by cursors, including space freed but not yet reclaimable.
    pub carved_bytes: usize,
    /// Pages acquired over the arena's lifetime.
    pub pages_created: u64,
    /// Pages returned to the source because their last allocation was freed.
    pub pages_released: u64,
    /// Frees of addresses no live page owned.
    pub ignored_frees: u64,
}

impl ArenaStats {
    /// Fraction of reserved bytes consumed by cursors (0.0 when empty).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        if self.reserved_bytes == 0 {
            0.0
        } else {
            self.carved_bytes as f64 / self.reserved_bytes as f64
        }
    }
}
