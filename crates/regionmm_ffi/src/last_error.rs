//! # Last-Error Channel
//!
//! C callers get NULL back on failure and read the reason here, the way they
//! would read `errno`. The code is per thread and only written on failure.

use std::cell::Cell;
use std::ffi::c_int;

use regionmm_core::ArenaError;

/// No failure recorded on this thread.
pub const REGIONMM_OK: c_int = 0;
/// Missing callback, NULL arena handle, or a request that cannot fit a page.
pub const REGIONMM_EINVAL: c_int = 1;
/// The caller's allocator returned NULL.
pub const REGIONMM_ENOMEM: c_int = 2;

thread_local! {
    static LAST_ERROR: Cell<c_int> = const { Cell::new(REGIONMM_OK) };
}

/// Maps an arena error onto its C code.
#[must_use]
pub const fn code_of(err: &ArenaError) -> c_int {
    match err {
        ArenaError::OutOfMemory { .. } => REGIONMM_ENOMEM,
        ArenaError::InvalidArgument(_) | ArenaError::InvalidConfig(_) => REGIONMM_EINVAL,
    }
}

/// Records `err` as this thread's last error.
pub(crate) fn record(err: &ArenaError) {
    tracing::debug!(error = %err, "reporting failure to C caller");
    set(code_of(err));
}

pub(crate) fn set(code: c_int) {
    LAST_ERROR.with(|cell| cell.set(code));
}

pub(crate) fn get() -> c_int {
    LAST_ERROR.with(Cell::get)
}
