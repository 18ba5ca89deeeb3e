//! # Arena Error Types
//!
//! All errors an arena operation can report. Releasing an address no live
//! page owns is deliberately absent: that case is ignored, not reported.

use thiserror::Error;

/// Errors that can occur while creating or using an arena.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// A required argument was missing or a request can never be satisfied.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The page source could not supply the requested region.
    #[error("out of memory: page source refused {requested} bytes")]
    OutOfMemory {
        /// Size of the refused request in bytes.
        requested: usize,
    },

    /// Arena configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ArenaError {
    /// Returns true if this error came from an exhausted page source.
    #[inline]
    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

/// Result type for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;
