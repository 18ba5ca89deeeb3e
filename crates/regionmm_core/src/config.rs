//! # Arena Configuration
//!
//! Page size and thread-safety choice, loaded once at startup from TOML.
//!
//! ```toml
//! page_size = 65536
//! thread_safe = false
//! ```

use std::ptr::NonNull;

use serde::Deserialize;

use crate::error::{ArenaError, ArenaResult};
use crate::memory::{LocalArena, RegionAllocator};
use crate::source::PageSource;
use crate::stats::ArenaStats;
use crate::sync::SharedArena;

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Construction parameters for an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArenaConfig {
    /// Page size in bytes. Stored verbatim; see [`RegionAllocator::malloc`]
    /// for how requests that cannot fit a page are refused.
    pub page_size: usize,
    /// Build a [`SharedArena`] instead of a [`LocalArena`].
    pub thread_safe: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            thread_safe: true,
        }
    }
}

impl ArenaConfig {
    /// Parses a configuration from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidConfig`] if the document is malformed or has
    /// unknown keys.
    pub fn from_toml_str(text: &str) -> ArenaResult<Self> {
        toml::from_str(text).map_err(|e| ArenaError::InvalidConfig(e.to_string()))
    }

    /// Builds the arena variant this configuration selects.
    ///
    /// # Errors
    ///
    /// As [`LocalArena::init`] / [`SharedArena::init`].
    pub fn build<S: PageSource>(&self, source: S) -> ArenaResult<ConfiguredArena<S>> {
        if self.thread_safe {
            SharedArena::init(source, self.page_size).map(ConfiguredArena::Shared)
        } else {
            LocalArena::init(source, self.page_size).map(ConfiguredArena::Local)
        }
    }

    /// Builds the selected variant without a control reservation.
    ///
    /// See [`LocalArena::hosted`].
    #[must_use]
    pub fn build_hosted<S: PageSource>(&self, source: S) -> ConfiguredArena<S> {
        if self.thread_safe {
            ConfiguredArena::Shared(SharedArena::hosted(source, self.page_size))
        } else {
            ConfiguredArena::Local(LocalArena::hosted(source, self.page_size))
        }
    }
}

/// An arena whose locking was chosen at runtime.
pub enum ConfiguredArena<S: PageSource> {
    /// Unsynchronized variant.
    Local(LocalArena<S>),
    /// Mutex-guarded variant.
    Shared(SharedArena<S>),
}

impl<S: PageSource> ConfiguredArena<S> {
    /// Whether operations are serialized by a lock.
    #[inline]
    #[must_use]
    pub const fn is_thread_safe(&self) -> bool {
        matches!(self, Self::Shared(_))
    }
}

impl<S: PageSource> RegionAllocator for ConfiguredArena<S> {
    fn page_size(&self) -> usize {
        match self {
            Self::Local(arena) => arena.page_size(),
            Self::Shared(arena) => arena.page_size(),
        }
    }

    fn malloc(&self, len: usize) -> ArenaResult<NonNull<u8>> {
        match self {
            Self::Local(arena) => arena.malloc(len),
            Self::Shared(arena) => arena.malloc(len),
        }
    }

    fn zalloc(&self, len: usize) -> ArenaResult<NonNull<u8>> {
        match self {
            Self::Local(arena) => arena.zalloc(len),
            Self::Shared(arena) => arena.zalloc(len),
        }
    }

    fn free(&self, ptr: NonNull<u8>) {
        match self {
            Self::Local(arena) => arena.free(ptr),
            Self::Shared(arena) => arena.free(ptr),
        }
    }

    fn owns(&self, ptr: NonNull<u8>) -> bool {
        match self {
            Self::Local(arena) => arena.owns(ptr),
            Self::Shared(arena) => arena.owns(ptr),
        }
    }

    fn page_count(&self) -> usize {
        match self {
            Self::Local(arena) => arena.page_count(),
            Self::Shared(arena) => arena.page_count(),
        }
    }

    fn stats(&self) -> ArenaStats {
        match self {
            Self::Local(arena) => arena.stats(),
            Self::Shared(arena) => arena.stats(),
        }
    }

    fn with_bytes_mut<T>(
        &self,
        ptr: NonNull<u8>,
        len: usize,
        f: impl FnOnce(&mut [u8]) -> T,
    ) -> Option<T> {
        match self {
            Self::Local(arena) => arena.with_bytes_mut(ptr, len, f),
            Self::Shared(arena) => arena.with_bytes_mut(ptr, len, f),
        }
    }

    fn shutdown(self) {
        match self {
            Self::Local(arena) => arena.shutdown(),
            Self::Shared(arena) => arena.shutdown(),
        }
    }
}
