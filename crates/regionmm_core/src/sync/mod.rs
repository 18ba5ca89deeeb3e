//! # Synchronized Arenas
//!
//! The locked counterpart of [`LocalArena`](crate::LocalArena). Both satisfy
//! [`RegionAllocator`](crate::RegionAllocator); which one a program uses is a
//! type choice (or a runtime one through [`ArenaConfig`](crate::ArenaConfig)),
//! never a compile-time feature.

mod locked;

pub use locked::SharedArena;
