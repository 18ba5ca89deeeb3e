//! # REGIONMM Core
//!
//! Page-based region allocator: requests are carved from fixed-size pages
//! drawn from an injected page source, and a page is handed back only once
//! every allocation carved from it has been freed.
//!
//! ## Architecture Rules
//!
//! 1. **No hardcoded allocator** - Every page comes from the [`PageSource`]
//!    given at construction
//! 2. **Page-granular reclamation** - Freed space inside a live page is never reused
//! 3. **Fail fast** - Exhaustion is reported, never retried
//!
//! ## Example
//!
//! ```rust,ignore
//! use regionmm_core::{HeapSource, LocalArena, RegionAllocator};
//!
//! let arena = LocalArena::init(HeapSource, 4096)?;
//! let ptr = arena.zalloc(100)?;
//! arena.free(ptr);
//! arena.shutdown();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod memory;
pub mod source;
pub mod stats;
pub mod sync;

pub use config::{ArenaConfig, ConfiguredArena, DEFAULT_PAGE_SIZE};
pub use error::{ArenaError, ArenaResult};
pub use memory::{round_to_word, LocalArena, RegionAllocator, WORD};
pub use source::{BudgetSource, FnSource, HeapRegion, HeapSource, PageSource};
pub use stats::ArenaStats;
pub use sync::SharedArena;
