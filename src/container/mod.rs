//! Memory primitives the engine is built from.
//!
//! - **`arena`**: bump-allocated zones released all at once
//! - **`buffer`**: growable byte buffer and the string built on it
//! - **`list`**: dynamic list growing in fixed increments
//! - **`table`**: name/value table with a cached additive hash
//!
//! None of these types are thread-safe; each one is owned by a single
//! connection task for its whole life.

pub mod arena;
pub mod buffer;
pub mod list;
pub mod table;

pub use arena::{Arena, ArenaSlot, ArenaStr};
pub use buffer::{GrowableBuffer, GrowableString};
pub use list::DynamicList;
pub use table::NameValueTable;

use std::collections::TryReserveError;

/// The allocator refused to provide memory for a container.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("allocation of {requested} bytes failed")]
pub struct AllocError {
    /// Number of bytes (or elements, for lists) that was asked for.
    pub requested: usize,
}

impl AllocError {
    pub(crate) fn from_reserve(requested: usize, _err: TryReserveError) -> Self {
        Self { requested }
    }
}
